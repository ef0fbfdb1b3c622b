use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use crate::entry::ValidationError;
use crate::id::ObjectId;
use crate::image::{validate_content_type, validate_size};

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// `entryId` recorded for images uploaded before their entry exists.
pub const TEMP_ENTRY_ID: &str = "temp";

/// Caller-supplied description of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUpload {
    pub content_type: String,
    pub user_id: String,
    pub entry_id: Option<String>,
    pub original_name: String,
}

impl BlobUpload {
    /// Checks that can run before a single byte is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("User ID required"));
        }
        validate_content_type(&self.content_type)
    }
}

/// Metadata stored alongside every blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub user_id: String,
    pub entry_id: String,
    pub original_name: String,
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
    pub size: u64,
}

impl BlobMetadata {
    pub fn from_upload(upload: BlobUpload, size: u64, upload_date: DateTime<Utc>) -> Self {
        Self {
            user_id: upload.user_id,
            entry_id: upload
                .entry_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| TEMP_ENTRY_ID.to_string()),
            original_name: upload.original_name,
            content_type: upload.content_type,
            upload_date,
            size,
        }
    }
}

/// A listed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct BlobInfo {
    #[schema(value_type = String)]
    pub id: ObjectId,
    pub metadata: BlobMetadata,
}

/// Image blob storage keyed by generated ids.
///
/// Blobs are immutable once stored. Uploads are validated before the write
/// starts and an upload that fails part-way never becomes visible.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the new id.
    async fn put(&self, data: &[u8], upload: BlobUpload) -> Result<ObjectId, StorageError> {
        upload.validate()?;
        validate_size(data.len() as u64)?;
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(reader, upload).await
    }

    /// Store data from an async reader and return the new id.
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<ObjectId, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, id: &ObjectId) -> Result<(Vec<u8>, BlobMetadata), StorageError> {
        let (mut reader, metadata) = self.get_stream(id).await?;
        let mut buf = Vec::with_capacity(metadata.size as usize);
        reader.read_to_end(&mut buf).await?;
        Ok((buf, metadata))
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, id: &ObjectId) -> Result<(BoxReader, BlobMetadata), StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, id: &ObjectId) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError>;

    /// Every stored blob with its metadata. Maintenance use only.
    async fn list_all(&self) -> Result<Vec<BlobInfo>, StorageError>;
}
