use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::{BlobInfo, BlobMetadata, BlobStore, BlobUpload, BoxReader};
use crate::id::ObjectId;
use crate::image::MAX_IMAGE_SIZE;

/// In-memory blob store.
///
/// Used by tests that do not need files on disk.
/// Blobs are cloned on read.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ObjectId, (Vec<u8>, BlobMetadata)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<ObjectId, StorageError> {
        upload.validate()?;

        // One byte past the limit is enough to know it is too large.
        let mut data = Vec::new();
        reader
            .take(MAX_IMAGE_SIZE.saturating_add(1))
            .read_to_end(&mut data)
            .await?;
        let size = data.len() as u64;
        if size > MAX_IMAGE_SIZE {
            return Err(StorageError::SizeLimitExceeded {
                actual: size,
                limit: MAX_IMAGE_SIZE,
            });
        }

        let id = ObjectId::generate();
        let metadata = BlobMetadata::from_upload(upload, size, Utc::now());
        self.blobs.write().await.insert(id, (data, metadata));
        Ok(id)
    }

    async fn get_stream(&self, id: &ObjectId) -> Result<(BoxReader, BlobMetadata), StorageError> {
        let blobs = self.blobs.read().await;
        let (data, metadata) = blobs
            .get(id)
            .ok_or_else(|| StorageError::NotFound(id.to_hex()))?;
        Ok((Box::new(Cursor::new(data.clone())), metadata.clone()))
    }

    async fn exists(&self, id: &ObjectId) -> Result<bool, StorageError> {
        Ok(self.blobs.read().await.contains_key(id))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError> {
        Ok(self.blobs.write().await.remove(id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<BlobInfo>, StorageError> {
        let blobs = self.blobs.read().await;
        let mut listed: Vec<BlobInfo> = blobs
            .iter()
            .map(|(id, (_, metadata))| BlobInfo {
                id: *id,
                metadata: metadata.clone(),
            })
            .collect();
        listed.sort_by(|a, b| a.metadata.upload_date.cmp(&b.metadata.upload_date));
        Ok(listed)
    }
}
