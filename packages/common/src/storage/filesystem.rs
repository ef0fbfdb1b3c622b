use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::traits::{BlobInfo, BlobMetadata, BlobStore, BlobUpload, BoxReader};
use crate::id::ObjectId;
use crate::image::MAX_IMAGE_SIZE;

const METADATA_EXT: &str = "json";

/// Filesystem-backed blob store.
///
/// Blobs are stored in a sharded directory layout:
/// `{base_path}/{shard}/{id}` holds the bytes and `{base_path}/{shard}/{id}.json`
/// the metadata. Both are written to `.tmp` first and renamed into place.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self { base_path })
    }

    fn shard_dir(&self, id: &ObjectId) -> PathBuf {
        self.base_path.join(id.shard_prefix())
    }

    fn blob_path(&self, id: &ObjectId) -> PathBuf {
        self.shard_dir(id).join(id.to_hex())
    }

    fn metadata_path(&self, id: &ObjectId) -> PathBuf {
        self.shard_dir(id)
            .join(format!("{}.{METADATA_EXT}", id.to_hex()))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn read_metadata(&self, id: &ObjectId) -> Result<BlobMetadata, StorageError> {
        read_metadata_file(&self.metadata_path(id))
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_hex()))
    }

    async fn write_metadata(
        &self,
        id: &ObjectId,
        metadata: &BlobMetadata,
    ) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        let json = serde_json::to_vec(metadata)?;
        if let Err(e) = fs::write(&temp_path, json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, self.metadata_path(id)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn read_metadata_file(path: &Path) -> Result<Option<BlobMetadata>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(
        &self,
        mut reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<ObjectId, StorageError> {
        upload.validate()?;

        let id = ObjectId::generate();
        let temp_path = self.temp_path();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(&temp_path).await?;

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > MAX_IMAGE_SIZE {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: MAX_IMAGE_SIZE,
                });
            }

            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        drop(temp_file);

        fs::create_dir_all(self.shard_dir(&id)).await?;

        let blob_path = self.blob_path(&id);
        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let metadata = BlobMetadata::from_upload(upload, total_bytes, Utc::now());
        if let Err(e) = self.write_metadata(&id, &metadata).await {
            let _ = fs::remove_file(&blob_path).await;
            return Err(e);
        }

        tracing::debug!(blob_id = %id, size = total_bytes, "Stored blob");
        Ok(id)
    }

    async fn get_stream(&self, id: &ObjectId) -> Result<(BoxReader, BlobMetadata), StorageError> {
        let metadata = self.read_metadata(id).await?;
        match fs::File::open(self.blob_path(id)).await {
            Ok(file) => Ok((Box::new(BufReader::new(file)), metadata)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(id.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, id: &ObjectId) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.metadata_path(id)).await?)
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, StorageError> {
        // Metadata goes first so a half-deleted blob is already invisible.
        let existed = match fs::remove_file(self.metadata_path(id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(existed),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<BlobInfo>, StorageError> {
        let mut blobs = Vec::new();
        let mut shards = fs::read_dir(&self.base_path).await?;

        while let Some(shard) = shards.next_entry().await? {
            if shard.file_name() == ".tmp" || !shard.file_type().await?.is_dir() {
                continue;
            }

            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some(METADATA_EXT) {
                    continue;
                }
                let Some(id) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| ObjectId::from_hex(s).ok())
                else {
                    continue;
                };
                // Deleted between read_dir and read.
                if let Some(metadata) = read_metadata_file(&path).await? {
                    blobs.push(BlobInfo { id, metadata });
                }
            }
        }

        blobs.sort_by(|a, b| a.metadata.upload_date.cmp(&b.metadata.upload_date));
        Ok(blobs)
    }
}
