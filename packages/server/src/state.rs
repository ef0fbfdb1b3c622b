use std::sync::Arc;

use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;

use crate::config::AppConfig;
use crate::facade::StorageFacade;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub records: StorageFacade,
    pub images: Arc<dyn BlobStore>,
}

impl AppState {
    /// Open the record stores and the image directory named in `config`.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let records = StorageFacade::from_config(&config.storage).await?;
        let images = FilesystemBlobStore::new(config.images.dir.clone()).await?;
        Ok(Self {
            config,
            records,
            images: Arc::new(images),
        })
    }
}
