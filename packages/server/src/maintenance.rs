use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::ObjectId;
use common::entry::{EntryPatch, EntryStatus};
use common::image::parse_image_url;
use common::storage::{BlobStore, StorageError};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::StorageBackend;
use crate::facade::StorageFacade;
use crate::records::RecordError;

const RECENT_LIMIT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Records(#[from] RecordError),
    #[error(transparent)]
    Blobs(#[from] StorageError),
}

/// Outcome of an image reference sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// References cleared because they were malformed or dangling.
    pub cleaned_count: usize,
    /// Entries that carried an image reference.
    pub total_entries_checked: usize,
    /// Blobs present in the image store.
    pub valid_images_found: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub id: String,
    pub customer_name: String,
    pub bike_type: String,
    pub status: EntryStatus,
    pub entry_date: String,
    pub has_image: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentImage {
    pub id: String,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub total: usize,
    pub pending: usize,
    pub delivered: usize,
    pub recent_entries: Vec<RecentEntry>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub total: usize,
    pub total_size: u64,
    /// Blobs no entry refers to.
    pub unreferenced: usize,
    pub recent_images: Vec<RecentImage>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub repair_entries: EntrySummary,
    pub images: ImageSummary,
    /// Record backend serving as primary.
    pub backend: Option<StorageBackend>,
    pub timestamp: DateTime<Utc>,
}

pub struct MaintenanceService<'a> {
    records: &'a StorageFacade,
    images: &'a dyn BlobStore,
}

impl<'a> MaintenanceService<'a> {
    pub fn new(records: &'a StorageFacade, images: &'a dyn BlobStore) -> Self {
        Self { records, images }
    }

    /// Clear every image reference that is malformed or names a missing blob.
    ///
    /// Entries are never deleted and blobs are never touched. Running it
    /// again right away finds nothing to clean.
    pub async fn sweep(&self) -> Result<SweepReport, MaintenanceError> {
        let entries = self.records.entries_with_images().await?;
        let stored: HashSet<ObjectId> = self
            .images
            .list_all()
            .await?
            .into_iter()
            .map(|blob| blob.id)
            .collect();

        let mut cleaned = 0;
        for entry in &entries {
            let url = entry.image_url.as_deref().unwrap_or_default();
            let dangling = match parse_image_url(url) {
                Some(id) => !stored.contains(&id),
                None => true,
            };
            if !dangling {
                continue;
            }

            match self
                .records
                .update(&entry.id, &EntryPatch::clear_image(), Some(&entry.user_id))
                .await
            {
                Ok(_) => {
                    info!(entry_id = %entry.id, image_url = url, "Cleared dangling image reference");
                    cleaned += 1;
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "Failed to clear image reference");
                }
            }
        }

        Ok(SweepReport {
            cleaned_count: cleaned,
            total_entries_checked: entries.len(),
            valid_images_found: stored.len(),
        })
    }

    pub async fn summary(&self) -> Result<DataSummary, MaintenanceError> {
        let entries = self.records.list_all().await?;
        let mut blobs = self.images.list_all().await?;

        let referenced: HashSet<ObjectId> = entries
            .iter()
            .filter_map(|e| e.image_url.as_deref().and_then(parse_image_url))
            .collect();

        let pending = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count();

        let mut by_entry_date: Vec<_> = entries.iter().collect();
        by_entry_date.sort_by(|a, b| {
            b.entry_date
                .cmp(&a.entry_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        let recent_entries = by_entry_date
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|e| RecentEntry {
                id: e.id.clone(),
                customer_name: e.customer_name.clone(),
                bike_type: e.bike_type.clone(),
                status: e.status,
                entry_date: e.entry_date.clone(),
                has_image: e.has_image(),
            })
            .collect();

        blobs.sort_by(|a, b| b.metadata.upload_date.cmp(&a.metadata.upload_date));
        let recent_images = blobs
            .iter()
            .take(RECENT_LIMIT)
            .map(|blob| RecentImage {
                id: blob.id.to_hex(),
                original_name: blob.metadata.original_name.clone(),
                content_type: blob.metadata.content_type.clone(),
                size: blob.metadata.size,
                upload_date: blob.metadata.upload_date,
            })
            .collect();

        Ok(DataSummary {
            repair_entries: EntrySummary {
                total: entries.len(),
                pending,
                delivered: entries.len() - pending,
                recent_entries,
            },
            images: ImageSummary {
                total: blobs.len(),
                total_size: blobs.iter().map(|b| b.metadata.size).sum(),
                unreferenced: blobs.iter().filter(|b| !referenced.contains(&b.id)).count(),
                recent_images,
            },
            backend: self.records.primary(),
            timestamp: Utc::now(),
        })
    }
}
