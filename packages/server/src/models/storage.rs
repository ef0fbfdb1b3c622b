use serde::Serialize;

use crate::config::StorageBackend;

/// Which record store is serving requests.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Backend named in configuration.
    pub configured: StorageBackend,
    /// Backend actually serving as primary. Differs from `configured` when
    /// the configured one could not be opened at startup.
    pub active: Option<StorageBackend>,
    pub label: String,
    /// Every tier in fallback order, primary first.
    pub tiers: Vec<StorageBackend>,
}
