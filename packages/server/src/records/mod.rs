//! Record store backends.
//!
//! Each backend persists repair entries and company profiles. The
//! [`crate::facade::StorageFacade`] picks one as primary and falls back
//! through the rest.

pub mod browser;
pub mod document;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::entry::{CompanyDetails, EntryPatch, NewRepairEntry, RepairEntry, ValidationError};
use tokio::sync::broadcast;

use crate::config::StorageBackend;

pub use browser::BrowserLocalStore;
pub use document::DocumentStore;
pub use sql::SqlRecordStore;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The caller sent something no backend would accept.
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    /// The backend could not be reached or failed mid-operation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl RecordError {
    /// Whether another backend might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

impl From<ValidationError> for RecordError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}

impl From<sea_orm::DbErr> for RecordError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for RecordError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unavailable(format!("corrupt record: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One write observed on a push-capable backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub user_id: String,
    pub entry_id: String,
    pub kind: ChangeKind,
}

/// Persistence for entries and company profiles.
///
/// `user_hint` carries the owning user where the caller knows it. Backends
/// keyed by user (browser-local) need it for by-id operations; the others
/// ignore it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn kind(&self) -> StorageBackend;

    /// Persist a validated entry and return its new id.
    async fn create(
        &self,
        entry: &NewRepairEntry,
        created_at: DateTime<Utc>,
    ) -> Result<String, RecordError>;

    async fn get(&self, id: &str, user_hint: Option<&str>)
    -> Result<Option<RepairEntry>, RecordError>;

    /// Entries owned by `user_id`, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<RepairEntry>, RecordError>;

    /// Every entry regardless of owner.
    async fn list_all(&self) -> Result<Vec<RepairEntry>, RecordError>;

    /// Apply `patch` and return the stored result. `NotFound` if absent.
    async fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
        user_hint: Option<&str>,
    ) -> Result<RepairEntry, RecordError>;

    /// Returns `false` if nothing was stored under `id`.
    async fn delete(&self, id: &str, user_hint: Option<&str>) -> Result<bool, RecordError>;

    async fn get_company(&self, user_id: &str) -> Result<Option<CompanyDetails>, RecordError>;

    async fn save_company(&self, details: &CompanyDetails) -> Result<(), RecordError>;

    /// Push notifications of writes, if the backend has them. Backends
    /// without one are polled.
    fn change_feed(&self) -> Option<broadcast::Receiver<EntryChange>> {
        None
    }
}
