use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ObjectId;
use common::entry::{CompanyDetails, EntryPatch, NewRepairEntry, RepairEntry, sort_newest_first};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::Mutex;

use super::{RecordError, RecordStore};
use crate::config::StorageBackend;

const ENTRIES_DIR: &str = "repair_entries";
const COMPANIES_DIR: &str = "company_details";

/// Local document database: one JSON document per record on disk.
///
/// ```text
/// {root}/repair_entries/{id}.json
/// {root}/company_details/{hex(user_id)}.json
/// ```
pub struct DocumentStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    pub async fn open(root: PathBuf) -> Result<Self, RecordError> {
        fs::create_dir_all(root.join(ENTRIES_DIR)).await?;
        fs::create_dir_all(root.join(COMPANIES_DIR)).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Ids are object ids; anything else cannot name a document.
    fn entry_path(&self, id: &str) -> Option<PathBuf> {
        let id = ObjectId::from_hex(id).ok()?;
        Some(self.root.join(ENTRIES_DIR).join(format!("{id}.json")))
    }

    fn company_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join(COMPANIES_DIR)
            .join(format!("{}.json", hex::encode(user_id)))
    }

    async fn write_document<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), RecordError> {
        let temp_path = self
            .root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string());
        let bytes = serde_json::to_vec_pretty(value)?;
        if let Err(e) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_entries(&self) -> Result<Vec<RepairEntry>, RecordError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(self.root.join(ENTRIES_DIR)).await?;
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_document::<RepairEntry>(&path).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry document");
                }
            }
        }
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RecordError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    fn kind(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn create(
        &self,
        entry: &NewRepairEntry,
        created_at: DateTime<Utc>,
    ) -> Result<String, RecordError> {
        let id = ObjectId::generate();
        let entry = entry.clone().into_entry(id.to_hex(), created_at);
        let path = self.root.join(ENTRIES_DIR).join(format!("{id}.json"));

        let _guard = self.write_lock.lock().await;
        self.write_document(&path, &entry).await?;
        Ok(entry.id)
    }

    async fn get(
        &self,
        id: &str,
        _user_hint: Option<&str>,
    ) -> Result<Option<RepairEntry>, RecordError> {
        match self.entry_path(id) {
            Some(path) => read_document(&path).await,
            None => Ok(None),
        }
    }

    async fn list(&self, user_id: &str) -> Result<Vec<RepairEntry>, RecordError> {
        let mut entries = self.read_entries().await?;
        entries.retain(|e| e.user_id == user_id);
        Ok(entries)
    }

    async fn list_all(&self) -> Result<Vec<RepairEntry>, RecordError> {
        self.read_entries().await
    }

    async fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
        _user_hint: Option<&str>,
    ) -> Result<RepairEntry, RecordError> {
        let not_found = || RecordError::NotFound(format!("Entry {id}"));
        let path = self.entry_path(id).ok_or_else(not_found)?;

        let _guard = self.write_lock.lock().await;
        let mut entry: RepairEntry = read_document(&path).await?.ok_or_else(not_found)?;
        patch.apply(&mut entry, Utc::now())?;
        self.write_document(&path, &entry).await?;
        Ok(entry)
    }

    async fn delete(&self, id: &str, _user_hint: Option<&str>) -> Result<bool, RecordError> {
        let Some(path) = self.entry_path(id) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_company(&self, user_id: &str) -> Result<Option<CompanyDetails>, RecordError> {
        read_document(&self.company_path(user_id)).await
    }

    async fn save_company(&self, details: &CompanyDetails) -> Result<(), RecordError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(&self.company_path(&details.user_id), details)
            .await
    }
}
