use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::entry::{CompanyDetails, EntryPatch, NewRepairEntry, RepairEntry, sort_newest_first};
use dashmap::DashMap;
use tokio::fs;
use tokio::sync::Mutex;

use super::{RecordError, RecordStore};
use crate::config::StorageBackend;

const ENTRIES_KEY_PREFIX: &str = "repairEntries_";
const COMPANY_KEY_PREFIX: &str = "companyDetails_";

/// Browser-style local storage: one serialized value per key, scoped by user.
///
/// Entries for a user live as a single JSON array under
/// `repairEntries_{userId}`, newest first. Ids are millisecond timestamps,
/// unique across every user's array.
/// When a directory is configured every key is mirrored to
/// `{dir}/{hex(key)}.json`; mirror failures are logged and ignored, as with a
/// full browser quota.
pub struct BrowserLocalStore {
    keys: DashMap<String, String>,
    dir: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl BrowserLocalStore {
    pub fn in_memory() -> Self {
        Self {
            keys: DashMap::new(),
            dir: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a mirrored store, loading whatever keys the directory holds.
    pub async fn open(dir: PathBuf) -> Result<Self, RecordError> {
        fs::create_dir_all(&dir).await?;
        let keys = DashMap::new();

        let mut files = fs::read_dir(&dir).await?;
        while let Some(file) = files.next_entry().await? {
            let path = file.path();
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| hex::decode(s).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            keys.insert(key, fs::read_to_string(&path).await?);
        }

        tracing::info!(dir = %dir.display(), keys = keys.len(), "Loaded browser-local store");
        Ok(Self {
            keys,
            dir: Some(dir),
            write_lock: Mutex::new(()),
        })
    }

    fn entries_key(user_id: &str) -> String {
        format!("{ENTRIES_KEY_PREFIX}{user_id}")
    }

    fn company_key(user_id: &str) -> String {
        format!("{COMPANY_KEY_PREFIX}{user_id}")
    }

    /// Keys to search for a by-id operation.
    fn owner_keys(&self, user_hint: Option<&str>) -> Vec<String> {
        match user_hint.filter(|u| !u.is_empty()) {
            Some(user_id) => vec![Self::entries_key(user_id)],
            None => self
                .keys
                .iter()
                .filter(|kv| kv.key().starts_with(ENTRIES_KEY_PREFIX))
                .map(|kv| kv.key().clone())
                .collect(),
        }
    }

    /// Every entry id held under any user's key.
    fn all_ids(&self) -> Result<HashSet<String>, RecordError> {
        let mut ids = HashSet::new();
        for key in self.owner_keys(None) {
            ids.extend(self.read_entries(&key)?.into_iter().map(|e| e.id));
        }
        Ok(ids)
    }

    fn read_entries(&self, key: &str) -> Result<Vec<RepairEntry>, RecordError> {
        match self.keys.get(key) {
            Some(raw) => Ok(serde_json::from_str(raw.value())?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_entries(&self, key: &str, entries: &[RepairEntry]) -> Result<(), RecordError> {
        let raw = serde_json::to_string(entries)?;
        self.set_item(key, raw).await;
        Ok(())
    }

    async fn set_item(&self, key: &str, raw: String) {
        self.keys.insert(key.to_string(), raw.clone());
        self.mirror(key, &raw).await;
    }

    async fn mirror(&self, key: &str, raw: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let path = dir.join(format!("{}.json", hex::encode(key)));
        let temp_path = dir.join(format!(".{}.tmp", hex::encode(key)));

        let result = async {
            fs::write(&temp_path, raw).await?;
            fs::rename(&temp_path, &path).await
        }
        .await;
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            tracing::warn!(key, error = %e, "Failed to persist browser-local key");
        }
    }
}

/// Millisecond timestamp id, bumped until it is not in `taken`.
fn next_id(taken: &HashSet<String>, created_at: DateTime<Utc>) -> String {
    let mut millis = created_at.timestamp_millis();
    while taken.contains(&millis.to_string()) {
        millis += 1;
    }
    millis.to_string()
}

#[async_trait]
impl RecordStore for BrowserLocalStore {
    fn kind(&self) -> StorageBackend {
        StorageBackend::BrowserLocal
    }

    async fn create(
        &self,
        entry: &NewRepairEntry,
        created_at: DateTime<Utc>,
    ) -> Result<String, RecordError> {
        let key = Self::entries_key(&entry.user_id);

        let _guard = self.write_lock.lock().await;
        let id = next_id(&self.all_ids()?, created_at);
        let mut entries = self.read_entries(&key)?;
        entries.insert(0, entry.clone().into_entry(id.clone(), created_at));
        self.write_entries(&key, &entries).await?;
        Ok(id)
    }

    async fn get(
        &self,
        id: &str,
        user_hint: Option<&str>,
    ) -> Result<Option<RepairEntry>, RecordError> {
        for key in self.owner_keys(user_hint) {
            if let Some(entry) = self.read_entries(&key)?.into_iter().find(|e| e.id == id) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<RepairEntry>, RecordError> {
        let mut entries = self.read_entries(&Self::entries_key(user_id))?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn list_all(&self) -> Result<Vec<RepairEntry>, RecordError> {
        let mut all = Vec::new();
        for key in self.owner_keys(None) {
            all.extend(self.read_entries(&key)?);
        }
        sort_newest_first(&mut all);
        Ok(all)
    }

    async fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
        user_hint: Option<&str>,
    ) -> Result<RepairEntry, RecordError> {
        let _guard = self.write_lock.lock().await;
        for key in self.owner_keys(user_hint) {
            let mut entries = self.read_entries(&key)?;
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                patch.apply(entry, Utc::now())?;
                let updated = entry.clone();
                self.write_entries(&key, &entries).await?;
                return Ok(updated);
            }
        }
        Err(RecordError::NotFound(format!("Entry {id}")))
    }

    async fn delete(&self, id: &str, user_hint: Option<&str>) -> Result<bool, RecordError> {
        let _guard = self.write_lock.lock().await;
        for key in self.owner_keys(user_hint) {
            let mut entries = self.read_entries(&key)?;
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() != before {
                self.write_entries(&key, &entries).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get_company(&self, user_id: &str) -> Result<Option<CompanyDetails>, RecordError> {
        match self.keys.get(&Self::company_key(user_id)) {
            Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
            None => Ok(None),
        }
    }

    async fn save_company(&self, details: &CompanyDetails) -> Result<(), RecordError> {
        let raw = serde_json::to_string(details)?;
        let _guard = self.write_lock.lock().await;
        self.set_item(&Self::company_key(&details.user_id), raw)
            .await;
        Ok(())
    }
}
