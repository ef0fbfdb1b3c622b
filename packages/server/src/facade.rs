//! One entry API over the configured record store and its fallbacks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use common::billing::{DeliveryRequest, delivery_patch};
use common::entry::{
    CompanyDetails, CompanyDetailsInput, EntryPatch, NewRepairEntry, RepairEntry,
    sort_newest_first,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{StorageBackend, StorageConfig};
use crate::records::{
    BrowserLocalStore, DocumentStore, EntryChange, RecordError, RecordStore, SqlRecordStore,
};

/// Storage façade.
///
/// Holds the primary record store followed by its fallbacks. Writes that
/// fail on one tier move on to the next; validation failures are returned
/// immediately. Nothing written to a fallback tier is ever copied back.
#[derive(Clone)]
pub struct StorageFacade {
    chain: Arc<[Arc<dyn RecordStore>]>,
    poll_interval: Duration,
}

fn no_backend() -> RecordError {
    RecordError::Unavailable("no storage backend available".into())
}

impl StorageFacade {
    pub fn new(chain: Vec<Arc<dyn RecordStore>>, poll_interval: Duration) -> Self {
        Self {
            chain: chain.into(),
            poll_interval,
        }
    }

    /// Open the configured backend and its fallback tiers.
    ///
    /// A tier that cannot be opened is skipped with a warning, so an
    /// unreachable cloud database promotes the local store to primary.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, RecordError> {
        let mut chain: Vec<Arc<dyn RecordStore>> = Vec::new();
        let tiers = std::iter::once(config.backend).chain(config.backend.fallbacks().iter().copied());

        for backend in tiers {
            match open_backend(backend, config).await {
                Ok(store) => chain.push(store),
                Err(e) => {
                    warn!(backend = %backend, error = %e, "Storage backend unavailable at startup, skipping");
                }
            }
        }

        let Some(primary) = chain.first() else {
            return Err(no_backend());
        };
        info!(
            configured = %config.backend,
            primary = %primary.kind(),
            tiers = chain.len(),
            "Storage façade ready"
        );
        Ok(Self::new(chain, config.poll_interval()))
    }

    /// Backend currently serving as primary.
    pub fn primary(&self) -> Option<StorageBackend> {
        self.chain.first().map(|s| s.kind())
    }

    /// Every tier, primary first.
    pub fn backends(&self) -> Vec<StorageBackend> {
        self.chain.iter().map(|s| s.kind()).collect()
    }

    pub async fn create(&self, entry: &NewRepairEntry) -> Result<String, RecordError> {
        entry.validate()?;
        let created_at = Utc::now();

        let mut last_err = None;
        for store in self.chain.iter() {
            match store.create(entry, created_at).await {
                Ok(id) => {
                    if last_err.is_some() {
                        warn!(backend = %store.kind(), entry_id = %id, "Entry written to fallback backend");
                    }
                    return Ok(id);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Create failed, trying next backend");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(no_backend))
    }

    /// Entries owned by `user_id`, newest first. Empty for an empty id.
    pub async fn list(&self, user_id: &str) -> Result<Vec<RepairEntry>, RecordError> {
        if user_id.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_err = None;
        for store in self.chain.iter() {
            match store.list(user_id).await {
                Ok(mut entries) => {
                    sort_newest_first(&mut entries);
                    return Ok(entries);
                }
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "List failed, trying next backend");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(no_backend))
    }

    /// First tier holding `id`.
    pub async fn get(
        &self,
        id: &str,
        user_hint: Option<&str>,
    ) -> Result<Option<RepairEntry>, RecordError> {
        let mut reached = false;
        let mut last_err = None;
        for store in self.chain.iter() {
            match store.get(id, user_hint).await {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => reached = true,
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Get failed, trying next backend");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !reached => Err(e),
            _ => Ok(None),
        }
    }

    /// Apply a partial update. When the primary tier does not hold the
    /// entry or fails, the fallbacks are tried; if all fail the primary's
    /// error is returned.
    pub async fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
        user_hint: Option<&str>,
    ) -> Result<RepairEntry, RecordError> {
        if id.is_empty() {
            return Err(RecordError::Validation("Entry ID required".into()));
        }
        patch.validate()?;

        let mut first_err = None;
        for store in self.chain.iter() {
            match store.update(id, patch, user_hint).await {
                Ok(entry) => return Ok(entry),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    debug!(backend = %store.kind(), error = %e, "Update missed, trying next backend");
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(no_backend))
    }

    /// Idempotent delete. Returns whether any tier held the entry.
    pub async fn delete(&self, id: &str, user_hint: Option<&str>) -> Result<bool, RecordError> {
        if id.is_empty() {
            return Err(RecordError::Validation("Entry ID required".into()));
        }

        let mut reached = false;
        let mut first_err = None;
        for store in self.chain.iter() {
            match store.delete(id, user_hint).await {
                Ok(true) => return Ok(true),
                Ok(false) => reached = true,
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Delete failed, trying next backend");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) if !reached => Err(e),
            _ => Ok(false),
        }
    }

    /// Pending -> delivered. The entry is left untouched if the request is
    /// rejected.
    pub async fn deliver(
        &self,
        id: &str,
        user_hint: Option<&str>,
        request: &DeliveryRequest,
    ) -> Result<RepairEntry, RecordError> {
        let entry = self
            .get(id, user_hint)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("Entry {id}")))?;
        let patch = delivery_patch(&entry, request)?;
        self.update(id, &patch, Some(&entry.user_id)).await
    }

    /// Every entry across all reachable tiers, newest first.
    ///
    /// Used by maintenance; a tier that fails is skipped.
    pub async fn list_all(&self) -> Result<Vec<RepairEntry>, RecordError> {
        let mut reached = false;
        let mut last_err = None;
        let mut seen = HashSet::new();
        let mut all = Vec::new();

        for store in self.chain.iter() {
            match store.list_all().await {
                Ok(entries) => {
                    reached = true;
                    all.extend(
                        entries
                            .into_iter()
                            .filter(|e| seen.insert((e.user_id.clone(), e.id.clone()))),
                    );
                }
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Skipping backend during full scan");
                    last_err = Some(e);
                }
            }
        }

        if !reached {
            return Err(last_err.unwrap_or_else(no_backend));
        }
        sort_newest_first(&mut all);
        Ok(all)
    }

    pub async fn entries_with_images(&self) -> Result<Vec<RepairEntry>, RecordError> {
        let mut entries = self.list_all().await?;
        entries.retain(RepairEntry::has_image);
        Ok(entries)
    }

    pub async fn get_company(&self, user_id: &str) -> Result<Option<CompanyDetails>, RecordError> {
        if user_id.is_empty() {
            return Ok(None);
        }

        let mut reached = false;
        let mut last_err = None;
        for store in self.chain.iter() {
            match store.get_company(user_id).await {
                Ok(Some(details)) => return Ok(Some(details)),
                Ok(None) => reached = true,
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Company lookup failed, trying next backend");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !reached => Err(e),
            _ => Ok(None),
        }
    }

    /// Create or replace the owner's company profile.
    pub async fn save_company(
        &self,
        input: CompanyDetailsInput,
    ) -> Result<CompanyDetails, RecordError> {
        input.validate()?;
        let existing = self.get_company(&input.user_id).await?;
        let details = input.into_details(existing.as_ref(), Utc::now());

        let mut last_err = None;
        for store in self.chain.iter() {
            match store.save_company(&details).await {
                Ok(()) => return Ok(details),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(backend = %store.kind(), error = %e, "Company save failed, trying next backend");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(no_backend))
    }

    /// Deliver `user_id`'s entries to `on_change` now and on every change.
    ///
    /// Push-capable primaries re-list when a write for this user is
    /// announced. Others are polled and deliver on every tick whether or not
    /// anything changed. An empty `user_id` yields an inert subscription.
    ///
    /// `on_change` must not call [`Subscription::unsubscribe`] on its own
    /// subscription.
    pub fn subscribe<F>(&self, user_id: &str, on_change: F) -> Subscription
    where
        F: Fn(Vec<RepairEntry>) + Send + Sync + 'static,
    {
        let gate = Arc::new(Gate {
            token: CancellationToken::new(),
            delivering: Mutex::new(()),
        });
        if user_id.is_empty() {
            gate.token.cancel();
            return Subscription { gate };
        }

        let facade = self.clone();
        let user_id = user_id.to_string();
        let feed = self.chain.first().and_then(|s| s.change_feed());
        let task_gate = gate.clone();

        tokio::spawn(async move {
            match feed {
                Some(feed) => facade.push_loop(&user_id, feed, &on_change, &task_gate).await,
                None => facade.poll_loop(&user_id, &on_change, &task_gate).await,
            }
            debug!(user_id, "Subscription stopped");
        });

        Subscription { gate }
    }

    async fn push_loop<F>(
        &self,
        user_id: &str,
        mut feed: broadcast::Receiver<EntryChange>,
        on_change: &F,
        gate: &Gate,
    ) where
        F: Fn(Vec<RepairEntry>),
    {
        self.deliver_snapshot(user_id, on_change, gate).await;
        loop {
            tokio::select! {
                _ = gate.token.cancelled() => break,
                change = feed.recv() => match change {
                    Ok(change) if change.user_id == user_id => {
                        self.deliver_snapshot(user_id, on_change, gate).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged, re-listing");
                        self.deliver_snapshot(user_id, on_change, gate).await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    async fn poll_loop<F>(&self, user_id: &str, on_change: &F, gate: &Gate)
    where
        F: Fn(Vec<RepairEntry>),
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = gate.token.cancelled() => break,
                _ = ticker.tick() => self.deliver_snapshot(user_id, on_change, gate).await,
            }
        }
    }

    async fn deliver_snapshot<F>(&self, user_id: &str, on_change: &F, gate: &Gate)
    where
        F: Fn(Vec<RepairEntry>),
    {
        match self.list(user_id).await {
            Ok(entries) => {
                let _delivering = gate
                    .delivering
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if !gate.token.is_cancelled() {
                    on_change(entries);
                }
            }
            Err(e) => warn!(user_id, error = %e, "Subscription refresh failed"),
        }
    }
}

async fn open_backend(
    backend: StorageBackend,
    config: &StorageConfig,
) -> Result<Arc<dyn RecordStore>, RecordError> {
    let store: Arc<dyn RecordStore> = match backend {
        StorageBackend::Cloud => {
            let cloud = config.cloud.as_ref().ok_or_else(|| {
                RecordError::Unavailable("storage.cloud.url is not configured".into())
            })?;
            Arc::new(SqlRecordStore::connect(&cloud.url).await?)
        }
        StorageBackend::Local => Arc::new(DocumentStore::open(config.local_dir.clone()).await?),
        StorageBackend::BrowserLocal => match &config.browser_dir {
            Some(dir) => Arc::new(BrowserLocalStore::open(dir.clone()).await?),
            None => Arc::new(BrowserLocalStore::in_memory()),
        },
    };
    Ok(store)
}

struct Gate {
    token: CancellationToken,
    /// Held while the callback runs so `unsubscribe` can wait it out.
    delivering: Mutex<()>,
}

/// Handle returned by [`StorageFacade::subscribe`]. Dropping it also stops
/// delivery.
pub struct Subscription {
    gate: Arc<Gate>,
}

impl Subscription {
    /// Stop delivery. No callback runs after this returns. Safe to call
    /// more than once.
    pub fn unsubscribe(&self) {
        self.gate.token.cancel();
        drop(
            self.gate
                .delivering
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
    }

    pub fn is_active(&self) -> bool {
        !self.gate.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.gate.token.cancel();
    }
}
