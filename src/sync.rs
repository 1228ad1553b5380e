use crate::error::{ImportError, StoreError, SyncError};
use crate::importer::RecipeExtractor;
use crate::model::{CachedRecipe, Recipe, SyncStatus};
use crate::remote::{RemoteRecord, RemoteStore};
use crate::store::CacheStore;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
}

/// Snapshot of the engine's sync state, for a passive status indicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub state: SyncState,
    /// Most recent engine-level failure; cleared by the next successful sync
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    /// Counters from the last completed sync
    pub pushed: usize,
    pub deleted: usize,
    pub pulled: usize,
    pub failed: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state == SyncState::Syncing {
            return write!(f, "syncing");
        }
        write!(
            f,
            "pushed {}, deleted {}, pulled {}, failed {}",
            self.pushed, self.deleted, self.pulled, self.failed
        )?;
        if let Some(at) = self.last_success {
            write!(f, "; last synced {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        if let Some(err) = &self.last_error {
            write!(f, "; last error: {}", err)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counts {
    pushed: usize,
    deleted: usize,
    pulled: usize,
    failed: usize,
}

/// Clears the in-flight flag when a sync finishes or its future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Offline-first recipe library.
///
/// Every write lands in the local cache immediately and is flagged for
/// upload or deletion. [`SyncEngine::sync_with_remote`] later pushes those
/// flags to the remote store and pulls remote changes back.
pub struct SyncEngine {
    store: Mutex<CacheStore>,
    remote: Arc<dyn RemoteStore>,
    in_flight: AtomicBool,
    report: RwLock<SyncReport>,
}

impl SyncEngine {
    pub fn new(store: CacheStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store: Mutex::new(store),
            remote,
            in_flight: AtomicBool::new(false),
            report: RwLock::new(SyncReport::default()),
        }
    }

    /// Save a new or edited recipe; it will be uploaded on the next sync.
    pub async fn save_recipe(&self, recipe: &Recipe) -> Result<CachedRecipe, StoreError> {
        let record = self
            .store
            .lock()
            .await
            .save(recipe, SyncStatus::PendingUpload)
            .await?;
        debug!("Saved recipe {} locally", record.id);
        Ok(record)
    }

    /// Attach an image to a recipe. A cached recipe is flagged for upload again.
    pub async fn save_image(&self, id: Uuid, bytes: &[u8]) -> Result<(), StoreError> {
        let mut store = self.store.lock().await;
        store.put_image(id, bytes).await?;

        if let Some(record) = store.get(id) {
            if record.sync_status != SyncStatus::PendingDelete {
                store
                    .save(&record.to_recipe(), SyncStatus::PendingUpload)
                    .await?;
            }
        }
        Ok(())
    }

    /// Flag a recipe for deletion; it disappears locally once the remote
    /// store confirms.
    pub async fn delete_recipe(&self, id: Uuid) -> Result<(), StoreError> {
        self.store.lock().await.soft_delete(id).await?;
        debug!("Flagged recipe {} for deletion", id);
        Ok(())
    }

    /// Recipes not flagged for deletion, most recently modified first.
    pub async fn recipes(&self) -> Vec<Recipe> {
        self.store
            .lock()
            .await
            .list()
            .into_iter()
            .filter(|r| r.sync_status != SyncStatus::PendingDelete)
            .map(|r| r.to_recipe())
            .collect()
    }

    /// The cached record for `id`, including its sync metadata.
    pub async fn record(&self, id: Uuid) -> Option<CachedRecipe> {
        self.store.lock().await.get(id)
    }

    pub async fn image(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.lock().await.image(id).await
    }

    /// Extract a recipe from `url` and save it locally.
    pub async fn import_url(
        &self,
        extractor: &RecipeExtractor,
        url: &str,
    ) -> Result<Recipe, ImportError> {
        let recipe = extractor.extract(url).await?;
        self.save_recipe(&recipe).await?;
        Ok(recipe)
    }

    pub async fn status(&self) -> SyncReport {
        let mut report = self.report.read().await.clone();
        if self.in_flight.load(Ordering::Acquire) {
            report.state = SyncState::Syncing;
        }
        report
    }

    /// Push local changes, then pull remote records.
    ///
    /// Never fails: per-record failures are logged and counted, and an
    /// engine-level failure is kept in [`SyncReport::last_error`]. A call made
    /// while another sync is running returns immediately without doing anything.
    pub async fn sync_with_remote(&self) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress, ignoring request");
            return;
        }
        let _in_flight = InFlight(&self.in_flight);

        let mut counts = Counts::default();
        self.push_uploads(&mut counts).await;
        self.push_deletes(&mut counts).await;
        let outcome = self.pull(&mut counts).await;

        let mut report = self.report.write().await;
        report.pushed = counts.pushed;
        report.deleted = counts.deleted;
        report.pulled = counts.pulled;
        report.failed = counts.failed;
        match outcome {
            Ok(()) => {
                report.last_success = Some(Utc::now());
                report.last_error = None;
                info!(
                    "Sync with '{}' finished: pushed {}, deleted {}, pulled {}, failed {}",
                    self.remote.backend_name(),
                    counts.pushed,
                    counts.deleted,
                    counts.pulled,
                    counts.failed
                );
            }
            Err(e) => {
                error!("{}", e);
                report.last_error = Some(e.to_string());
            }
        }
    }

    async fn push_uploads(&self, counts: &mut Counts) {
        let pending = self
            .store
            .lock()
            .await
            .list_by_status(SyncStatus::PendingUpload);
        if !pending.is_empty() {
            info!("Uploading {} pending recipes", pending.len());
        }

        for record in pending {
            let image = match self.store.lock().await.image(record.id).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("Could not read image for recipe {}: {}", record.id, e);
                    None
                }
            };
            let upload = RemoteRecord::new(record.to_recipe(), image);

            if let Err(e) = self.remote.save(&upload).await {
                warn!("Failed to upload recipe {}: {}", record.id, e);
                counts.failed += 1;
                continue;
            }

            match self
                .store
                .lock()
                .await
                .mark_synced(record.id, record.last_modified)
                .await
            {
                Ok(true) => counts.pushed += 1,
                Ok(false) => debug!("Recipe {} changed during upload, keeping it pending", record.id),
                Err(e) => {
                    warn!("Uploaded recipe {} but could not mark it synced: {}", record.id, e);
                    counts.failed += 1;
                }
            }
        }
    }

    async fn push_deletes(&self, counts: &mut Counts) {
        let pending = self
            .store
            .lock()
            .await
            .list_by_status(SyncStatus::PendingDelete);
        if !pending.is_empty() {
            info!("Deleting {} recipes remotely", pending.len());
        }

        for record in pending {
            match self.remote.delete(record.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Recipe {} already gone remotely", record.id);
                }
                Err(e) => {
                    warn!("Failed to delete recipe {} remotely: {}", record.id, e);
                    counts.failed += 1;
                    continue;
                }
            }

            let mut store = self.store.lock().await;
            // restored while the delete was in flight
            if store
                .get(record.id)
                .is_some_and(|r| r.sync_status != SyncStatus::PendingDelete)
            {
                continue;
            }
            match store.hard_delete(record.id).await {
                Ok(_) => counts.deleted += 1,
                Err(e) => {
                    warn!("Could not remove deleted recipe {}: {}", record.id, e);
                    counts.failed += 1;
                }
            }
        }
    }

    async fn pull(&self, counts: &mut Counts) -> Result<(), SyncError> {
        let records = self.remote.fetch_all().await?;
        debug!("Fetched {} remote recipes", records.len());

        for remote in records {
            let mut store = self.store.lock().await;
            let id = remote.id();

            if let Some(local) = store.get(id) {
                if local.sync_status != SyncStatus::Synced {
                    debug!("Keeping local changes to recipe {}", id);
                    continue;
                }
                // compare against what the cache would store
                let incoming = CachedRecipe::from_recipe(&remote.recipe, SyncStatus::Synced);
                if local.to_recipe() == incoming.to_recipe() {
                    if let Err(e) = sync_image(&mut store, id, remote.image).await {
                        warn!("Could not store image for recipe {}: {}", id, e);
                        counts.failed += 1;
                    }
                    continue;
                }
            }

            match store.upsert_synced(&remote.recipe).await {
                Ok(_) => counts.pulled += 1,
                Err(e) => {
                    warn!("Could not store remote recipe {}: {}", id, e);
                    counts.failed += 1;
                    continue;
                }
            }
            if let Err(e) = sync_image(&mut store, id, remote.image).await {
                warn!("Could not store image for recipe {}: {}", id, e);
                counts.failed += 1;
            }
        }

        Ok(())
    }
}

/// Store the remote image when it differs from the cached one.
async fn sync_image(
    store: &mut CacheStore,
    id: Uuid,
    image: Option<Vec<u8>>,
) -> Result<(), StoreError> {
    let Some(bytes) = image else {
        return Ok(());
    };
    if store.image(id).await?.as_deref() != Some(bytes.as_slice()) {
        store.put_image(id, &bytes).await?;
    }
    Ok(())
}
