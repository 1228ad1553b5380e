use crate::error::StoreError;
use crate::model::{CachedRecipe, Recipe, SyncStatus};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Bump whenever the on-disk record shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const VERSION_FILE: &str = "SCHEMA_VERSION";
const RECORDS_DIR: &str = "records";
const ASSETS_DIR: &str = "assets";

/// Durable, file-backed cache of recipes and their image assets.
///
/// Layout under the cache directory:
///
/// ```text
/// SCHEMA_VERSION
/// records/<id>.json
/// assets/<id>.bin
/// ```
///
/// Records are loaded into memory when the store is opened and every mutation
/// is written through before it returns.
pub struct CacheStore {
    root: PathBuf,
    records: HashMap<Uuid, CachedRecipe>,
}

impl CacheStore {
    /// Open (or create) the store at `root`.
    ///
    /// A store written with a different schema version, or whose version file
    /// cannot be read, is wiped and recreated.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        match read_version(&root).await? {
            Some(Ok(version)) if version == SCHEMA_VERSION => {}
            Some(Ok(version)) => {
                warn!(
                    "Cache schema version {} does not match {}, resetting {}",
                    version,
                    SCHEMA_VERSION,
                    root.display()
                );
                reset(&root).await?;
            }
            Some(Err(content)) => {
                warn!(
                    "Unreadable cache schema version {:?}, resetting {}",
                    content,
                    root.display()
                );
                reset(&root).await?;
            }
            None => {
                if fs::try_exists(root.join(RECORDS_DIR)).await? {
                    warn!("Cache at {} has no schema version, resetting", root.display());
                }
                reset(&root).await?;
            }
        }

        let records = load_records(&root.join(RECORDS_DIR)).await?;
        debug!("Opened cache at {} with {} records", root.display(), records.len());

        Ok(Self { root, records })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or update `recipe` with the given status.
    ///
    /// An existing record keeps its id and child rows are rebuilt from
    /// `recipe`. `last_modified` is always refreshed.
    pub async fn save(
        &mut self,
        recipe: &Recipe,
        status: SyncStatus,
    ) -> Result<CachedRecipe, StoreError> {
        if !recipe.has_valid_name() {
            return Err(StoreError::InvalidRecipe(format!(
                "recipe {} has a blank name",
                recipe.id
            )));
        }

        let record = match self.records.get(&recipe.id) {
            Some(existing) => {
                let mut record = existing.clone();
                record.apply(recipe);
                record.sync_status = status;
                record.needs_sync = status != SyncStatus::Synced;
                record.last_modified = Utc::now();
                record
            }
            None => CachedRecipe::from_recipe(recipe, status),
        };

        self.write_record(&record).await?;
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    /// Insert or overwrite a record that mirrors the remote copy.
    pub async fn upsert_synced(&mut self, recipe: &Recipe) -> Result<CachedRecipe, StoreError> {
        self.save(recipe, SyncStatus::Synced).await
    }

    /// Flag a record for deletion without removing it.
    pub async fn soft_delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        let mut record = self.records.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        record.sync_status = SyncStatus::PendingDelete;
        record.needs_sync = true;
        record.last_modified = Utc::now();

        self.write_record(&record).await?;
        self.records.insert(id, record);
        Ok(())
    }

    /// Physically remove a record and its image. Returns whether it existed.
    pub async fn hard_delete(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let existed = self.records.remove(&id).is_some();
        remove_if_exists(&self.record_path(id)).await?;
        self.remove_image(id).await?;
        Ok(existed)
    }

    /// Mark a record synced, but only if it has not been modified since
    /// `expected_last_modified`. Returns whether the record was updated.
    pub async fn mark_synced(
        &mut self,
        id: Uuid,
        expected_last_modified: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(existing) = self.records.get(&id) else {
            return Ok(false);
        };
        if existing.last_modified != expected_last_modified
            || existing.sync_status != SyncStatus::PendingUpload
        {
            return Ok(false);
        }

        let mut record = existing.clone();
        record.sync_status = SyncStatus::Synced;
        record.needs_sync = false;

        self.write_record(&record).await?;
        self.records.insert(id, record);
        Ok(true)
    }

    pub fn get(&self, id: Uuid) -> Option<CachedRecipe> {
        self.records.get(&id).cloned()
    }

    /// All records, most recently modified first.
    pub fn list(&self) -> Vec<CachedRecipe> {
        let mut records: Vec<CachedRecipe> = self.records.values().cloned().collect();
        sort_newest_first(&mut records);
        records
    }

    /// Records with the given status, most recently modified first.
    pub fn list_by_status(&self, status: SyncStatus) -> Vec<CachedRecipe> {
        let mut records: Vec<CachedRecipe> = self
            .records
            .values()
            .filter(|r| r.sync_status == status)
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        records
    }

    pub async fn put_image(&mut self, id: Uuid, bytes: &[u8]) -> Result<(), StoreError> {
        write_atomic(&self.image_path(id), bytes).await
    }

    pub async fn image(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.image_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_image(&mut self, id: Uuid) -> Result<(), StoreError> {
        remove_if_exists(&self.image_path(id)).await
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(RECORDS_DIR).join(format!("{}.json", id))
    }

    fn image_path(&self, id: Uuid) -> PathBuf {
        self.root.join(ASSETS_DIR).join(format!("{}.bin", id))
    }

    async fn write_record(&self, record: &CachedRecipe) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(record.id), &content).await
    }
}

fn sort_newest_first(records: &mut [CachedRecipe]) {
    records.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

/// `None` when there is no version file, `Some(Err(content))` when it does not
/// hold a number.
async fn read_version(root: &Path) -> Result<Option<Result<u32, String>>, StoreError> {
    match fs::read_to_string(root.join(VERSION_FILE)).await {
        Ok(content) => Ok(Some(
            content.trim().parse::<u32>().map_err(|_| content.clone()),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn reset(root: &Path) -> Result<(), StoreError> {
    for dir in [RECORDS_DIR, ASSETS_DIR] {
        let path = root.join(dir);
        if fs::try_exists(&path).await? {
            fs::remove_dir_all(&path).await?;
        }
        fs::create_dir_all(&path).await?;
    }
    write_atomic(&root.join(VERSION_FILE), SCHEMA_VERSION.to_string().as_bytes()).await?;
    info!("Initialised recipe cache at {}", root.display());
    Ok(())
}

async fn load_records(dir: &Path) -> Result<HashMap<Uuid, CachedRecipe>, StoreError> {
    let mut records = HashMap::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let parsed = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<CachedRecipe>(&bytes).map_err(StoreError::from),
            Err(e) => Err(e.into()),
        };
        match parsed {
            Ok(record) => {
                records.insert(record.id, record);
            }
            Err(e) => warn!("Skipping unreadable cache record {}: {}", path.display(), e),
        }
    }

    Ok(records)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
