use async_trait::async_trait;
use recipe_keeper::model::{Instructions, Step};
use recipe_keeper::remote::MemoryRemoteStore;
use recipe_keeper::{
    CacheStore, Recipe, RemoteError, RemoteRecord, RemoteStore, StoreError, SyncEngine, SyncState,
    SyncStatus,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

async fn engine_with(remote: Arc<dyn RemoteStore>) -> (TempDir, SyncEngine) {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).await.unwrap();
    (dir, SyncEngine::new(store, remote))
}

async fn memory_engine() -> (TempDir, Arc<MemoryRemoteStore>, SyncEngine) {
    let remote = Arc::new(MemoryRemoteStore::new());
    let (dir, engine) = engine_with(remote.clone()).await;
    (dir, remote, engine)
}

#[tokio::test]
async fn test_push_marks_records_synced() {
    let (_dir, remote, engine) = memory_engine().await;
    let recipe = Recipe::new("Tacos");

    let saved = engine.save_recipe(&recipe).await.unwrap();
    assert_eq!(saved.sync_status, SyncStatus::PendingUpload);
    assert!(saved.needs_sync);

    engine.sync_with_remote().await;

    let record = engine.record(recipe.id).await.unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert!(!record.needs_sync);
    assert_eq!(remote.get(recipe.id).await.unwrap().recipe, recipe);

    let report = engine.status().await;
    assert_eq!(report.state, SyncState::Idle);
    assert_eq!(report.pushed, 1);
    assert!(report.last_success.is_some());
    assert!(report.last_error.is_none());
}

#[tokio::test]
async fn test_failed_upload_does_not_abort_batch() {
    let (_dir, remote, engine) = memory_engine().await;
    let bad = Recipe::new("Bad");
    let good = Recipe::new("Good");
    engine.save_recipe(&bad).await.unwrap();
    engine.save_recipe(&good).await.unwrap();
    remote.fail_save(bad.id).await;

    engine.sync_with_remote().await;

    assert_eq!(
        engine.record(bad.id).await.unwrap().sync_status,
        SyncStatus::PendingUpload
    );
    assert_eq!(
        engine.record(good.id).await.unwrap().sync_status,
        SyncStatus::Synced
    );

    let report = engine.status().await;
    assert_eq!(report.pushed, 1);
    assert_eq!(report.failed, 1);
    // per-record failures are not engine-level errors
    assert!(report.last_error.is_none());
    assert!(report.last_success.is_some());
}

#[tokio::test]
async fn test_pull_never_overwrites_pending_upload() {
    let (_dir, remote, engine) = memory_engine().await;
    let mut local = Recipe::new("Local edit");
    engine.save_recipe(&local).await.unwrap();
    remote.fail_save(local.id).await;

    local.name = "Remote version".to_string();
    remote.insert(RemoteRecord::new(local.clone(), None)).await;

    engine.sync_with_remote().await;

    let record = engine.record(local.id).await.unwrap();
    assert_eq!(record.name, "Local edit");
    assert_eq!(record.sync_status, SyncStatus::PendingUpload);
}

#[tokio::test]
async fn test_pull_inserts_and_updates_synced_records() {
    let (_dir, remote, engine) = memory_engine().await;
    let mut shared = Recipe::new("Shared");
    engine.save_recipe(&shared).await.unwrap();
    engine.sync_with_remote().await;

    // another device edits the shared recipe and adds a new one
    shared.name = "Shared v2".to_string();
    remote.insert(RemoteRecord::new(shared.clone(), None)).await;
    let added = Recipe::new("From phone");
    remote
        .insert(RemoteRecord::new(added.clone(), Some(b"photo".to_vec())))
        .await;

    engine.sync_with_remote().await;

    let record = engine.record(shared.id).await.unwrap();
    assert_eq!(record.name, "Shared v2");
    assert_eq!(record.sync_status, SyncStatus::Synced);

    let record = engine.record(added.id).await.unwrap();
    assert_eq!(record.to_recipe(), added);
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert!(!record.needs_sync);
    assert_eq!(engine.image(added.id).await.unwrap(), Some(b"photo".to_vec()));
    assert_eq!(engine.status().await.pulled, 2);
}

#[tokio::test]
async fn test_pull_keeps_records_missing_remotely() {
    let (_dir, remote, engine) = memory_engine().await;
    let recipe = Recipe::new("Keeper");
    engine.save_recipe(&recipe).await.unwrap();
    engine.sync_with_remote().await;

    // gone remotely without a local delete
    remote.delete(recipe.id).await.unwrap();
    engine.sync_with_remote().await;

    assert!(engine.record(recipe.id).await.is_some());
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let (_dir, remote, engine) = memory_engine().await;
    engine.save_recipe(&Recipe::new("One")).await.unwrap();
    engine.save_recipe(&Recipe::new("Two")).await.unwrap();
    remote
        .insert(RemoteRecord::new(Recipe::new("Three"), None))
        .await;

    engine.sync_with_remote().await;
    let first: Vec<_> = engine.recipes().await;
    let snapshot: Vec<_> = {
        let mut records = Vec::new();
        for recipe in &first {
            records.push(engine.record(recipe.id).await.unwrap());
        }
        records
    };

    engine.sync_with_remote().await;
    for before in &snapshot {
        let after = engine.record(before.id).await.unwrap();
        assert_eq!(&after, before);
    }
    assert_eq!(engine.recipes().await, first);

    let report = engine.status().await;
    assert_eq!(report.pushed, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.pulled, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_empty_sections_from_remote_settle_after_one_pull() {
    let (_dir, remote, engine) = memory_engine().await;
    let mut recipe = Recipe::new("Toast");
    recipe.instructions = Instructions::Sections(vec![]);
    remote.insert(RemoteRecord::new(recipe.clone(), None)).await;

    engine.sync_with_remote().await;
    assert_eq!(engine.status().await.pulled, 1);
    let before = engine.record(recipe.id).await.unwrap();

    engine.sync_with_remote().await;
    let report = engine.status().await;
    assert_eq!(report.pulled, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(engine.record(recipe.id).await.unwrap(), before);

    // a real change to the remote copy still comes through
    recipe.instructions = Instructions::Steps(vec![Step::new("Butter the bread")]);
    remote.insert(RemoteRecord::new(recipe.clone(), None)).await;
    engine.sync_with_remote().await;
    assert_eq!(engine.status().await.pulled, 1);
    assert_eq!(engine.record(recipe.id).await.unwrap().to_recipe(), recipe);
}

#[tokio::test]
async fn test_blank_name_is_not_saved() {
    let (_dir, remote, engine) = memory_engine().await;

    let result = engine.save_recipe(&Recipe::new("   ")).await;
    assert!(matches!(result, Err(StoreError::InvalidRecipe(_))));
    assert!(engine.recipes().await.is_empty());

    engine.sync_with_remote().await;
    assert_eq!(remote.len().await, 0);
    assert_eq!(engine.status().await.pushed, 0);
}

#[tokio::test]
async fn test_delete_then_sync_removes_record() {
    let (_dir, remote, engine) = memory_engine().await;
    let recipe = Recipe::new("Soon gone");
    engine.save_recipe(&recipe).await.unwrap();
    engine.sync_with_remote().await;

    engine.delete_recipe(recipe.id).await.unwrap();
    assert_eq!(
        engine.record(recipe.id).await.unwrap().sync_status,
        SyncStatus::PendingDelete
    );

    engine.sync_with_remote().await;

    assert!(engine.record(recipe.id).await.is_none());
    assert!(remote.get(recipe.id).await.is_none());
    assert_eq!(engine.status().await.deleted, 1);
}

#[tokio::test]
async fn test_delete_of_never_uploaded_record() {
    let (_dir, _remote, engine) = memory_engine().await;
    let recipe = Recipe::new("Draft");
    engine.save_recipe(&recipe).await.unwrap();
    engine.delete_recipe(recipe.id).await.unwrap();

    engine.sync_with_remote().await;

    assert!(engine.record(recipe.id).await.is_none());
}

#[tokio::test]
async fn test_failed_delete_stays_pending() {
    let (_dir, remote, engine) = memory_engine().await;
    let recipe = Recipe::new("Sticky");
    engine.save_recipe(&recipe).await.unwrap();
    engine.sync_with_remote().await;

    remote.fail_delete(recipe.id).await;
    engine.delete_recipe(recipe.id).await.unwrap();
    engine.sync_with_remote().await;

    let record = engine.record(recipe.id).await.unwrap();
    assert_eq!(record.sync_status, SyncStatus::PendingDelete);
    assert!(remote.get(recipe.id).await.is_some());
    assert_eq!(engine.status().await.failed, 1);
}

#[tokio::test]
async fn test_fetch_all_failure_is_recorded() {
    let (_dir, remote, engine) = memory_engine().await;
    engine.save_recipe(&Recipe::new("Soup")).await.unwrap();
    engine.sync_with_remote().await;
    let first_success = engine.status().await.last_success.unwrap();

    remote
        .fail_fetch_all(Some(RemoteError::Unavailable("offline".to_string())))
        .await;
    engine.sync_with_remote().await;

    let report = engine.status().await;
    assert_eq!(report.last_success, Some(first_success));
    assert!(report.last_error.unwrap().contains("offline"));

    remote.clear_failures().await;
    engine.sync_with_remote().await;

    let report = engine.status().await;
    assert!(report.last_error.is_none());
    assert!(report.last_success.unwrap() > first_success);
}

/// Remote store whose `fetch_all` parks until released.
struct GatedRemote {
    inner: MemoryRemoteStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RemoteStore for GatedRemote {
    fn backend_name(&self) -> &str {
        "gated"
    }

    async fn save(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        self.inner.save(record).await
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.fetch_all().await
    }

    async fn update(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn test_sync_while_syncing_is_a_no_op() {
    let remote = Arc::new(GatedRemote {
        inner: MemoryRemoteStore::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let (_dir, engine) = engine_with(remote.clone()).await;
    engine.save_recipe(&Recipe::new("Soup")).await.unwrap();

    let second = async {
        remote.entered.notified().await;
        assert_eq!(engine.status().await.state, SyncState::Syncing);

        let calls_before = remote.inner.calls().await;
        engine.sync_with_remote().await;
        assert_eq!(remote.inner.calls().await, calls_before);

        remote.release.notify_one();
    };

    tokio::join!(engine.sync_with_remote(), second);

    let report = engine.status().await;
    assert_eq!(report.state, SyncState::Idle);
    assert_eq!(report.pushed, 1);
    assert!(report.last_success.is_some());
}

#[tokio::test]
async fn test_edit_during_upload_stays_pending() {
    struct EditingRemote {
        inner: MemoryRemoteStore,
        engine: tokio::sync::OnceCell<Arc<SyncEngine>>,
    }

    #[async_trait]
    impl RemoteStore for EditingRemote {
        fn backend_name(&self) -> &str {
            "editing"
        }

        async fn save(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
            if let Some(engine) = self.engine.get() {
                let mut edited = record.recipe.clone();
                edited.name = format!("{} (edited)", edited.name);
                engine.save_recipe(&edited).await.unwrap();
            }
            self.inner.save(record).await
        }

        async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
            self.inner.fetch_all().await
        }

        async fn update(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
            self.inner.update(record).await
        }

        async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
            self.inner.delete(id).await
        }
    }

    let remote = Arc::new(EditingRemote {
        inner: MemoryRemoteStore::new(),
        engine: tokio::sync::OnceCell::new(),
    });
    let dir = TempDir::new().unwrap();
    let store = CacheStore::open(dir.path()).await.unwrap();
    let engine = Arc::new(SyncEngine::new(store, remote.clone()));
    let _ = remote.engine.set(engine.clone());

    let recipe = Recipe::new("Bread");
    engine.save_recipe(&recipe).await.unwrap();
    engine.sync_with_remote().await;

    let record = engine.record(recipe.id).await.unwrap();
    assert_eq!(record.name, "Bread (edited)");
    assert_eq!(record.sync_status, SyncStatus::PendingUpload);
}
