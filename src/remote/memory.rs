use super::{RemoteRecord, RemoteStore};
use crate::error::RemoteError;
use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    records: HashMap<Uuid, RemoteRecord>,
    failing_saves: HashSet<Uuid>,
    failing_deletes: HashSet<Uuid>,
    fetch_failure: Option<RemoteError>,
    calls: usize,
}

/// In-process remote store.
///
/// Used when no remote service is configured, and as the test double for the
/// sync engine: failures can be injected per record id or for fetch-all.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if another device had uploaded it
    pub async fn insert(&self, record: RemoteRecord) {
        let mut state = self.state.lock().await;
        state.records.insert(record.id(), record);
    }

    pub async fn get(&self, id: Uuid) -> Option<RemoteRecord> {
        self.state.lock().await.records.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of remote calls made so far
    pub async fn calls(&self) -> usize {
        self.state.lock().await.calls
    }

    /// Make `save`/`update` of `id` fail with a generic error
    pub async fn fail_save(&self, id: Uuid) {
        self.state.lock().await.failing_saves.insert(id);
    }

    /// Make `delete` of `id` fail with a generic error
    pub async fn fail_delete(&self, id: Uuid) {
        self.state.lock().await.failing_deletes.insert(id);
    }

    /// Make every `fetch_all` fail with `error`, or succeed again with `None`
    pub async fn fail_fetch_all(&self, error: Option<RemoteError>) {
        self.state.lock().await.fetch_failure = error;
    }

    /// Remove all injected failures
    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.failing_saves.clear();
        state.failing_deletes.clear();
        state.fetch_failure = None;
    }

    fn injected(id: Uuid) -> RemoteError {
        RemoteError::Rejected {
            status: 500,
            message: format!("injected failure for {}", id),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn save(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if state.failing_saves.contains(&record.id()) {
            return Err(Self::injected(record.id()));
        }
        debug!("memory remote: save {}", record.id());
        state.records.insert(record.id(), record.clone());
        Ok(record.clone())
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if let Some(error) = &state.fetch_failure {
            return Err(error.clone());
        }
        Ok(state.records.values().cloned().collect())
    }

    async fn update(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        {
            let state = self.state.lock().await;
            if !state.records.contains_key(&record.id()) {
                return Err(RemoteError::NotFound(record.id().to_string()));
            }
        }
        self.save(record).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if state.failing_deletes.contains(&id) {
            return Err(Self::injected(id));
        }
        match state.records.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(id.to_string())),
        }
    }
}
