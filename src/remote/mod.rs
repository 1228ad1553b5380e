mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use crate::config::{RemoteBackend, RemoteConfig};
use crate::error::{ConfigError, RemoteError};
use crate::model::Recipe;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A recipe as exchanged with the remote store, plus its optional image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(flatten)]
    pub recipe: Recipe,
    /// Raw image bytes, base64 encoded on the wire
    #[serde(default, skip_serializing_if = "Option::is_none", with = "image_base64")]
    pub image: Option<Vec<u8>>,
}

impl RemoteRecord {
    pub fn new(recipe: Recipe, image: Option<Vec<u8>>) -> Self {
        Self { recipe, image }
    }

    pub fn id(&self) -> Uuid {
        self.recipe.id
    }
}

/// The remote record store the sync engine talks to.
///
/// `update` is save-if-exists; the engine treats `save` and `update` the same.
/// `delete` of an unknown id must fail with [`RemoteError::NotFound`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Backend name for logging (e.g. "memory", "http")
    fn backend_name(&self) -> &str;

    async fn save(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError>;

    async fn fetch_all(&self) -> Result<Vec<RemoteRecord>, RemoteError>;

    async fn update(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError>;

    async fn delete(&self, id: Uuid) -> Result<(), RemoteError>;
}

/// Build the remote store selected by configuration.
pub fn from_config(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, ConfigError> {
    let store: Arc<dyn RemoteStore> = match config.backend {
        RemoteBackend::Memory => Arc::new(MemoryRemoteStore::new()),
        RemoteBackend::Http => Arc::new(HttpRemoteStore::new(config)?),
    };
    info!("Using '{}' remote store", store.backend_name());
    Ok(store)
}

mod image_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(image: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match image {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
