pub mod config;
pub mod error;
pub mod extractors;
pub mod fetchers;
pub mod importer;
pub mod ingredient;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;
pub mod text;

pub use config::AppConfig;
pub use error::{ExtractError, ImportError, RemoteError, StoreError, SyncError};
pub use importer::RecipeExtractor;
pub use ingredient::parse_ingredient_line;
pub use model::{CachedRecipe, Ingredient, Instructions, Recipe, SyncStatus};
pub use remote::{RemoteRecord, RemoteStore};
pub use store::CacheStore;
pub use sync::{SyncEngine, SyncReport, SyncState};

/// Fetch a recipe page with the default settings and extract its recipe.
pub async fn fetch_recipe(url: &str) -> Result<Recipe, ExtractError> {
    RecipeExtractor::new(&config::FetchConfig::default())?
        .extract(url)
        .await
}

/// Open the cache and remote store described by `config`.
pub async fn open_engine(config: &AppConfig) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let store = CacheStore::open(&config.cache_dir).await?;
    let remote = remote::from_config(&config.remote)?;
    Ok(SyncEngine::new(store, remote))
}
