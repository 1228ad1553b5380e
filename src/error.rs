use thiserror::Error;
use uuid::Uuid;

pub use config::ConfigError;

/// Errors that can occur while extracting a recipe from a web page
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The page URL is not an absolute http(s) URL
    #[error("Invalid recipe URL: {0}")]
    InvalidUrl(String),

    /// The page could not be fetched or was not valid UTF-8 text
    #[error("Could not read the recipe page: {0}")]
    InvalidData(String),

    /// None of the extraction strategies found a recipe
    #[error("No recipe could be found on this page")]
    NoRecipeFound,

    /// Reserved for sites that are known not to work
    #[error("Recipes from {0} are not supported")]
    UnsupportedSite(String),
}

/// Errors reported by the remote record store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The record does not exist remotely
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The remote store asked us to slow down
    #[error("Remote store rate limit reached")]
    RateLimited,

    /// The remote store could not be reached
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// The remote store answered with an error
    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A record could not be encoded or decoded
    #[error("Remote record serialization failed: {0}")]
    Serialization(String),
}

impl RemoteError {
    /// Whether this is the distinguished "record not found" kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Serialization(err.to_string())
        } else {
            RemoteError::Unavailable(err.to_string())
        }
    }
}

/// Errors from the local cache store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cached record could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No cached record with this id
    #[error("No cached recipe with id {0}")]
    NotFound(Uuid),

    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),
}

/// Errors from importing a recipe page straight into the cache
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Engine-level sync failures, kept as observable state rather than returned
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync failed: {0}")]
    Remote(#[from] RemoteError),
}
