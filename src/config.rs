use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Directory holding the local recipe cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Web page fetching
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Remote record store
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            fetch: FetchConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

/// Configuration for fetching recipe pages
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User-Agent sent with page requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which remote store implementation to use
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// In-process store, nothing leaves the machine
    #[default]
    Memory,
    /// JSON REST record service
    Http,
}

/// Configuration for the remote record store
#[derive(Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,
    /// Base URL of the record service (http backend only)
    pub base_url: Option<String>,
    /// Bearer token for the record service
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::default(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

// the api key never reaches the logs
impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// Default value functions
fn default_cache_dir() -> PathBuf {
    PathBuf::from("recipe-cache")
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_KEEPER__ prefix
    /// 2. recipe-keeper.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_KEEPER__REMOTE__BASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }
}

/// Load configuration from file and environment variables
///
/// See [`AppConfig::load`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("recipe-keeper").required(false))
        // Use double underscore for nested: RECIPE_KEEPER__REMOTE__BACKEND
        .add_source(
            Environment::with_prefix("RECIPE_KEEPER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
