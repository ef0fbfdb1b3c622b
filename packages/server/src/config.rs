use std::fmt;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

/// Which record store backs entries and company profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// Hosted document database reachable over the network (`firebase`).
    Cloud,
    /// Document store on the server's own disk (`mongodb`).
    Local,
    /// Per-user keyed blobs, the browser persistence model (`localStorage`).
    #[default]
    BrowserLocal,
}

impl StorageBackend {
    /// Resolve a configured value. Unknown and empty values select
    /// [`StorageBackend::BrowserLocal`].
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloud" | "cloud-document-db" | "firebase" => Self::Cloud,
            "local" | "local-document-db" | "mongodb" => Self::Local,
            "browser-local" | "localstorage" => Self::BrowserLocal,
            other => {
                if !other.is_empty() {
                    tracing::warn!(value = other, "Unknown storage backend, using browser-local");
                }
                Self::BrowserLocal
            }
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
            Self::BrowserLocal => "browser-local",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Cloud => "Cloud document database",
            Self::Local => "Local document database",
            Self::BrowserLocal => "Browser-local storage",
        }
    }

    /// Backends tried, in order, when this one fails.
    pub fn fallbacks(self) -> &'static [StorageBackend] {
        match self {
            Self::Cloud => &[Self::Local, Self::BrowserLocal],
            Self::Local => &[Self::BrowserLocal],
            Self::BrowserLocal => &[],
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl<'de> Deserialize<'de> for StorageBackend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_setting(&raw))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudStoreConfig {
    /// Database URL, e.g. `postgres://...` or `sqlite://...`.
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// How often poll-based subscriptions re-read the store.
    pub poll_interval_ms: u64,
    pub cloud: Option<CloudStoreConfig>,
    /// Root directory of the local document store.
    pub local_dir: PathBuf,
    /// Where browser-local keys are mirrored. Memory only when unset.
    pub browser_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub const MIN_POLL_MS: u64 = 1000;
    pub const MAX_POLL_MS: u64 = 5000;

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.poll_interval_ms
                .clamp(Self::MIN_POLL_MS, Self::MAX_POLL_MS),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub images: ImagesConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("storage.backend", "localStorage")?
            .set_default("storage.poll_interval_ms", 2000)?
            .set_default("storage.local_dir", "./data/local")?
            .set_default("images.dir", "./data/images")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., REPAIRDESK__STORAGE__BACKEND=mongodb)
            .add_source(Environment::with_prefix("REPAIRDESK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
