use std::{fmt, path::PathBuf, time::Duration};

use gallery_core::opaque::{AlbumIdCipher, OpaqueIdError};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_STORAGE_ROOT: &str = "./data/buckets";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Fully resolved gallery configuration.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per bucket.
    pub root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a bucket listing stays fresh.
    pub ttl: Duration,
    /// Period of the expired-entry sweeper. Zero disables it.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// AES-256 key for opaque album ids, as 64 hex characters.
    pub id_key: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("id_key", &"<redacted>")
            .finish()
    }
}

impl SecurityConfig {
    pub fn cipher(&self) -> Result<AlbumIdCipher, OpaqueIdError> {
        AlbumIdCipher::from_hex(&self.id_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
