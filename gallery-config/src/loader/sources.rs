use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::{
    DEFAULT_CACHE_TTL, DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_STORAGE_ROOT, DEFAULT_SWEEP_INTERVAL,
};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub security: FileSecurityConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Durations are humantime strings such as `"5m"` or `"90s"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSecurityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_key: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl FileConfig {
    /// Starter file with every default spelled out.
    pub fn template(database_url: &str, id_key: &str) -> Self {
        Self {
            database: FileDatabaseConfig {
                url: Some(database_url.to_string()),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            storage: FileStorageConfig {
                root: Some(PathBuf::from(DEFAULT_STORAGE_ROOT)),
            },
            cache: FileCacheConfig {
                ttl: Some(humantime::format_duration(DEFAULT_CACHE_TTL).to_string()),
                sweep_interval: Some(
                    humantime::format_duration(DEFAULT_SWEEP_INTERVAL).to_string(),
                ),
            },
            security: FileSecurityConfig {
                id_key: Some(id_key.to_string()),
            },
            logging: FileLoggingConfig {
                filter: Some(DEFAULT_LOG_FILTER.to_string()),
            },
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

pub const ENV_CONFIG_PATH: &str = "GALLERY_CONFIG_PATH";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DATABASE_MAX_CONNECTIONS: &str = "GALLERY_DATABASE_MAX_CONNECTIONS";
pub const ENV_STORAGE_ROOT: &str = "GALLERY_STORAGE_ROOT";
pub const ENV_CACHE_TTL: &str = "GALLERY_CACHE_TTL";
pub const ENV_CACHE_SWEEP_INTERVAL: &str = "GALLERY_CACHE_SWEEP_INTERVAL";
pub const ENV_ID_KEY: &str = "GALLERY_ID_KEY";
pub const ENV_LOG: &str = "GALLERY_LOG";

/// Values taken from the process environment. Every field overrides its
/// file counterpart when present.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub cache_ttl: Option<String>,
    pub cache_sweep_interval: Option<String>,
    pub id_key: Option<String>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var(ENV_CONFIG_PATH).map(PathBuf::from),
            database_url: var(ENV_DATABASE_URL),
            database_max_connections: var(ENV_DATABASE_MAX_CONNECTIONS),
            storage_root: var(ENV_STORAGE_ROOT).map(PathBuf::from),
            cache_ttl: var(ENV_CACHE_TTL),
            cache_sweep_interval: var(ENV_CACHE_SWEEP_INTERVAL),
            id_key: var(ENV_ID_KEY),
            log_filter: var(ENV_LOG),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: std::collections::HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}
