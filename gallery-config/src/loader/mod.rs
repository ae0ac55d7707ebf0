use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use once_cell::sync::Lazy;
use thiserror::Error;
use url::Url;

use crate::models::{
    CacheConfig, ConfigMetadata, DEFAULT_MAX_CONNECTIONS, DEFAULT_STORAGE_ROOT,
    DatabaseConfig, GalleryConfig, LoggingConfig, SecurityConfig, StorageConfig,
};
use gallery_core::opaque::OpaqueIdError;

pub mod sources;

pub use sources::{EnvConfig, FileConfig};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("gallery.toml"),
        PathBuf::from("config/gallery.toml"),
    ]
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to load env file")]
    EnvFile(#[from] dotenvy::Error),
    #[error("database url is not configured (set DATABASE_URL)")]
    MissingDatabaseUrl,
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("database URL scheme '{0}' is not postgres")]
    UnsupportedDatabaseScheme(String),
    #[error("invalid max connections '{0}'")]
    InvalidMaxConnections(String),
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("cache ttl must be greater than zero")]
    ZeroCacheTtl,
    #[error("album id key is not configured (set GALLERY_ID_KEY)")]
    MissingIdKey,
    #[error("invalid album id key: {0}")]
    InvalidIdKey(#[source] OpaqueIdError),
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Resolves [`GalleryConfig`] from an optional TOML file, a `.env` file and
/// the process environment. Environment values win over the file.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
    env: Option<EnvConfig>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options, env: None }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Use these values instead of reading `.env` and the process
    /// environment.
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<GalleryConfig, ConfigError> {
        let (env, env_file_loaded) = match &self.env {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file, config_path) = self.load_file_config(&env)?;
        let mut config = compose(file.unwrap_or_default(), env)?;
        config.metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        Ok(config)
    }

    fn load_env_file(&self) -> Result<bool, ConfigError> {
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigError> {
        let path = match (&self.options.config_path, &env.config_path) {
            (Some(explicit), _) | (None, Some(explicit)) => {
                if !explicit.exists() {
                    return Err(ConfigError::MissingConfig {
                        path: explicit.clone(),
                    });
                }
                explicit.clone()
            }
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose(file: FileConfig, env: EnvConfig) -> Result<GalleryConfig, ConfigError> {
    let FileConfig {
        database: file_database,
        storage: file_storage,
        cache: file_cache,
        security: file_security,
        logging: file_logging,
    } = file;

    let url = env
        .database_url
        .or(file_database.url)
        .ok_or(ConfigError::MissingDatabaseUrl)?;
    validate_database_url(&url)?;

    let max_connections = match env.database_max_connections {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxConnections(raw))?,
        None => match file_database.max_connections {
            Some(0) => return Err(ConfigError::InvalidMaxConnections("0".into())),
            Some(n) => n,
            None => DEFAULT_MAX_CONNECTIONS,
        },
    };

    let root = env
        .storage_root
        .or(file_storage.root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT));

    let defaults = CacheConfig::default();
    let ttl = resolve_duration("cache.ttl", env.cache_ttl.or(file_cache.ttl))?
        .unwrap_or(defaults.ttl);
    if ttl.is_zero() {
        return Err(ConfigError::ZeroCacheTtl);
    }
    let sweep_interval = resolve_duration(
        "cache.sweep_interval",
        env.cache_sweep_interval.or(file_cache.sweep_interval),
    )?
    .unwrap_or(defaults.sweep_interval);

    let id_key = env
        .id_key
        .or(file_security.id_key)
        .map(|key| key.trim().to_string())
        .ok_or(ConfigError::MissingIdKey)?;
    let security = SecurityConfig { id_key };
    security.cipher().map_err(ConfigError::InvalidIdKey)?;

    let logging = env
        .log_filter
        .or(file_logging.filter)
        .map(|filter| LoggingConfig { filter })
        .unwrap_or_default();

    Ok(GalleryConfig {
        database: DatabaseConfig {
            url,
            max_connections,
        },
        storage: StorageConfig { root },
        cache: CacheConfig {
            ttl,
            sweep_interval,
        },
        security,
        logging,
        metadata: ConfigMetadata::default(),
    })
}

fn validate_database_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|source| ConfigError::InvalidDatabaseUrl { source })?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(ConfigError::UnsupportedDatabaseScheme(other.to_string())),
    }
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigError::InvalidDuration {
                field,
                value,
                source,
            }
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        EnvConfig::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = compose(
            FileConfig::default(),
            env(&[
                ("DATABASE_URL", "postgres://localhost/gallery"),
                ("GALLERY_ID_KEY", KEY),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.root, PathBuf::from("./data/buckets"));
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn rejects_non_postgres_urls() {
        let err = compose(
            FileConfig::default(),
            env(&[("DATABASE_URL", "mysql://db/gallery"), ("GALLERY_ID_KEY", KEY)]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDatabaseScheme(s) if s == "mysql"));

        let err = compose(
            FileConfig::default(),
            env(&[("DATABASE_URL", "not a url"), ("GALLERY_ID_KEY", KEY)]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDatabaseUrl { .. }));
    }

    #[test]
    fn rejects_zero_ttl_and_bad_durations() {
        let base = [
            ("DATABASE_URL", "postgresql://localhost/gallery"),
            ("GALLERY_ID_KEY", KEY),
        ];

        let mut pairs = base.to_vec();
        pairs.push(("GALLERY_CACHE_TTL", "0s"));
        assert!(matches!(
            compose(FileConfig::default(), env(&pairs)),
            Err(ConfigError::ZeroCacheTtl)
        ));

        let mut pairs = base.to_vec();
        pairs.push(("GALLERY_CACHE_SWEEP_INTERVAL", "soon"));
        assert!(matches!(
            compose(FileConfig::default(), env(&pairs)),
            Err(ConfigError::InvalidDuration { field: "cache.sweep_interval", .. })
        ));
    }

    #[test]
    fn id_key_must_be_64_hex_chars() {
        let err = compose(
            FileConfig::default(),
            env(&[("DATABASE_URL", "postgres://db/g"), ("GALLERY_ID_KEY", "abcd")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdKey(OpaqueIdError::InvalidKey(2))));

        let err = compose(
            FileConfig::default(),
            env(&[("DATABASE_URL", "postgres://db/g")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingIdKey));
    }
}
