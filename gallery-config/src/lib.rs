//! Configuration loading and process bootstrap for the gallery backend.
//!
//! [`ConfigLoader`] resolves a [`GalleryConfig`] from `gallery.toml`, a
//! `.env` file and the environment; [`telemetry::init_tracing`] installs
//! the subscriber; [`GalleryRuntime::bootstrap`] connects Postgres, runs
//! migrations and wires the storage cache into a
//! [`gallery_core::application::GalleryContext`].

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod runtime;
pub mod telemetry;

pub use loader::{ConfigError, ConfigLoader, ConfigLoaderOptions, EnvConfig, FileConfig};
pub use models::{
    CacheConfig, ConfigMetadata, DatabaseConfig, GalleryConfig, LoggingConfig,
    SecurityConfig, StorageConfig,
};
pub use runtime::GalleryRuntime;
