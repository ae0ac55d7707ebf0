//! # Gallery Core
//!
//! Album aggregation, filtering and caching engine for the gallery backend.
//!
//! ## Overview
//!
//! - **Filters**: typed album and user predicates, compiled from a filter kind
//!   and a loosely shaped value, and rendered into SQL for the catalog
//! - **Sorting**: stable ordering by name, location or date
//! - **Storage**: object store port with filesystem and in-memory adapters,
//!   fronted by a read-through listing cache with single-flight misses
//! - **Catalog**: album repository port with Postgres and in-memory adapters
//! - **Query**: merge of personal and shared albums visible to a principal
//! - **Search**: boolean expressions over album fields and tags, applied to
//!   the merged set
//! - **Service**: album lifecycle that keeps bucket and catalog record in step
//!
//! ## Feature Flags
//!
//! - `database`: Postgres catalog adapter and embedded migrations (default)
//!
//! ## Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use gallery_core::{application::GalleryContext, opaque::AlbumIdCipher};
//! use gallery_model::{NewAlbum, User};
//!
//! async fn create_and_list() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = GalleryContext::in_memory(
//!         Duration::from_secs(300),
//!         AlbumIdCipher::new(&[0u8; 32]),
//!     );
//!     let owner = User::new("u1", "ann");
//!     ctx.album_service().create(NewAlbum::new("Trip", &owner.id)).await?;
//!
//!     let page = ctx.album_query().personal(true).all(&owner).await?;
//!     println!("{} album(s)", page.total);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Per-album access policies
pub mod access;

/// Shared application context
pub mod application;

/// Album catalog port and adapters
pub mod catalog;

/// Error types shared by the catalog and storage layers
pub mod error;

/// Filter predicate engine
pub mod filter;

/// Identity provider port and user listings
pub mod identity;

/// Opaque external album ids
pub mod opaque;

/// Visible-album aggregation
pub mod query;

/// Album search expressions
pub mod search;

/// Album lifecycle service
pub mod service;

/// Album sort engine
pub mod sort;

/// Object storage port, adapters and listing cache
pub mod storage;

#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{CatalogError, StorageError};
pub use filter::{FilterError, FilterKind, FilterValue};
pub use query::{AlbumPage, AlbumQuery, QueryError};
pub use search::{AlbumSearch, SearchError};
pub use service::{AlbumService, ServiceError};
pub use sort::{AlbumSorter, SortKey, SortOrder};
