//! Core data model definitions shared across gallery crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod album;
pub mod error;
pub mod ids;
pub mod media;
pub mod tag;
pub mod user;

pub use album::{Album, NewAlbum, Permission, PermissionMap};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AlbumId, BucketName};
pub use media::{Media, MediaType};
pub use tag::Tag;
pub use user::{Group, Role, User};
