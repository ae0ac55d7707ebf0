use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, Utc};

use crate::{
    error::ModelError,
    ids::{AlbumId, BucketName},
    media::Media,
    tag::{Tag, upsert_tag},
};

/// Right granted on an album to another user or to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum Permission {
    /// View the album and its media.
    AlbumRead,
    /// Upload or remove media.
    AlbumWrite,
    /// Edit album details.
    AlbumEdit,
    /// Delete the album.
    AlbumDelete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::AlbumRead,
        Permission::AlbumWrite,
        Permission::AlbumEdit,
        Permission::AlbumDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::AlbumRead => "album.read",
            Permission::AlbumWrite => "album.write",
            Permission::AlbumEdit => "album.edit",
            Permission::AlbumDelete => "album.delete",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "album.read" => Ok(Permission::AlbumRead),
            "album.write" => Ok(Permission::AlbumWrite),
            "album.edit" => Ok(Permission::AlbumEdit),
            "album.delete" => Ok(Permission::AlbumDelete),
            other => Err(ModelError::InvalidPermission(other.to_string())),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.as_str().to_string()
    }
}

/// Permissions keyed by grantee (user id or group name).
pub type PermissionMap = BTreeMap<String, BTreeSet<Permission>>;

/// Catalog record of an album.
///
/// `photos` and `videos` are not persisted; they are filled from the bucket
/// listing when a single album is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub bucket: BucketName,
    pub thumbnail: Option<String>,
    pub user_permissions: PermissionMap,
    pub group_permissions: PermissionMap,
    /// Ordered by name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Vec<Tag>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub photos: Vec<Media>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub videos: Vec<Media>,
}

impl Album {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// True if the user holds at least one permission on this album.
    pub fn has_user_permissions(&self, user_id: &str) -> bool {
        self.user_permissions
            .get(user_id)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn has_user_permission(
        &self,
        user_id: &str,
        permission: Permission,
    ) -> bool {
        self.user_permissions
            .get(user_id)
            .is_some_and(|set| set.contains(&permission))
    }

    /// True if the group holds at least one permission on this album.
    pub fn has_group_permissions(&self, group: &str) -> bool {
        self.group_permissions
            .get(group)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn has_group_permission(
        &self,
        group: &str,
        permission: Permission,
    ) -> bool {
        self.group_permissions
            .get(group)
            .is_some_and(|set| set.contains(&permission))
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}

/// Payload for creating an album. The bucket name and id are assigned
/// during creation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewAlbum {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub thumbnail: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub user_permissions: PermissionMap,
    #[cfg_attr(feature = "serde", serde(default))]
    pub group_permissions: PermissionMap,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Vec<Tag>,
}

impl NewAlbum {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            location: None,
            created_at: Utc::now(),
            owner_id: owner_id.into(),
            thumbnail: None,
            user_permissions: PermissionMap::new(),
            group_permissions: PermissionMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Add a tag; a tag with the same name is replaced.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        upsert_tag(&mut self.tags, tag);
        self
    }

    pub fn into_album(self, id: AlbumId, bucket: BucketName) -> Album {
        Album {
            id,
            name: self.name,
            description: self.description,
            location: self.location,
            created_at: self.created_at,
            owner_id: self.owner_id,
            bucket,
            thumbnail: self.thumbnail,
            user_permissions: self.user_permissions,
            group_permissions: self.group_permissions,
            tags: self.tags,
            photos: Vec::new(),
            videos: Vec::new(),
        }
    }
}
