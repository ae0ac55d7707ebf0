//! Per-album access decisions.
//!
//! A [`PolicySet`] evaluates a list of [`AccessPolicy`] values against an
//! album and a user, combining them with a [`Strategy`].

use gallery_model::{Album, Permission, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// The user owns the album.
    Owner,
    /// The user has exactly this role.
    Role(Role),
    /// The album grants this permission to the user.
    UserPermission(Permission),
    /// The album grants the user at least one permission.
    AnyUserPermission,
    /// The album grants this permission to one of the user's groups.
    GroupPermission(Permission),
    /// The album grants at least one permission to one of the user's groups.
    AnyGroupPermission,
}

impl AccessPolicy {
    pub fn resolve(&self, album: &Album, user: &User) -> bool {
        match self {
            AccessPolicy::Owner => album.is_owned_by(&user.id),
            AccessPolicy::Role(role) => user.role == *role,
            AccessPolicy::UserPermission(permission) => {
                album.has_user_permission(&user.id, *permission)
            }
            AccessPolicy::AnyUserPermission => {
                album.has_user_permissions(&user.id)
            }
            AccessPolicy::GroupPermission(permission) => user
                .groups
                .iter()
                .any(|group| album.has_group_permission(&group.name, *permission)),
            AccessPolicy::AnyGroupPermission => user
                .groups
                .iter()
                .any(|group| album.has_group_permissions(&group.name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    AtLeastOne,
    Unanimous,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<AccessPolicy>,
    strategy: Strategy,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: AccessPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// An empty set resolves to `false` under both strategies.
    pub fn resolve(&self, album: &Album, user: &User) -> bool {
        if self.policies.is_empty() {
            return false;
        }
        match self.strategy {
            Strategy::AtLeastOne => {
                self.policies.iter().any(|p| p.resolve(album, user))
            }
            Strategy::Unanimous => {
                self.policies.iter().all(|p| p.resolve(album, user))
            }
        }
    }

    fn owner_admin_or(permission: Permission) -> Self {
        Self::new()
            .policy(AccessPolicy::Owner)
            .policy(AccessPolicy::Role(Role::Admin))
            .policy(AccessPolicy::UserPermission(permission))
            .policy(AccessPolicy::GroupPermission(permission))
    }

    /// Owner, admin, or any grant to the user or one of their groups.
    pub fn can_read() -> Self {
        Self::new()
            .policy(AccessPolicy::Owner)
            .policy(AccessPolicy::Role(Role::Admin))
            .policy(AccessPolicy::AnyUserPermission)
            .policy(AccessPolicy::AnyGroupPermission)
    }

    pub fn can_write() -> Self {
        Self::owner_admin_or(Permission::AlbumWrite)
    }

    pub fn can_edit() -> Self {
        Self::owner_admin_or(Permission::AlbumEdit)
    }

    pub fn can_delete() -> Self {
        Self::owner_admin_or(Permission::AlbumDelete)
    }
}
