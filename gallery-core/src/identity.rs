//! Identity provider port and filtered user listings.

use std::{any::type_name_of_val, collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use gallery_model::User;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::filter::{UserFilter, UserFilters};

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of principals. Users are resolved per request and never stored
/// by the gallery.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<User, IdentityError>;

    async fn list_users(&self) -> Result<Vec<User>, IdentityError>;
}

/// Fixed in-memory directory of users keyed by id.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    users: RwLock<BTreeMap<String, User>>,
}

impl StaticIdentityProvider {
    pub fn new<I>(users: I) -> Self
    where
        I: IntoIterator<Item = User>,
    {
        Self {
            users: RwLock::new(
                users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            ),
        }
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn get_user(&self, id: &str) -> Result<User, IdentityError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| IdentityError::UserNotFound(id.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>, IdentityError> {
        Ok(self.users.read().await.values().cloned().collect())
    }
}

/// Filtered listing of the provider's users, sorted by username.
pub struct UserQuery<P>
where
    P: IdentityProvider + ?Sized,
{
    provider: Arc<P>,
    filters: UserFilters,
}

impl<P> fmt::Debug for UserQuery<P>
where
    P: IdentityProvider + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserQuery")
            .field("provider", &type_name_of_val(self.provider.as_ref()))
            .field("filters", &self.filters)
            .finish()
    }
}

impl<P> UserQuery<P>
where
    P: IdentityProvider + ?Sized,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            filters: UserFilters::new(),
        }
    }

    pub fn filter(mut self, filter: UserFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub async fn all(&self) -> Result<Vec<User>, IdentityError> {
        let mut users = self.filters.apply(self.provider.list_users().await?);
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}
