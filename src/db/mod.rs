//! Database layer: the identity store contract and its backends.

pub mod bootstrap;
pub mod firestore;
pub mod memory;

pub use bootstrap::{ConnectionManager, ConnectionStatus, Connector};
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::{Provider, User};
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Uniqueness claims keyed by normalized email
    pub const USER_EMAILS: &str = "user_emails";
    /// Uniqueness claims keyed by `{provider}_{provider_id}`
    pub const PROVIDER_LINKS: &str = "provider_links";
}

/// Persistence for user records. The only place identities get linked.
///
/// Writes are atomic: `insert_user` and `link_provider` either commit every
/// uniqueness claim they touch or none of them.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Create a new user, claiming its email and every linked provider id.
    ///
    /// Fails with `StoreError::Conflict` if any claim is already held.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Set `provider`'s id on an existing user and make it the user's
    /// `oauth_provider`, returning the updated record.
    ///
    /// Fails with `StoreError::Conflict` if the pair is linked elsewhere.
    async fn link_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
    ) -> Result<User, StoreError>;
}

/// Shared handle to a connected identity store.
pub type StoreHandle = Arc<dyn IdentityStore>;

/// Document ID of a provider link claim.
pub(crate) fn provider_link_key(provider: Provider, provider_id: &str) -> String {
    format!("{}_{}", provider, urlencoding::encode(provider_id))
}

/// Document ID of an email claim.
pub(crate) fn email_key(email: &str) -> String {
    urlencoding::encode(&email.to_lowercase()).into_owned()
}
