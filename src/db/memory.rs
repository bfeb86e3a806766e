// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local identity store.
//!
//! Same uniqueness rules as the Firestore backend. Used for local development
//! (`IDENTITY_STORE=memory`) and as the offline store in tests.

use crate::db::{email_key, provider_link_key, IdentityStore};
use crate::error::StoreError;
use crate::models::{Provider, User};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    /// email key -> user id
    emails: HashMap<String, String>,
    /// provider link key -> user id
    links: HashMap<String, String>,
}

/// In-memory identity store. One lock guards all maps so every write is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(id).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .links
            .get(&provider_link_key(provider, provider_id))
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .emails
            .get(&email_key(email))
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} exists", user.id)));
        }

        let email = email_key(&user.email);
        if inner.emails.contains_key(&email) {
            return Err(StoreError::Conflict(format!(
                "email {} already claimed",
                user.email
            )));
        }

        let links: Vec<String> = user
            .linked_providers()
            .into_iter()
            .map(|(provider, id)| provider_link_key(provider, id))
            .collect();
        if let Some(taken) = links.iter().find(|key| inner.links.contains_key(*key)) {
            return Err(StoreError::Conflict(format!("{} already linked", taken)));
        }

        inner.emails.insert(email, user.id.clone());
        for key in links {
            inner.links.insert(key, user.id.clone());
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn link_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;

        let key = provider_link_key(provider, provider_id);
        match inner.links.get(&key) {
            Some(owner) if owner != user_id => {
                return Err(StoreError::Conflict(format!("{} already linked", key)));
            }
            _ => {}
        }

        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        match user.provider_id(provider) {
            Some(existing) if existing == provider_id => return Ok(user.clone()),
            Some(existing) => {
                return Err(StoreError::Conflict(format!(
                    "user {} already linked to {} account {}",
                    user_id, provider, existing
                )));
            }
            None => {}
        }

        user.set_provider_id(provider, provider_id.to_string());
        user.oauth_provider = Some(provider);
        user.updated_at = chrono::Utc::now().to_rfc3339();
        let updated = user.clone();

        inner.links.insert(key, user_id.to_string());

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExternalIdentity;

    fn user_for(provider: Provider, id: &str, email: Option<&str>) -> User {
        let identity =
            ExternalIdentity::new(provider, id).with_email(email.map(str::to_string));
        User::from_identity(&identity, "2026-01-01T00:00:00Z")
    }

    #[tokio::test]
    async fn insert_then_lookup_by_every_key() {
        let store = MemoryStore::new();
        let user = user_for(Provider::Google, "g1", Some("a@x.com"));
        store.insert_user(&user).await.unwrap();

        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store.find_by_provider_id(Provider::Google, "g1").await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(
            store.find_by_email("A@X.com").await.unwrap(),
            Some(user.clone())
        );
        assert!(store
            .find_by_provider_id(Provider::Github, "g1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .insert_user(&user_for(Provider::Google, "g1", Some("a@x.com")))
            .await
            .unwrap();

        let err = store
            .insert_user(&user_for(Provider::Github, "7", Some("a@x.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn link_rejects_pair_owned_by_another_user() {
        let store = MemoryStore::new();
        let first = user_for(Provider::Github, "7", Some("a@x.com"));
        let second = user_for(Provider::Google, "g2", Some("b@x.com"));
        store.insert_user(&first).await.unwrap();
        store.insert_user(&second).await.unwrap();

        let err = store
            .link_provider(&second.id, Provider::Github, "7")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let linked = store
            .link_provider(&second.id, Provider::Linkedin, "li-9")
            .await
            .unwrap();
        assert_eq!(linked.linkedin_id.as_deref(), Some("li-9"));
        assert_eq!(linked.oauth_provider, Some(Provider::Linkedin));
    }

    #[tokio::test]
    async fn link_never_repoints_a_provider() {
        let store = MemoryStore::new();
        let user = user_for(Provider::Google, "g1", Some("a@x.com"));
        store.insert_user(&user).await.unwrap();

        store
            .link_provider(&user.id, Provider::Github, "1")
            .await
            .unwrap();
        let again = store
            .link_provider(&user.id, Provider::Github, "1")
            .await
            .unwrap();
        assert_eq!(again.github_id.as_deref(), Some("1"));

        let err = store
            .link_provider(&user.id, Provider::Github, "2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let owner = store
            .find_by_provider_id(Provider::Github, "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.id, user.id);
        assert_eq!(owner.github_id.as_deref(), Some("1"));
        assert!(store
            .find_by_provider_id(Provider::Github, "2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn link_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .link_provider("missing", Provider::Google, "g1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
