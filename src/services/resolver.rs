// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution: map an external identity onto exactly one local user.
//!
//! First match wins:
//! 1. A user already linked to (provider, provider_id) is returned untouched.
//! 2. A user with the same email gets the provider linked to it.
//! 3. Otherwise a new user is created.
//!
//! A resolution is a pure function of the identity and the store's state;
//! no HTTP is involved.

use crate::db::IdentityStore;
use crate::error::{ResolverError, StoreError};
use crate::models::{ExternalIdentity, User};

/// Resolves external identities against an identity store.
pub struct IdentityResolver<'a> {
    store: &'a dyn IdentityStore,
}

/// How a resolution was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Existing,
    Linked,
    Created,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn IdentityStore) -> Self {
        Self { store }
    }

    /// Resolve `identity` to a local user, creating or linking as needed.
    pub async fn resolve(&self, identity: &ExternalIdentity) -> Result<User, ResolverError> {
        self.resolve_with_outcome(identity)
            .await
            .map(|(user, _)| user)
    }

    /// Like `resolve`, also reporting which path was taken.
    pub async fn resolve_with_outcome(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<(User, Resolution), ResolverError> {
        match self.try_resolve(identity).await {
            // Lost a race with a concurrent login for the same person; the
            // winner's record is now visible.
            Err(ResolverError::Store(StoreError::Conflict(reason))) => {
                tracing::info!(
                    provider = %identity.provider,
                    reason = %reason,
                    "Concurrent identity write detected, resolving again"
                );
                self.try_resolve(identity).await
            }
            other => other,
        }
    }

    async fn try_resolve(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<(User, Resolution), ResolverError> {
        let provider = identity.provider;

        if let Some(user) = self
            .store
            .find_by_provider_id(provider, &identity.provider_id)
            .await?
        {
            tracing::debug!(user_id = %user.id, provider = %provider, "Existing linked user");
            return Ok((user, Resolution::Existing));
        }

        if let Some(email) = identity.email.as_deref() {
            if let Some(user) = self.store.find_by_email(email).await? {
                let existing = user.provider_id(provider).map(str::to_string);
                match existing {
                    None => {}
                    // Linked by a concurrent login since the first lookup.
                    Some(linked) if linked == identity.provider_id => {
                        return Ok((user, Resolution::Existing));
                    }
                    Some(_) => {
                        // Linked pairs are immutable; refuse to repoint it.
                        tracing::warn!(
                            user_id = %user.id,
                            provider = %provider,
                            "Email matches a user linked to a different account at this provider"
                        );
                        return Err(ResolverError::ProviderConflict {
                            provider,
                            user_id: user.id,
                        });
                    }
                }

                let linked = self
                    .store
                    .link_provider(&user.id, provider, &identity.provider_id)
                    .await?;
                tracing::info!(user_id = %linked.id, provider = %provider, "Linked provider by email");
                return Ok((linked, Resolution::Linked));
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let user = User::from_identity(identity, &now);
        self.store.insert_user(&user).await?;
        tracing::info!(
            user_id = %user.id,
            provider = %provider,
            synthesized_email = identity.email.is_none(),
            "Created user from external identity"
        );
        Ok((user, Resolution::Created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Provider;

    #[tokio::test]
    async fn new_identity_creates_user() {
        let store = MemoryStore::new();
        let identity = ExternalIdentity::new(Provider::Linkedin, "li-1")
            .with_email(Some("grace@example.com".to_string()));

        let (user, outcome) = IdentityResolver::new(&store)
            .resolve_with_outcome(&identity)
            .await
            .unwrap();

        assert_eq!(outcome, Resolution::Created);
        assert_eq!(user.email, "grace@example.com");
        assert_eq!(user.linkedin_id.as_deref(), Some("li-1"));
        assert_eq!(user.badges, vec!["LinkedIn User".to_string()]);
    }

    #[tokio::test]
    async fn same_provider_conflict_is_rejected() {
        let store = MemoryStore::new();
        let original = ExternalIdentity::new(Provider::Github, "1")
            .with_email(Some("dev@example.com".to_string()));
        IdentityResolver::new(&store).resolve(&original).await.unwrap();

        let other_account = ExternalIdentity::new(Provider::Github, "2")
            .with_email(Some("dev@example.com".to_string()));
        let err = IdentityResolver::new(&store)
            .resolve(&other_account)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolverError::ProviderConflict {
                provider: Provider::Github,
                ..
            }
        ));
        assert_eq!(store.user_count().await, 1);
    }
}
