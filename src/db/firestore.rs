// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the identity store.
//!
//! Layout:
//! - `users/{id}`: user records
//! - `user_emails/{email}`: email uniqueness claims
//! - `provider_links/{provider}_{provider_id}`: provider link claims
//!
//! Creating or linking a user writes the record and its claims in one
//! transaction with `exists = false` preconditions on the claims, so two
//! concurrent logins can never both commit. Linking also pins the user
//! document's update time, and never replaces an existing provider id.

use crate::db::{collections, email_key, provider_link_key, IdentityStore};
use crate::error::{ConnectionError, StoreError};
use crate::models::{Provider, User};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::{Deserialize, Serialize};

/// Claim document reserving an email for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailClaim {
    user_id: String,
}

/// Claim document reserving a (provider, provider_id) pair for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProviderLink {
    user_id: String,
    provider: Provider,
    provider_id: String,
    linked_at: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, ConnectionError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| ConnectionError::Failed(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, ConnectionError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            ConnectionError::Failed(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing. Every operation fails with a
    /// backend error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not connected (offline mode)".to_string()))
    }

    /// First user whose `field` equals `value`.
    async fn find_user_by_field(&self, field: &'static str, value: &str) -> Result<Option<User>, StoreError> {
        let value = value.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(store_error)?;

        Ok(users.into_iter().next())
    }

    /// Fetch a user along with the document's last update time.
    async fn get_user_versioned(
        &self,
        id: &str,
    ) -> Result<Option<(User, chrono::DateTime<chrono::Utc>)>, StoreError> {
        let doc = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .one(id)
            .await
            .map_err(store_error)?;

        let Some(doc) = doc else {
            return Ok(None);
        };
        let update_time = doc
            .update_time
            .clone()
            .ok_or_else(|| StoreError::Backend(format!("user {} has no update time", id)))?;
        let read_at = firestore::timestamp_utils::from_timestamp(update_time).map_err(store_error)?;
        let user = firestore::FirestoreDb::deserialize_doc_to::<User>(&doc).map_err(store_error)?;
        Ok(Some((user, read_at)))
    }

    async fn get_provider_link(&self, key: &str) -> Result<Option<ProviderLink>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROVIDER_LINKS)
            .obj()
            .one(key)
            .await
            .map_err(store_error)
    }
}

#[async_trait]
impl IdentityStore for FirestoreDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(store_error)
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.find_user_by_field(provider.id_field(), provider_id)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by_field("email", &email.trim().to_lowercase())
            .await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(store_error)?;

        client
            .fluent()
            .update()
            .in_col(collections::USER_EMAILS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(email_key(&user.email))
            .object(&EmailClaim {
                user_id: user.id.clone(),
            })
            .add_to_transaction(&mut transaction)
            .map_err(store_error)?;

        for (provider, provider_id) in user.linked_providers() {
            let link = ProviderLink {
                user_id: user.id.clone(),
                provider,
                provider_id: provider_id.to_string(),
                linked_at: user.created_at.clone(),
            };
            client
                .fluent()
                .update()
                .in_col(collections::PROVIDER_LINKS)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(provider_link_key(provider, provider_id))
                .object(&link)
                .add_to_transaction(&mut transaction)
                .map_err(store_error)?;
        }

        transaction.commit().await.map_err(store_error)?;

        tracing::info!(user_id = %user.id, provider = ?user.oauth_provider, "User created");
        Ok(())
    }

    async fn link_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
    ) -> Result<User, StoreError> {
        let client = self.get_client()?;

        let (mut user, read_at) = self
            .get_user_versioned(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        match user.provider_id(provider).map(str::to_string) {
            Some(existing) if existing == provider_id => return Ok(user),
            Some(existing) => {
                return Err(StoreError::Conflict(format!(
                    "user {} already linked to {} account {}",
                    user_id, provider, existing
                )));
            }
            None => {}
        }

        let key = provider_link_key(provider, provider_id);
        if let Some(link) = self.get_provider_link(&key).await? {
            if link.user_id != user_id {
                return Err(StoreError::Conflict(format!("{} already linked", key)));
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        user.set_provider_id(provider, provider_id.to_string());
        user.oauth_provider = Some(provider);
        user.updated_at = now.clone();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        // The commit fails if the user changed since it was read, so a
        // concurrent link for the same provider cannot be overwritten.
        client
            .fluent()
            .update()
            .fields([provider.id_field(), "oauth_provider", "updated_at"])
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::UpdateTime(read_at))
            .document_id(user_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(store_error)?;

        let link = ProviderLink {
            user_id: user_id.to_string(),
            provider,
            provider_id: provider_id.to_string(),
            linked_at: now,
        };
        client
            .fluent()
            .update()
            .in_col(collections::PROVIDER_LINKS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&key)
            .object(&link)
            .add_to_transaction(&mut transaction)
            .map_err(store_error)?;

        transaction.commit().await.map_err(store_error)?;

        tracing::info!(user_id, provider = %provider, "Provider linked to existing user");
        Ok(user)
    }
}

fn store_error(err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataConflictError(e) => StoreError::Conflict(e.to_string()),
        FirestoreError::DataNotFoundError(e) => StoreError::NotFound(e.to_string()),
        // Stale update-time precondition, or contention on the same documents.
        FirestoreError::DatabaseError(e)
            if matches!(e.public.code.as_str(), "FailedPrecondition" | "Aborted") =>
        {
            StoreError::Conflict(e.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}
