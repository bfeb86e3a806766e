//! User model for storage and API.

use crate::models::identity::{ExternalIdentity, Provider};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Account role. The identity flow only ever assigns the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

/// User profile stored in Firestore (document ID is `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Local identifier, assigned once at creation
    pub id: String,
    /// Primary linking key (may be a synthesized placeholder)
    pub email: String,
    pub name: String,
    /// Profile picture URL
    pub avatar: Option<String>,
    /// Public profile page at the provider
    pub profile_url: Option<String>,
    /// Provider that most recently created or linked the account
    pub oauth_provider: Option<Provider>,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
    pub linkedin_id: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub badges: Vec<String>,
    /// When the account was created (RFC 3339)
    pub created_at: String,
    /// Last identity-flow write (RFC 3339)
    pub updated_at: String,
}

impl User {
    /// Build a brand new account from a first-time external identity.
    pub fn from_identity(identity: &ExternalIdentity, now: &str) -> Self {
        let email = identity
            .email
            .clone()
            .unwrap_or_else(|| identity.provider.placeholder_email(&identity.provider_id));

        let mut user = Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: identity.preferred_name(),
            avatar: identity.avatar.clone(),
            profile_url: identity.profile_url.clone(),
            oauth_provider: Some(identity.provider),
            github_id: None,
            google_id: None,
            linkedin_id: None,
            role: Role::default(),
            skills: Vec::new(),
            badges: vec![identity.provider.welcome_badge().to_string()],
            created_at: now.to_string(),
            updated_at: now.to_string(),
        };
        user.set_provider_id(identity.provider, identity.provider_id.clone());
        user
    }

    /// External id linked for `provider`, if any.
    pub fn provider_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Github => self.github_id.as_deref(),
            Provider::Google => self.google_id.as_deref(),
            Provider::Linkedin => self.linkedin_id.as_deref(),
        }
    }

    pub fn set_provider_id(&mut self, provider: Provider, provider_id: String) {
        let slot = match provider {
            Provider::Github => &mut self.github_id,
            Provider::Google => &mut self.google_id,
            Provider::Linkedin => &mut self.linkedin_id,
        };
        *slot = Some(provider_id);
    }

    /// Every (provider, id) pair linked to this account.
    pub fn linked_providers(&self) -> Vec<(Provider, &str)> {
        Provider::ALL
            .into_iter()
            .filter_map(|p| self.provider_id(p).map(|id| (p, id)))
            .collect()
    }
}
