// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GitHub OAuth adapter.
//!
//! GitHub leaves `email` null on the profile when the user keeps it private,
//! so a second call to `/user/emails` picks one. That call failing never
//! fails the login; the identity just has no email.

use crate::config::ProviderCredentials;
use crate::error::ProviderError;
use crate::models::{normalize_email, ExternalIdentity, Provider};
use crate::providers::oauth::{OAuthClient, ProviderEndpoints};
use crate::providers::ProviderAdapter;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Production GitHub endpoints. Emails are listed under the profile URL.
pub fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: "https://github.com/login/oauth/authorize".to_string(),
        token_url: "https://github.com/login/oauth/access_token".to_string(),
        userinfo_url: "https://api.github.com/user".to_string(),
        scopes: &["user:email"],
    }
}

/// Profile returned by `GET /user`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubProfile {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Entry returned by `GET /user/emails`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

pub struct GithubAdapter {
    client: OAuthClient,
    emails_url: String,
}

impl GithubAdapter {
    pub fn new(credentials: ProviderCredentials, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_endpoints(credentials, timeout, endpoints())
    }

    pub fn with_endpoints(
        credentials: ProviderCredentials,
        timeout: Duration,
        endpoints: ProviderEndpoints,
    ) -> Result<Self, ProviderError> {
        let client = OAuthClient::new(Provider::Github, credentials, endpoints, timeout)?;
        let emails_url = format!("{}/emails", client.userinfo_url().trim_end_matches('/'));
        Ok(Self { client, emails_url })
    }

    /// Best email from `/user/emails`, or `None` if the call fails.
    async fn fetch_primary_email(&self, access_token: &str) -> Option<String> {
        match self
            .client
            .get_json::<Vec<GithubEmail>>(&self.emails_url, access_token)
            .await
        {
            Ok(emails) => select_email(&emails),
            Err(e) => {
                tracing::warn!(provider = "github", error = %e, "Failed to fetch GitHub emails");
                None
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for GithubAdapter {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn authorization_url(&self, state: &str) -> String {
        self.client.authorization_url(state)
    }

    async fn complete_handshake(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let access_token = self.client.exchange_code(code).await?;
        let profile: GithubProfile = self.client.fetch_userinfo(&access_token).await?;

        // A private or malformed profile email counts as missing.
        let email = match profile.email.as_deref().and_then(normalize_email) {
            Some(email) => Some(email),
            None => self.fetch_primary_email(&access_token).await,
        };

        Ok(profile.into_identity(email))
    }
}

impl GithubProfile {
    pub fn into_identity(self, email: Option<String>) -> ExternalIdentity {
        ExternalIdentity {
            provider: Provider::Github,
            provider_id: self.id.to_string(),
            display_name: self.name,
            username: Some(self.login),
            email: None,
            avatar: self.avatar_url,
            profile_url: self.html_url,
        }
        .with_email(email)
    }
}

/// Preference order: primary and verified, then any verified, then the first
/// listed, then none.
pub fn select_email(emails: &[GithubEmail]) -> Option<String> {
    let with_address = || emails.iter().filter(|e| e.email.is_some());

    with_address()
        .find(|e| e.primary && e.verified)
        .or_else(|| with_address().find(|e| e.verified))
        .or_else(|| with_address().next())
        .and_then(|e| e.email.clone())
}
