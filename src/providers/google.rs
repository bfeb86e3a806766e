// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth adapter (OpenID Connect userinfo).

use crate::config::ProviderCredentials;
use crate::error::ProviderError;
use crate::models::{ExternalIdentity, Provider};
use crate::providers::oauth::{OAuthClient, ProviderEndpoints};
use crate::providers::ProviderAdapter;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Production Google endpoints.
pub fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        token_url: "https://oauth2.googleapis.com/token".to_string(),
        userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        scopes: &["openid", "profile", "email"],
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub picture: Option<String>,
}

impl GoogleUserInfo {
    pub fn into_identity(self) -> ExternalIdentity {
        // An unverified Google address must not be used to link accounts.
        let verified = self.email_verified.unwrap_or(true);
        let email = self.email.filter(|_| verified);

        ExternalIdentity {
            provider: Provider::Google,
            provider_id: self.sub,
            display_name: self.name,
            username: None,
            email: None,
            avatar: self.picture,
            profile_url: None,
        }
        .with_email(email)
    }
}

pub struct GoogleAdapter {
    client: OAuthClient,
}

impl GoogleAdapter {
    pub fn new(credentials: ProviderCredentials, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_endpoints(credentials, timeout, endpoints())
    }

    pub fn with_endpoints(
        credentials: ProviderCredentials,
        timeout: Duration,
        endpoints: ProviderEndpoints,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: OAuthClient::new(Provider::Google, credentials, endpoints, timeout)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorization_url(&self, state: &str) -> String {
        self.client.authorization_url(state)
    }

    async fn complete_handshake(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let access_token = self.client.exchange_code(code).await?;
        let info: GoogleUserInfo = self.client.fetch_userinfo(&access_token).await?;
        Ok(info.into_identity())
    }
}
