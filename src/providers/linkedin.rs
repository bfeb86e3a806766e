// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LinkedIn OAuth adapter ("Sign In with LinkedIn using OpenID Connect").

use crate::config::ProviderCredentials;
use crate::error::ProviderError;
use crate::models::{ExternalIdentity, Provider};
use crate::providers::oauth::{OAuthClient, ProviderEndpoints};
use crate::providers::ProviderAdapter;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Production LinkedIn endpoints.
pub fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: "https://www.linkedin.com/oauth/v2/authorization".to_string(),
        token_url: "https://www.linkedin.com/oauth/v2/accessToken".to_string(),
        userinfo_url: "https://api.linkedin.com/v2/userinfo".to_string(),
        scopes: &["openid", "profile", "email"],
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkedinUserInfo {
    pub sub: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl LinkedinUserInfo {
    pub fn into_identity(self) -> ExternalIdentity {
        let display_name = self.name.or_else(|| {
            let parts: Vec<String> = [self.given_name, self.family_name]
                .into_iter()
                .flatten()
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        });

        ExternalIdentity {
            provider: Provider::Linkedin,
            provider_id: self.sub,
            display_name,
            username: None,
            email: None,
            avatar: self.picture,
            profile_url: None,
        }
        .with_email(self.email)
    }
}

pub struct LinkedinAdapter {
    client: OAuthClient,
}

impl LinkedinAdapter {
    pub fn new(credentials: ProviderCredentials, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_endpoints(credentials, timeout, endpoints())
    }

    pub fn with_endpoints(
        credentials: ProviderCredentials,
        timeout: Duration,
        endpoints: ProviderEndpoints,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: OAuthClient::new(Provider::Linkedin, credentials, endpoints, timeout)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for LinkedinAdapter {
    fn provider(&self) -> Provider {
        Provider::Linkedin
    }

    fn authorization_url(&self, state: &str) -> String {
        self.client.authorization_url(state)
    }

    async fn complete_handshake(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let access_token = self.client.exchange_code(code).await?;
        let info: LinkedinUserInfo = self.client.fetch_userinfo(&access_token).await?;
        Ok(info.into_identity())
    }
}
