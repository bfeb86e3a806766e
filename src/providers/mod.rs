// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External identity provider adapters.
//!
//! The registry only contains adapters whose credentials are configured;
//! a missing entry means "not configured" and no handshake is ever attempted.

pub mod github;
pub mod google;
pub mod linkedin;
pub mod oauth;

pub use github::GithubAdapter;
pub use google::GoogleAdapter;
pub use linkedin::LinkedinAdapter;

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::{ExternalIdentity, Provider};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One external identity provider's OAuth handshake.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Consent screen URL to redirect the user agent to.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange the callback code and normalize the provider's profile.
    async fn complete_handshake(&self, code: &str) -> Result<ExternalIdentity, ProviderError>;
}

/// Which providers can be offered as login buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProviderAvailability {
    pub github: bool,
    pub google: bool,
    pub linkedin: bool,
}

/// Configured provider adapters, keyed by provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build adapters for every provider with both client id and secret set.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        for provider in Provider::ALL {
            let Some(credentials) = config.provider_credentials(provider) else {
                tracing::info!(provider = %provider, "OAuth provider not configured");
                continue;
            };

            tracing::info!(
                provider = %provider,
                callback_url = %credentials.callback_url,
                "Initializing OAuth provider"
            );

            let timeout = config.provider_http_timeout;
            let adapter: Arc<dyn ProviderAdapter> = match provider {
                Provider::Github => Arc::new(GithubAdapter::new(credentials, timeout)?),
                Provider::Google => Arc::new(GoogleAdapter::new(credentials, timeout)?),
                Provider::Linkedin => Arc::new(LinkedinAdapter::new(credentials, timeout)?),
            };
            adapters.push(adapter);
        }

        Ok(Self::from_adapters(adapters))
    }

    /// Registry from explicit adapters (tests, custom deployments).
    pub fn from_adapters(adapters: impl IntoIterator<Item = Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.provider(), adapter))
                .collect(),
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider)
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    pub fn availability(&self) -> ProviderAvailability {
        ProviderAvailability {
            github: self.is_configured(Provider::Github),
            google: self.is_configured(Provider::Google),
            linkedin: self.is_configured(Provider::Linkedin),
        }
    }
}
