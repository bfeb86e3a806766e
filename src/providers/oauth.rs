// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization-code OAuth plumbing shared by all provider adapters.
//!
//! Every outbound call goes through a client built with a request timeout, so
//! a slow provider fails with `ProviderError::Timeout` instead of hanging the
//! request.

use crate::config::ProviderCredentials;
use crate::error::ProviderError;
use crate::models::Provider;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// GitHub rejects API calls without a User-Agent.
pub const USER_AGENT: &str = "InturnX-App";

/// Endpoint description of one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    /// Profile endpoint called with the access token.
    pub userinfo_url: String,
    pub scopes: &'static [&'static str],
}

/// Token endpoint response. Some providers (GitHub) answer 200 with an
/// `error` body, so both shapes are accepted.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OAuth client for a single configured provider.
#[derive(Clone)]
pub struct OAuthClient {
    provider: Provider,
    http: reqwest::Client,
    credentials: ProviderCredentials,
    endpoints: ProviderEndpoints,
}

impl OAuthClient {
    pub fn new(
        provider: Provider,
        credentials: ProviderCredentials,
        endpoints: ProviderEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::from_reqwest(provider, e))?;

        Ok(Self {
            provider,
            http,
            credentials,
            endpoints,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Consent screen URL carrying `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.callback_url),
            urlencoding::encode(&self.endpoints.scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.credentials.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;

        let token: TokenResponse = self.check_response_json(response).await?;

        if let Some(error) = token.error {
            return Err(ProviderError::Denied {
                provider: self.provider,
                message: token.error_description.unwrap_or(error),
            });
        }

        token.access_token.ok_or_else(|| ProviderError::InvalidResponse {
            provider: self.provider,
            message: "token response has no access_token".to_string(),
        })
    }

    /// Fetch the profile of the user behind `access_token`.
    pub async fn fetch_userinfo<T: DeserializeOwned>(
        &self,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        self.get_json(&self.endpoints.userinfo_url, access_token)
            .await
    }

    pub fn userinfo_url(&self) -> &str {
        &self.endpoints.userinfo_url
    }

    /// Authenticated GET with a JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.provider,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| match e.is_timeout() {
                true => ProviderError::Timeout {
                    provider: self.provider,
                },
                false => ProviderError::InvalidResponse {
                    provider: self.provider,
                    message: format!("JSON parse error: {}", e),
                },
            })
    }
}
