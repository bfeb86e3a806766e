// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External identity providers and the normalized identity they produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::ValidateEmail;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Supported external identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Code-hosting provider.
    Github,
    /// Generic account provider.
    Google,
    /// Professional-network provider.
    Linkedin,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Github, Provider::Google, Provider::Linkedin];

    /// Lowercase key used in URLs, config and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Google => "google",
            Provider::Linkedin => "linkedin",
        }
    }

    /// Human-readable name for log lines and error bodies.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Github => "GitHub",
            Provider::Google => "Google",
            Provider::Linkedin => "LinkedIn",
        }
    }

    /// Stored field holding this provider's external id on a `User`.
    pub fn id_field(&self) -> &'static str {
        match self {
            Provider::Github => "github_id",
            Provider::Google => "google_id",
            Provider::Linkedin => "linkedin_id",
        }
    }

    /// Badge granted to users created through this provider.
    pub fn welcome_badge(&self) -> &'static str {
        match self {
            Provider::Github => "GitHub User",
            Provider::Google => "Google User",
            Provider::Linkedin => "LinkedIn User",
        }
    }

    /// Placeholder email for accounts whose provider withheld one.
    ///
    /// Provider ids are unique per provider, so the result never collides.
    pub fn placeholder_email(&self, provider_id: &str) -> String {
        match self {
            Provider::Github => format!("github_{}@users.noreply.github.com", provider_id),
            Provider::Google => format!("google_{}@users.noreply.google.com", provider_id),
            Provider::Linkedin => format!("linkedin_{}@users.noreply.linkedin.com", provider_id),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown identity provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Provider::Github),
            "google" => Ok(Provider::Google),
            "linkedin" => Ok(Provider::Linkedin),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Identity returned by a provider handshake, normalized across providers.
///
/// Transient: produced by an adapter and consumed once by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: Provider,
    pub provider_id: String,
    pub display_name: Option<String>,
    /// Provider login/handle, used when no display name is set.
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub profile_url: Option<String>,
}

impl ExternalIdentity {
    pub fn new(provider: Provider, provider_id: impl Into<String>) -> Self {
        Self {
            provider,
            provider_id: provider_id.into(),
            display_name: None,
            username: None,
            email: None,
            avatar: None,
            profile_url: None,
        }
    }

    /// Attach an email, normalized; malformed addresses are dropped.
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email.and_then(|e| normalize_email(&e));
        self
    }

    /// Name for a freshly created account.
    pub fn preferred_name(&self) -> String {
        non_empty(self.display_name.as_deref())
            .or_else(|| non_empty(self.username.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} user {}", self.provider.display_name(), self.provider_id))
    }
}

/// Trim and lowercase an email, returning `None` if it is not a valid address.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.validate_email() {
        Some(email)
    } else {
        None
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_roundtrips_through_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
        assert!("gitlab".parse::<Provider>().is_err());
    }

    #[test]
    fn github_placeholder_email_matches_noreply_format() {
        assert_eq!(
            Provider::Github.placeholder_email("42"),
            "github_42@users.noreply.github.com"
        );
    }

    #[test]
    fn normalize_email_lowercases_and_rejects_garbage() {
        assert_eq!(
            normalize_email("  Alice@Example.COM "),
            Some("alice@example.com".to_string())
        );
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email(""), None);
    }

    #[test]
    fn preferred_name_falls_back_to_username() {
        let mut identity = ExternalIdentity::new(Provider::Github, "7");
        identity.display_name = Some("   ".to_string());
        identity.username = Some("octocat".to_string());
        assert_eq!(identity.preferred_name(), "octocat");

        identity.username = None;
        assert_eq!(identity.preferred_name(), "GitHub user 7");
    }
}
