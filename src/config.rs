//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup. A provider is only "configured" when both its
//! client id and client secret are present.

use crate::models::Provider;
use hkdf::Hkdf;
use sha2::Sha256;
use std::env;
use std::time::Duration;

/// Signing key used only when development mode is explicitly requested.
const DEV_SIGNING_KEY: &[u8] = b"inturnx-insecure-development-signing-key";

const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Which identity store backend to bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store, for local development and tests.
    Memory,
}

/// Raw OAuth settings for one provider, as read from the environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Overrides the default `{client_url}/api/auth/{provider}/callback`
    pub callback_url: Option<String>,
}

/// Complete credentials for a configured provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Client application base URL (redirect target, default callback base)
    pub client_url: String,
    pub github: ProviderSettings,
    pub google: ProviderSettings,
    pub linkedin: ProviderSettings,
    /// HS256 key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter, derived from the signing key
    pub oauth_state_key: Vec<u8>,
    /// True when running with the development signing key
    pub insecure_dev_key: bool,
    /// `APP_ENV == production`; controls `Secure` cookies
    pub production: bool,
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Upper bound for one database bootstrap attempt
    pub db_connect_timeout: Duration,
    /// Upper bound for each outbound provider call
    pub provider_http_timeout: Duration,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let production = env::var("APP_ENV")
            .map(|v| !v.eq_ignore_ascii_case("development"))
            .unwrap_or(true);

        let (jwt_signing_key, insecure_dev_key) = match non_empty_var("JWT_SECRET") {
            Some(secret) => (secret.into_bytes(), false),
            None if !production && flag_var("ALLOW_INSECURE_DEV_KEY") => {
                tracing::warn!(
                    "JWT_SECRET is not set: using the INSECURE development signing key. \
                     Sessions can be forged by anyone who reads the source. \
                     Never run this configuration in production."
                );
                (DEV_SIGNING_KEY.to_vec(), true)
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let store_backend = match env::var("IDENTITY_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(other) => return Err(ConfigError::Invalid("IDENTITY_STORE", other.to_string())),
        };

        Ok(Self {
            client_url: non_empty_var("CLIENT_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string()),
            github: provider_settings_from_env("GITHUB"),
            google: provider_settings_from_env("GOOGLE"),
            linkedin: provider_settings_from_env("LINKEDIN"),
            oauth_state_key: derive_state_key(&jwt_signing_key),
            jwt_signing_key,
            insecure_dev_key,
            production,
            store_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            db_connect_timeout: Duration::from_secs(secs_var(
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            provider_http_timeout: Duration::from_secs(secs_var(
                "PROVIDER_HTTP_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Deterministic config for tests: no providers, in-memory store.
    pub fn test_default() -> Self {
        let jwt_signing_key = b"test_jwt_key_32_bytes_minimum!!".to_vec();
        Self {
            client_url: DEFAULT_CLIENT_URL.to_string(),
            github: ProviderSettings::default(),
            google: ProviderSettings::default(),
            linkedin: ProviderSettings::default(),
            oauth_state_key: derive_state_key(&jwt_signing_key),
            jwt_signing_key,
            insecure_dev_key: false,
            production: false,
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            db_connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            provider_http_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            port: 8080,
        }
    }

    pub fn provider_settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Github => &self.github,
            Provider::Google => &self.google,
            Provider::Linkedin => &self.linkedin,
        }
    }

    /// Credentials for `provider`, or `None` unless both id and secret are set.
    pub fn provider_credentials(&self, provider: Provider) -> Option<ProviderCredentials> {
        let settings = self.provider_settings(provider);
        let client_id = settings.client_id.clone()?;
        let client_secret = settings.client_secret.clone()?;

        Some(ProviderCredentials {
            client_id,
            client_secret,
            callback_url: self.callback_url(provider),
        })
    }

    /// Callback URL registered with `provider`.
    pub fn callback_url(&self, provider: Provider) -> String {
        self.provider_settings(provider)
            .callback_url
            .clone()
            .unwrap_or_else(|| format!("{}/api/auth/{}/callback", self.client_url, provider))
    }
}

fn provider_settings_from_env(prefix: &str) -> ProviderSettings {
    ProviderSettings {
        client_id: non_empty_var(&format!("{prefix}_CLIENT_ID")),
        client_secret: non_empty_var(&format!("{prefix}_CLIENT_SECRET")),
        callback_url: non_empty_var(&format!("{prefix}_CALLBACK_URL")),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag_var(name: &str) -> bool {
    matches!(
        env::var(name).as_deref().map(str::trim),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn secs_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

/// Derive a separate key for OAuth state signing so the session key is never
/// used for two purposes.
fn derive_state_key(signing_key: &[u8]) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(None, signing_key);
    let mut okm = [0u8; 32];
    // 32 bytes is far below the HKDF-SHA256 output limit
    hk.expand(b"inturnx oauth state v1", &mut okm)
        .unwrap_or_default();
    okm.to_vec()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_requires_both_id_and_secret() {
        let mut config = Config::test_default();
        config.github.client_id = Some("id".to_string());
        assert!(config.provider_credentials(Provider::Github).is_none());

        config.github.client_secret = Some("secret".to_string());
        let creds = config.provider_credentials(Provider::Github).unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(
            creds.callback_url,
            "http://localhost:5173/api/auth/github/callback"
        );
    }

    #[test]
    fn callback_url_override_wins() {
        let mut config = Config::test_default();
        config.linkedin.callback_url = Some("https://api.example.com/cb".to_string());
        assert_eq!(
            config.callback_url(Provider::Linkedin),
            "https://api.example.com/cb"
        );
    }

    #[test]
    fn state_key_differs_from_signing_key() {
        let config = Config::test_default();
        assert_eq!(config.oauth_state_key.len(), 32);
        assert_ne!(config.oauth_state_key, config.jwt_signing_key);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SECRET", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("GOOGLE_CLIENT_ID", "google_id");
        env::set_var("GOOGLE_CLIENT_SECRET", "google_secret");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert!(!config.insecure_dev_key);
        assert!(config.provider_credentials(Provider::Google).is_some());
    }
}
