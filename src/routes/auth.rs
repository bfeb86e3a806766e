// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login routes for every configured provider.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, ResolverError, Result};
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::Provider;
use crate::providers::{ProviderAdapter, ProviderAvailability};
use crate::services::IdentityResolver;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of an OAuth state parameter.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Session cookie lifetime. The token inside carries its own 7-day expiry.
const COOKIE_MAX_AGE_HOURS: i64 = 24;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/oauth/available", get(available))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/{provider}", get(auth_start))
        .route("/api/auth/{provider}/callback", get(auth_callback))
}

/// Which providers the client may offer as login buttons.
async fn available(State(state): State<Arc<AppState>>) -> Json<ProviderAvailability> {
    Json(state.providers.availability())
}

fn parse_provider(raw: &str) -> Result<Provider> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {}", raw)))
}

/// Adapter for `provider`, or a 501 describing which credentials are missing.
fn configured_adapter(state: &AppState, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
    match state.providers.get(provider) {
        Some(adapter) => Ok(adapter.clone()),
        None => {
            let settings = state.config.provider_settings(provider);
            tracing::warn!(provider = %provider, "OAuth requested for unconfigured provider");
            Err(AppError::NotConfigured {
                provider,
                has_client_id: settings.client_id.is_some(),
                has_client_secret: settings.client_secret.is_some(),
            })
        }
    }
}

/// Start OAuth flow - redirect to the provider's consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;
    let adapter = configured_adapter(&state, provider)?;

    let timestamp = now_millis()?;
    let oauth_state = sign_state(provider, timestamp, &state.config.oauth_state_key)?;

    tracing::info!(provider = %provider, "Starting OAuth flow");

    Ok(Redirect::temporary(&adapter.authorization_url(&oauth_state)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code, resolve the user, issue a session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let provider = parse_provider(&provider)?;
    let adapter = configured_adapter(&state, provider)?;
    let client_url = state.config.client_url.trim_end_matches('/');
    let failure = |tag: &str| Redirect::temporary(&format!("{}/login?error={}", client_url, tag));

    if let Some(error) = params.error {
        tracing::warn!(provider = %provider, error = %error, "OAuth error from provider");
        return Ok((jar, failure("oauth_failed")));
    }

    let state_ok = params.state.as_deref().is_some_and(|s| {
        verify_state(s, provider, &state.config.oauth_state_key, now_millis().ok())
    });
    if !state_ok {
        tracing::warn!(provider = %provider, "Invalid or expired OAuth state parameter");
        return Ok((jar, failure("invalid_state")));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!(provider = %provider, "OAuth callback without authorization code");
        return Ok((jar, failure("oauth_failed")));
    };

    let identity = match adapter.complete_handshake(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "OAuth handshake failed");
            return Ok((jar, failure("oauth_failed")));
        }
    };

    let store = state.connections.ensure_connection().await?;

    let user = match IdentityResolver::new(store.as_ref()).resolve(&identity).await {
        Ok(user) => user,
        Err(ResolverError::ProviderConflict { provider, user_id }) => {
            tracing::warn!(provider = %provider, user_id = %user_id, "Refusing to relink provider");
            return Ok((jar, failure("account_conflict")));
        }
        Err(e) => return Err(e.into()),
    };

    let session_id = state.sessions.serialize_for_session(&user);
    let credential = state
        .sessions
        .issue(&session_id)
        .map_err(|e| AppError::Internal(e.context("Session token creation failed")))?;

    tracing::info!(user_id = %user.id, provider = %provider, "OAuth login successful");

    let mut cookie = session_cookie(credential.token.clone(), state.config.production);
    cookie.set_max_age(time::Duration::hours(COOKIE_MAX_AGE_HOURS));

    let redirect_url = format!(
        "{}/auth/callback?token={}&provider={}",
        client_url,
        urlencoding::encode(&credential.token),
        provider
    );

    Ok((jar.add(cookie), Redirect::temporary(&redirect_url)))
}

/// Logout - clear the session cookie. The removal carries the same
/// attributes as the cookie set at login.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let removal = session_cookie(String::new(), state.config.production);
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn state_mac(payload: &str, secret: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Encode "provider|timestamp_hex|signature_hex" as URL-safe base64.
fn sign_state(provider: Provider, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", provider, timestamp_ms);
    let signature = state_mac(&payload, secret)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC init failed")))?;
    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check signature, provider and age of an OAuth state parameter.
fn verify_state(state: &str, provider: Provider, secret: &[u8], now_ms: Option<u128>) -> bool {
    let Some(now_ms) = now_ms else {
        return false;
    };
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let [state_provider, timestamp_hex, signature_hex] = parts[..] else {
        return false;
    };

    let payload = format!("{}|{}", state_provider, timestamp_hex);
    let (Some(expected), Ok(actual)) = (state_mac(&payload, secret), hex::decode(signature_hex))
    else {
        return false;
    };

    if !bool::from(expected.ct_eq(&actual)) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    if state_provider != provider.as_str() {
        return false;
    }

    match u128::from_str_radix(timestamp_hex, 16) {
        Ok(issued) => issued <= now_ms && now_ms - issued <= STATE_MAX_AGE_MS,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: u128 = 1_700_000_000_000;

    #[test]
    fn test_state_round_trip() {
        let state = sign_state(Provider::Google, NOW, SECRET).unwrap();
        assert!(verify_state(&state, Provider::Google, SECRET, Some(NOW + 1000)));
    }

    #[test]
    fn test_state_wrong_provider() {
        let state = sign_state(Provider::Google, NOW, SECRET).unwrap();
        assert!(!verify_state(&state, Provider::Github, SECRET, Some(NOW)));
    }

    #[test]
    fn test_state_invalid_signature() {
        let payload = format!("github|{:x}|{}", NOW, "invalid_signature");
        let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        assert!(!verify_state(&encoded, Provider::Github, SECRET, Some(NOW)));
    }

    #[test]
    fn test_state_other_key() {
        let state = sign_state(Provider::Linkedin, NOW, b"other_key").unwrap();
        assert!(!verify_state(&state, Provider::Linkedin, SECRET, Some(NOW)));
    }

    #[test]
    fn test_state_expired() {
        let state = sign_state(Provider::Github, NOW, SECRET).unwrap();
        let later = NOW + STATE_MAX_AGE_MS + 1;
        assert!(!verify_state(&state, Provider::Github, SECRET, Some(later)));
    }

    #[test]
    fn test_state_garbage() {
        assert!(!verify_state("not base64!", Provider::Github, SECRET, Some(NOW)));
        assert!(!verify_state("", Provider::Github, SECRET, Some(NOW)));
    }
}
