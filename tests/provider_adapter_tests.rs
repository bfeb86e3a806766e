// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider adapter tests against a local stand-in for the provider APIs.
//!
//! These tests verify that:
//! 1. GitHub falls back to `/user/emails` when the profile email is unusable
//! 2. A failing `/user/emails` call degrades to "no email"
//! 3. A provider that stops answering fails with a timeout
//! 4. Token endpoint errors reported in a 200 body are treated as denials

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inturnx_identity::config::ProviderCredentials;
use inturnx_identity::error::ProviderError;
use inturnx_identity::models::Provider;
use inturnx_identity::providers::oauth::ProviderEndpoints;
use inturnx_identity::providers::{GithubAdapter, GoogleAdapter, ProviderAdapter};
use serde_json::{json, Value};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(300);

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn credentials() -> ProviderCredentials {
    ProviderCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        callback_url: "http://localhost:5173/api/auth/github/callback".to_string(),
    }
}

fn local_endpoints(base: &str) -> ProviderEndpoints {
    ProviderEndpoints {
        authorize_url: format!("{}/authorize", base),
        token_url: format!("{}/token", base),
        userinfo_url: format!("{}/user", base),
        scopes: &["user:email"],
    }
}

async fn github_against(router: Router) -> GithubAdapter {
    let base = spawn_provider(router).await;
    GithubAdapter::with_endpoints(credentials(), TIMEOUT, local_endpoints(&base)).unwrap()
}

async fn token_ok() -> Json<Value> {
    Json(json!({"access_token": "gho_test", "token_type": "bearer"}))
}

fn github_profile(email: Value) -> Json<Value> {
    Json(json!({
        "id": 42,
        "login": "octocat",
        "name": "The Octocat",
        "email": email,
        "avatar_url": "https://avatars.example.com/42",
        "html_url": "https://github.com/octocat"
    }))
}

#[tokio::test]
async fn test_private_github_email_uses_emails_endpoint() {
    let github = github_against(
        Router::new()
            .route("/token", post(token_ok))
            .route("/user", get(|| async { github_profile(Value::Null) }))
            .route(
                "/user/emails",
                get(|| async {
                    Json(json!([
                        {"email": "other@example.com", "primary": false, "verified": true},
                        {"email": "Octo@Example.com", "primary": true, "verified": true}
                    ]))
                }),
            ),
    )
    .await;

    let identity = github.complete_handshake("code").await.unwrap();
    assert_eq!(identity.provider, Provider::Github);
    assert_eq!(identity.provider_id, "42");
    assert_eq!(identity.email.as_deref(), Some("octo@example.com"));
}

#[tokio::test]
async fn test_malformed_profile_email_uses_emails_endpoint() {
    let github = github_against(
        Router::new()
            .route("/token", post(token_ok))
            .route("/user", get(|| async { github_profile(json!("not an email")) }))
            .route(
                "/user/emails",
                get(|| async {
                    Json(json!([{"email": "octo@example.com", "primary": true, "verified": true}]))
                }),
            ),
    )
    .await;

    let identity = github.complete_handshake("code").await.unwrap();
    assert_eq!(identity.email.as_deref(), Some("octo@example.com"));
}

#[tokio::test]
async fn test_failed_emails_call_degrades_to_no_email() {
    let github = github_against(
        Router::new()
            .route("/token", post(token_ok))
            .route("/user", get(|| async { github_profile(Value::Null) }))
            .route(
                "/user/emails",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            ),
    )
    .await;

    let identity = github.complete_handshake("code").await.unwrap();
    assert_eq!(identity.provider_id, "42");
    assert_eq!(identity.email, None);
    assert_eq!(identity.username.as_deref(), Some("octocat"));
}

#[tokio::test]
async fn test_hanging_profile_endpoint_times_out() {
    let github = github_against(
        Router::new().route("/token", post(token_ok)).route(
            "/user",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                github_profile(Value::Null)
            }),
        ),
    )
    .await;

    let started = std::time::Instant::now();
    let err = github.complete_handshake("code").await.unwrap_err();

    assert!(
        matches!(err, ProviderError::Timeout { provider: Provider::Github }),
        "got {:?}",
        err
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_token_error_body_is_denied() {
    let github = github_against(Router::new().route(
        "/token",
        post(|| async {
            Json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            }))
        }),
    ))
    .await;

    let err = github.complete_handshake("stale").await.unwrap_err();
    match err {
        ProviderError::Denied { provider, message } => {
            assert_eq!(provider, Provider::Github);
            assert_eq!(message, "The code passed is incorrect or expired.");
        }
        other => panic!("expected denial, got {:?}", other),
    }
}

#[tokio::test]
async fn test_userinfo_rejection_is_status_error() {
    let base = spawn_provider(
        Router::new()
            .route("/token", post(token_ok))
            .route(
                "/user",
                get(|| async { (StatusCode::UNAUTHORIZED, "invalid token") }),
            ),
    )
    .await;
    let google =
        GoogleAdapter::with_endpoints(credentials(), TIMEOUT, local_endpoints(&base)).unwrap();

    let err = google.complete_handshake("code").await.unwrap_err();
    assert!(
        matches!(
            err,
            ProviderError::Status {
                provider: Provider::Google,
                status: 401,
                ..
            }
        ),
        "got {:?}",
        err
    );
}
