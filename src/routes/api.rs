// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::StoreHandle;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Provider, Role, User};
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth and store middleware are applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub profile_url: Option<String>,
    pub oauth_provider: Option<Provider>,
    /// Providers linked to this account
    pub providers: Vec<Provider>,
    pub role: Role,
    pub skills: Vec<String>,
    pub badges: Vec<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let providers = user.linked_providers().into_iter().map(|(p, _)| p).collect();
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar: user.avatar,
            profile_url: user.profile_url,
            oauth_provider: user.oauth_provider,
            providers,
            role: user.role,
            skills: user.skills,
            badges: user.badges,
            created_at: user.created_at,
        }
    }
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Extension(store): Extension<StoreHandle>,
) -> Result<Json<UserResponse>> {
    let user = state
        .sessions
        .deserialize_from_session(store.as_ref(), &auth.user_id)
        .await?;

    match user {
        Some(user) => Ok(Json(user.into())),
        None => {
            tracing::info!(user_id = %auth.user_id, "Session refers to a missing user");
            Err(AppError::Unauthorized)
        }
    }
}
