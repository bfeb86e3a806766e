// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, store bootstrap).

pub mod auth;
pub mod store;

pub use auth::{require_auth, AuthUser, SESSION_COOKIE};
pub use store::require_store;
