// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod identity;
pub mod user;

pub use identity::{normalize_email, ExternalIdentity, Provider};
pub use user::{Role, User};
