// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity resolution and session issuance.

pub mod resolver;
pub mod session;

pub use resolver::{IdentityResolver, Resolution};
pub use session::{Claims, SessionCredential, SessionIssuer, SESSION_TTL_DAYS};
