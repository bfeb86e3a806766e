// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! InturnX identity service
//!
//! Authenticates users through external OAuth providers (GitHub, Google,
//! LinkedIn), reconciles each external identity with a single local user
//! record, and issues signed session credentials for the rest of the platform.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;

use config::Config;
use db::ConnectionManager;
use providers::ProviderRegistry;
use services::SessionIssuer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Lazily connected identity store
    pub connections: ConnectionManager,
    /// Adapters for configured providers only
    pub providers: ProviderRegistry,
    pub sessions: SessionIssuer,
}

impl AppState {
    /// Wire up state from configuration. Does not touch the database.
    pub fn from_config(config: Config) -> Result<Self, error::ProviderError> {
        let providers = ProviderRegistry::from_config(&config)?;
        let connections = ConnectionManager::from_config(&config);
        let sessions = SessionIssuer::new(&config.jwt_signing_key);

        Ok(Self {
            config,
            connections,
            providers,
            sessions,
        })
    }
}
