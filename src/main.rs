// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! InturnX identity API server
//!
//! Serves OAuth login for GitHub, Google and LinkedIn, and the session-backed
//! `/api/me` endpoint. The identity store is connected lazily on first use so
//! cold starts stay fast.

use inturnx_identity::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        production = config.production,
        "Starting InturnX identity API"
    );

    // Build shared state; no database connection is made here
    let state = AppState::from_config(config)?;
    let availability = state.providers.availability();
    tracing::info!(
        github = availability.github,
        google = availability.google,
        linkedin = availability.linkedin,
        "OAuth providers available"
    );

    let port = state.config.port;
    let app = inturnx_identity::routes::create_router(Arc::new(state));

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inturnx_identity=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .try_init()?;
    Ok(())
}
