// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gate requests on the identity store connection.

use crate::db::StoreHandle;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Ensure the store is connected and hand it to the handler as an
/// `Extension<StoreHandle>`. Fails with 503 when the bootstrap attempt fails;
/// the next request retries.
pub async fn require_store(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let store: StoreHandle = state.connections.ensure_connection().await?;
    request.extensions_mut().insert(store);
    Ok(next.run(request).await)
}
