// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Idempotent, concurrency-safe database bootstrap.
//!
//! Every request may land on a cold instance. Requests that arrive while the
//! store is unconnected all wait on a single shared attempt:
//!
//! ```text
//! Unconnected ──ensure──▶ Connecting(shared attempt) ──ok──▶ Connected(handle)
//!      ▲                          │
//!      └─────────── err ──────────┘
//! ```
//!
//! The attempt runs on its own task, so a caller that goes away (request
//! timeout) does not abandon it, and the state transition is made by the task
//! itself before any waiter observes the result.

use crate::config::{Config, StoreBackend};
use crate::db::{FirestoreDb, MemoryStore, StoreHandle};
use crate::error::ConnectionError;
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type AttemptResult = Result<StoreHandle, ConnectionError>;
type SharedAttempt = Shared<BoxFuture<'static, AttemptResult>>;

/// Opens the underlying store connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<StoreHandle, ConnectionError>;
}

/// Connects to Firestore (or the emulator when `FIRESTORE_EMULATOR_HOST` is set).
pub struct FirestoreConnector {
    project_id: String,
}

impl FirestoreConnector {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl Connector for FirestoreConnector {
    async fn connect(&self) -> Result<StoreHandle, ConnectionError> {
        let db = FirestoreDb::new(&self.project_id).await?;
        Ok(Arc::new(db))
    }
}

/// Hands out a process-local store; never fails.
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<StoreHandle, ConnectionError> {
        Ok(self.store.clone())
    }
}

/// Externally observable bootstrap state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Unconnected => "unconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

enum State {
    Unconnected,
    Connecting { generation: u64, attempt: SharedAttempt },
    Connected(StoreHandle),
}

struct Inner {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    state: Mutex<State>,
    /// Number of attempts started so far; also tags each attempt.
    attempts: AtomicU64,
}

/// Owns the shared store connection and its bootstrap state.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                connect_timeout,
                state: Mutex::new(State::Unconnected),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Manager for the backend selected in `config`. Does not connect.
    pub fn from_config(config: &Config) -> Self {
        let connector: Arc<dyn Connector> = match config.store_backend {
            StoreBackend::Firestore => Arc::new(FirestoreConnector::new(&config.gcp_project_id)),
            StoreBackend::Memory => Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new()))),
        };
        Self::new(connector, config.db_connect_timeout)
    }

    /// Return the connected store, connecting first if needed.
    ///
    /// At most one attempt is in flight at a time; concurrent callers share
    /// it and observe the same outcome. A failed attempt resets the state so
    /// the next call retries.
    pub async fn ensure_connection(&self) -> Result<StoreHandle, ConnectionError> {
        let attempt = {
            let mut state = self.inner.state.lock();
            match &*state {
                State::Connected(handle) => return Ok(handle.clone()),
                State::Connecting { attempt, .. } => attempt.clone(),
                State::Unconnected => {
                    let generation = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let attempt = self.spawn_attempt(generation);
                    *state = State::Connecting {
                        generation,
                        attempt: attempt.clone(),
                    };
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Connected store if one is ready; never waits or starts an attempt.
    pub fn try_get(&self) -> Option<StoreHandle> {
        match &*self.inner.state.lock() {
            State::Connected(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Current state, without waiting. Safe for liveness probes.
    pub fn status(&self) -> ConnectionStatus {
        match &*self.inner.state.lock() {
            State::Unconnected => ConnectionStatus::Unconnected,
            State::Connecting { .. } => ConnectionStatus::Connecting,
            State::Connected(_) => ConnectionStatus::Connected,
        }
    }

    /// Number of connection attempts started since creation.
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn spawn_attempt(&self, generation: u64) -> SharedAttempt {
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            tracing::info!(attempt = generation, "Connecting to identity store");

            let result = match tokio::time::timeout(
                inner.connect_timeout,
                inner.connector.connect(),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::Timeout(inner.connect_timeout)),
            };

            let mut state = inner.state.lock();
            // Only the attempt that owns the Connecting state may move it on.
            if matches!(&*state, State::Connecting { generation: g, .. } if *g == generation) {
                *state = match &result {
                    Ok(handle) => State::Connected(handle.clone()),
                    Err(_) => State::Unconnected,
                };
            }
            drop(state);

            match &result {
                Ok(_) => tracing::info!(attempt = generation, "Identity store connected"),
                Err(e) => tracing::warn!(
                    attempt = generation,
                    error = %e,
                    "Identity store connection failed; next request will retry"
                ),
            }

            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(ConnectionError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self) -> Result<StoreHandle, ConnectionError> {
            Err(ConnectionError::Failed("refused".to_string()))
        }
    }

    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self) -> Result<StoreHandle, ConnectionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn memory_connector_connects_once() {
        let manager = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new()))),
            Duration::from_secs(1),
        );
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
        assert!(manager.try_get().is_none());

        manager.ensure_connection().await.unwrap();
        manager.ensure_connection().await.unwrap();

        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert!(manager.try_get().is_some());
        assert_eq!(manager.attempts(), 1);
    }

    #[tokio::test]
    async fn failure_resets_to_unconnected() {
        let manager = ConnectionManager::new(Arc::new(FailingConnector), Duration::from_secs(1));

        assert!(matches!(
            manager.ensure_connection().await,
            Err(ConnectionError::Failed(_))
        ));
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);

        assert!(manager.ensure_connection().await.is_err());
        assert_eq!(manager.attempts(), 2);
    }

    #[tokio::test]
    async fn hanging_connect_times_out() {
        let manager =
            ConnectionManager::new(Arc::new(HangingConnector), Duration::from_millis(20));

        assert!(matches!(
            manager.ensure_connection().await,
            Err(ConnectionError::Timeout(_))
        ));
        assert_eq!(manager.status(), ConnectionStatus::Unconnected);
    }
}
