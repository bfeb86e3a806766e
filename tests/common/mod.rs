// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use inturnx_identity::config::Config;
use inturnx_identity::db::bootstrap::MemoryConnector;
use inturnx_identity::db::{ConnectionManager, Connector, FirestoreDb, MemoryStore, StoreHandle};
use inturnx_identity::error::{ConnectionError, ProviderError};
use inturnx_identity::models::{ExternalIdentity, Provider};
use inturnx_identity::providers::{ProviderAdapter, ProviderRegistry};
use inturnx_identity::routes::create_router;
use inturnx_identity::services::SessionIssuer;
use inturnx_identity::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Provider adapter that skips the network and returns a canned result.
#[allow(dead_code)]
pub struct FakeAdapter {
    provider: Provider,
    identity: Option<ExternalIdentity>,
}

#[allow(dead_code)]
impl FakeAdapter {
    /// Handshake succeeds with `identity`.
    pub fn returning(identity: ExternalIdentity) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            provider: identity.provider,
            identity: Some(identity),
        })
    }

    /// Handshake fails as if the provider rejected the code.
    pub fn failing(provider: Provider) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            provider,
            identity: None,
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://{}.test/authorize?state={}", self.provider, state)
    }

    async fn complete_handshake(&self, _code: &str) -> Result<ExternalIdentity, ProviderError> {
        self.identity
            .clone()
            .ok_or_else(|| ProviderError::Denied {
                provider: self.provider,
                message: "bad_verification_code".to_string(),
            })
    }
}

/// Connector that never finishes, for checking nothing waits on it.
#[allow(dead_code)]
pub struct HangingConnector;

#[async_trait]
impl Connector for HangingConnector {
    async fn connect(&self) -> Result<StoreHandle, ConnectionError> {
        std::future::pending().await
    }
}

/// Handles a test needs besides the router.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

fn build_app(
    config: Config,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    connector: Option<Arc<dyn Connector>>,
) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let connector =
        connector.unwrap_or_else(|| Arc::new(MemoryConnector::new(store.clone())));

    let state = Arc::new(AppState {
        sessions: SessionIssuer::new(&config.jwt_signing_key),
        connections: ConnectionManager::new(connector, Duration::from_secs(5)),
        providers: ProviderRegistry::from_adapters(adapters),
        config,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

/// Test app with an in-memory store and no configured providers.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    build_app(Config::test_default(), Vec::new(), None)
}

/// Test app with the given provider adapters registered.
#[allow(dead_code)]
pub fn create_test_app_with_adapters(adapters: Vec<Arc<dyn ProviderAdapter>>) -> TestApp {
    build_app(Config::test_default(), adapters, None)
}

/// Test app whose database connection never comes up.
#[allow(dead_code)]
pub fn create_test_app_with_connector(connector: Arc<dyn Connector>) -> TestApp {
    build_app(Config::test_default(), Vec::new(), Some(connector))
}

/// Test app built from an explicit config.
#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    build_app(config, Vec::new(), None)
}
