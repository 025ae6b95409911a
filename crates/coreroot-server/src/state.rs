use std::sync::Arc;

use axum::extract::FromRef;
use coreroot_auth::{AuthState, PermissionEvaluator};
use coreroot_cache::{CacheAside, CoherentStore};
use coreroot_core::SharedClock;
use coreroot_storage::{IdentifierTranslator, InMemoryStore};

use crate::config::{AppConfig, PaginationConfig};
use crate::content::ContentService;
use crate::error::StartupError;

/// Shared state handed to every handler. Everything is built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub content: Arc<ContentService>,
    pub pagination: PaginationConfig,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Wires storage, auth, cache and the content pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration. An unreachable Redis does not fail
    /// startup; the local cache is used instead.
    pub async fn build(config: &AppConfig, clock: SharedClock) -> Result<Self, StartupError> {
        config.validate()?;

        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let translator = Arc::new(IdentifierTranslator::new(store.clone()));

        let auth = AuthState::from_config(&config.auth, store.clone(), clock.clone())?;

        let backend = config.cache.build(clock).await;
        let cache = Arc::new(CacheAside::new(backend, config.cache.ttl));
        tracing::info!(
            backend = cache.backend_name(),
            ttl = ?config.cache.ttl,
            "Cache initialized"
        );

        let content = ContentService::new(
            CoherentStore::new(store.clone(), cache, translator),
            store,
            PermissionEvaluator::new(),
        );

        Ok(Self {
            auth,
            content: Arc::new(content),
            pagination: config.pagination.clone(),
        })
    }
}
