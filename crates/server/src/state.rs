//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::identity::IdentityProvider;

/// Application state shared across request handlers.
///
/// Cheap to clone; the inner state lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                identity,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        &*self.inner.store
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        &*self.inner.identity
    }
}
