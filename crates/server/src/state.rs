//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::Storage;
use crate::files::FileStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the storage
/// handle and upload store that repositories are built from.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    storage: Storage,
    files: FileStore,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, storage: Storage, files: FileStore) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                files,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the storage handle.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.storage.pool()
    }

    /// Get a reference to the upload store.
    #[must_use]
    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }
}
