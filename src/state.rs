//! Application state management

use std::sync::Arc;

use crate::cache::AssetCache;
use crate::config::Config;
use crate::pipeline::AssetPipeline;
use crate::session::{AccountSession, LedgerContext};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: AssetPipeline,
    asset_cache: AssetCache,
}

impl AppState {
    /// Create a new application state
    ///
    /// Starts the cache listener so account and network changes
    /// invalidate cached ledger reads.
    pub fn new(config: Config, pipeline: AssetPipeline) -> Self {
        let asset_cache = AssetCache::new();
        asset_cache.spawn_listener(pipeline.ledger().clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                asset_cache,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the asset pipeline
    pub fn pipeline(&self) -> &AssetPipeline {
        &self.inner.pipeline
    }

    /// Get the ledger context
    pub fn ledger(&self) -> &LedgerContext {
        self.inner.pipeline.ledger()
    }

    /// Get the account session
    pub fn session(&self) -> &AccountSession {
        self.inner.pipeline.ledger().session()
    }

    /// Get the owner asset cache
    pub fn asset_cache(&self) -> &AssetCache {
        &self.inner.asset_cache
    }
}
