//! Owner asset cache
//!
//! Caches the connected account's assets. Listens to session events:
//! an account change invalidates and reloads, a disconnect or network change
//! invalidates everything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::ledger::{AccountAddress, Asset, LedgerError, LedgerOperation};
use crate::session::{LedgerContext, SessionEvent};

/// Thread-safe owner asset cache
#[derive(Clone, Default)]
pub struct AssetCache {
    inner: Arc<AssetCacheInner>,
}

#[derive(Default)]
struct AssetCacheInner {
    entry: RwLock<Option<CachedAssets>>,
    /// Bumped on every invalidation so in-flight loads can't resurrect stale data
    generation: AtomicU64,
}

struct CachedAssets {
    owner: AccountAddress,
    assets: Vec<Asset>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached assets for `owner`, loading from the ledger on a miss
    pub async fn get_or_load(
        &self,
        ctx: &LedgerContext,
        owner: &AccountAddress,
    ) -> Result<Vec<Asset>, LedgerError> {
        {
            let entry = self.inner.entry.read().await;
            if let Some(cached) = entry.as_ref().filter(|c| &c.owner == owner) {
                return Ok(cached.assets.clone());
            }
        }
        self.reload(ctx, owner).await
    }

    /// Fetch `owner`'s assets from the ledger and replace the cache entry
    pub async fn reload(
        &self,
        ctx: &LedgerContext,
        owner: &AccountAddress,
    ) -> Result<Vec<Asset>, LedgerError> {
        ctx.require(LedgerOperation::AssetsByOwner)?;
        ctx.require(LedgerOperation::GetDetails)?;

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let ledger = ctx.ledger();

        let ids = ledger.assets_by_owner(owner).await?;
        let assets = try_join_all(ids.into_iter().map(|id| ledger.get_details(id))).await?;

        let mut entry = self.inner.entry.write().await;
        if self.inner.generation.load(Ordering::SeqCst) == generation {
            *entry = Some(CachedAssets {
                owner: owner.clone(),
                assets: assets.clone(),
            });
        }

        tracing::debug!(owner = %owner, count = assets.len(), "Loaded owner assets");
        Ok(assets)
    }

    pub async fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.entry.write().await = None;
    }

    /// Number of cached assets, if anything is cached
    pub async fn cached_len(&self) -> Option<usize> {
        self.inner.entry.read().await.as_ref().map(|c| c.assets.len())
    }

    /// React to session events until the session is dropped
    pub fn spawn_listener(&self, ctx: LedgerContext) -> JoinHandle<()> {
        let cache = self.clone();
        let mut events = ctx.session().subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::AccountChanged { account }) => {
                        cache.invalidate().await;
                        if let Err(e) = cache.reload(&ctx, &account).await {
                            tracing::warn!(account = %account, error = %e, "Failed to reload assets");
                        }
                    }
                    Ok(SessionEvent::Disconnected) => cache.invalidate().await,
                    Ok(SessionEvent::NetworkChanged { network }) => {
                        tracing::info!(network = %network, "Invalidating asset cache");
                        cache.invalidate().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session events lagged, invalidating");
                        cache.invalidate().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
