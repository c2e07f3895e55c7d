//! The cache façade handed to consumers

use crate::coordinator::FetchCoordinator;
use crate::error::{CacheError, Result};
use crate::handle::{Handle, HandleFactory};
use crate::registry::HandleRegistry;
use crate::types::{AssetId, CacheStats, SourceLocator};
use asset_blob_store::KeyValueBlobStore;
use asset_fetcher::AssetFetcher;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for resolving assets to handles.
///
/// Cheap to clone; clones share all state. Build one per asset class
/// (e.g. models, textures), each with its own store namespace.
pub struct AssetCache<T> {
    coordinator: Arc<FetchCoordinator<T>>,
}

impl<T> Clone for AssetCache<T> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<T: Send + Sync + 'static> AssetCache<T> {
    pub fn builder(
        namespace: &str,
        fetcher: Arc<dyn AssetFetcher>,
        factory: impl HandleFactory<T> + 'static,
    ) -> AssetCacheBuilder<T> {
        AssetCacheBuilder {
            namespace: namespace.to_string(),
            fetcher,
            factory: Arc::new(factory),
            store: None,
        }
    }

    /// Return the handle for `id` at `locator`, fetching and persisting the
    /// bytes if needed. Repeated calls with the same pair return the same handle.
    pub async fn resolve(&self, id: &AssetId, locator: &SourceLocator) -> Result<Handle<T>> {
        self.coordinator.resolve(id, locator).await
    }

    /// The registered handle for `id`, if it was materialized from `locator`
    pub fn peek(&self, id: &AssetId, locator: &SourceLocator) -> Option<Handle<T>> {
        self.coordinator.lookup(id, locator)
    }

    /// Forget `id` everywhere. Idempotent.
    pub async fn evict(&self, id: &AssetId) {
        self.coordinator.evict(id).await
    }

    /// Forget every id and clear the persisted namespace
    pub async fn evict_all(&self) {
        self.coordinator.evict_all().await
    }

    pub fn namespace(&self) -> &str {
        self.coordinator.namespace()
    }

    /// False when running in pass-through mode
    pub fn is_persistent(&self) -> bool {
        self.coordinator.is_persistent()
    }

    pub fn stats(&self) -> CacheStats {
        self.coordinator.stats()
    }
}

pub struct AssetCacheBuilder<T> {
    namespace: String,
    fetcher: Arc<dyn AssetFetcher>,
    factory: Arc<dyn HandleFactory<T>>,
    store: Option<Arc<dyn KeyValueBlobStore>>,
}

impl<T: Send + Sync + 'static> AssetCacheBuilder<T> {
    /// Persist bytes in `store`, whose namespace must match the cache's
    pub fn store(mut self, store: Arc<dyn KeyValueBlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Initialize the store and build the cache. An unusable store is not
    /// an error: the cache falls back to pass-through mode.
    pub async fn build(self) -> Result<AssetCache<T>> {
        let store = match self.store {
            Some(store) if store.namespace() != self.namespace => {
                return Err(CacheError::InvariantViolation(format!(
                    "store namespace {:?} does not match cache namespace {:?}",
                    store.namespace(),
                    self.namespace
                )));
            }
            Some(store) => match store.init().await {
                Ok(()) => Some(store),
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        error = %e,
                        "Blob store unavailable, running in pass-through mode"
                    );
                    None
                }
            },
            None => {
                info!(
                    namespace = %self.namespace,
                    "No blob store configured, running in pass-through mode"
                );
                None
            }
        };

        let coordinator = FetchCoordinator::new(
            self.namespace,
            store,
            self.fetcher,
            HandleRegistry::new(self.factory),
        );

        Ok(AssetCache {
            coordinator: Arc::new(coordinator),
        })
    }
}
