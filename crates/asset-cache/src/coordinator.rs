//! Resolve orchestration: tracker, then registry, then store, then origin.
//!
//! Every mutation for an id happens while holding that id's lock, so a
//! locator-change eviction always completes before the next resolve of the
//! id can look anything up. Fetches run in spawned tasks shared by every
//! concurrent caller of the same `(id, locator)`; a caller that goes away
//! does not cancel the fetch, and its result is still registered.
//!
//! Slow-path resolves share the namespace gate; `evict_all` takes it
//! exclusively, so no flight can start while the namespace is being cleared.

use crate::entry::{self, StoredEntry};
use crate::error::{CacheError, Result};
use crate::handle::Handle;
use crate::registry::HandleRegistry;
use crate::tracker::{InvalidationTracker, LocatorChange};
use crate::types::{AssetId, CacheStats, SourceLocator};
use asset_blob_store::KeyValueBlobStore;
use asset_fetcher::AssetFetcher;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

type Outcome<T> = Shared<BoxFuture<'static, Result<Handle<T>>>>;

/// A fetch in progress for one id
struct Flight<T> {
    locator: SourceLocator,
    generation: u64,
    outcome: Outcome<T>,
}

impl<T> Clone for Flight<T> {
    fn clone(&self) -> Self {
        Self {
            locator: self.locator.clone(),
            generation: self.generation,
            outcome: self.outcome.clone(),
        }
    }
}

#[derive(Default)]
struct Counters {
    registry_hits: AtomicU64,
    store_hits: AtomicU64,
    fetches: AtomicU64,
    evictions: AtomicU64,
}

pub struct FetchCoordinator<T> {
    namespace: String,
    store: Option<Arc<dyn KeyValueBlobStore>>,
    fetcher: Arc<dyn AssetFetcher>,
    registry: HandleRegistry<T>,
    tracker: InvalidationTracker,
    /// Serializes each id's mutations. Entries nobody holds are pruned on eviction.
    id_locks: Mutex<HashMap<AssetId, Arc<tokio::sync::Mutex<()>>>>,
    gate: tokio::sync::RwLock<()>,
    flights: Mutex<HashMap<AssetId, Flight<T>>>,
    next_generation: AtomicU64,
    counters: Counters,
}

impl<T: Send + Sync + 'static> FetchCoordinator<T> {
    /// `store: None` runs in pass-through mode: every miss goes to the origin.
    pub fn new(
        namespace: String,
        store: Option<Arc<dyn KeyValueBlobStore>>,
        fetcher: Arc<dyn AssetFetcher>,
        registry: HandleRegistry<T>,
    ) -> Self {
        Self {
            namespace,
            store,
            fetcher,
            registry,
            tracker: InvalidationTracker::new(),
            id_locks: Mutex::new(HashMap::new()),
            gate: tokio::sync::RwLock::new(()),
            flights: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Registry hit for `id` at exactly `locator`, without I/O or waiting.
    ///
    /// A tracker entry is written after its registry entry and removed
    /// before it, so holding the tracker read lock across the registry read
    /// guarantees the handle was materialized from `locator`.
    pub fn lookup(&self, id: &AssetId, locator: &SourceLocator) -> Option<Handle<T>> {
        self.tracker.with_matching(id, locator, || self.registry.get(id))
    }

    pub async fn resolve(
        self: &Arc<Self>,
        id: &AssetId,
        locator: &SourceLocator,
    ) -> Result<Handle<T>> {
        if let Some(handle) = self.lookup(id, locator) {
            self.counters.registry_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }

        let outcome = {
            let _gate = self.gate.read().await;
            let lock = self.id_lock(id);
            let _guard = lock.lock().await;

            match self.flight(id) {
                Some(flight) if flight.locator == *locator => {
                    debug!(namespace = %self.namespace, id = %id, "Joining in-flight resolve");
                    flight.outcome
                }
                pending => {
                    if let Some(flight) = pending {
                        // The superseded fetch must land before it can be evicted
                        let _ = flight.outcome.await;
                    }

                    if let LocatorChange::Changed { previous } = self.tracker.observe(id, locator) {
                        info!(
                            namespace = %self.namespace,
                            id = %id,
                            previous = %previous,
                            locator = %locator,
                            "Locator changed, evicting cached asset"
                        );
                        self.delete_stored(id).await?;
                        self.drop_in_memory(id);
                    }

                    if let Some(handle) = self.lookup(id, locator) {
                        self.counters.registry_hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(handle);
                    }

                    self.launch(id, locator)
                }
            }
        };

        outcome.await
    }

    /// Remove `id` from tracker, registry and store. Never fails: memory is
    /// always cleared, and a store delete error is logged.
    pub async fn evict(&self, id: &AssetId) {
        let lock = self.id_lock(id);
        {
            let _guard = lock.lock().await;

            if let Some(flight) = self.flight(id) {
                let _ = flight.outcome.await;
            }

            let deleted = self.delete_stored(id).await;
            self.drop_in_memory(id);

            if let Err(e) = deleted {
                warn!(
                    namespace = %self.namespace,
                    id = %id,
                    error = %e,
                    "Evicted from memory but store delete failed"
                );
            }
        }
        self.release_id_lock(id, lock);
    }

    /// Clear every id in this namespace, including persisted bytes
    pub async fn evict_all(&self) {
        let _gate = self.gate.write().await;

        let pending: Vec<Flight<T>> = {
            let flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
            flights.values().cloned().collect()
        };
        for flight in pending {
            let _ = flight.outcome.await;
        }

        self.tracker.clear();
        let dropped = self.registry.clear();
        {
            let mut locks = self.id_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        self.counters
            .evictions
            .fetch_add(dropped as u64, Ordering::Relaxed);

        if let Some(store) = &self.store {
            if let Err(e) = store.delete_namespace().await {
                warn!(namespace = %self.namespace, error = %e, "Failed to clear store namespace");
            }
        }

        info!(namespace = %self.namespace, dropped, "Evicted all cached assets");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            namespace: self.namespace.clone(),
            persistent: self.is_persistent(),
            handles: self.registry.len(),
            registry_hits: self.counters.registry_hits.load(Ordering::Relaxed),
            store_hits: self.counters.store_hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    fn id_lock(&self, id: &AssetId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.id_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop the map's entry for `id` once no other caller holds or awaits it
    fn release_id_lock(&self, id: &AssetId, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self.id_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(id);
        }
    }

    fn flight(&self, id: &AssetId) -> Option<Flight<T>> {
        let flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        flights.get(id).cloned()
    }

    /// Caller holds the id lock
    async fn delete_stored(&self, id: &AssetId) -> Result<()> {
        if let Some(store) = &self.store {
            store.delete(id.as_str()).await?;
        }
        Ok(())
    }

    /// Caller holds the id lock. The tracker entry goes before the registry entry.
    fn drop_in_memory(&self, id: &AssetId) {
        self.tracker.forget(id);
        if self.registry.remove(id).is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(namespace = %self.namespace, id = %id, "Evicted handle");
        }
    }

    /// Caller holds the id lock. Starts the fetch task and registers it so
    /// concurrent resolves of the same locator join it.
    fn launch(self: &Arc<Self>, id: &AssetId, locator: &SourceLocator) -> Outcome<T> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Held until the flight is registered, so the task cannot land first
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);

        let task = tokio::spawn({
            let this = Arc::clone(self);
            let id = id.clone();
            let locator = locator.clone();
            async move {
                let landing = FlightLanding {
                    coordinator: &this,
                    id: &id,
                    generation,
                };
                let result = this.load(&id, &locator).await;
                drop(landing);
                result
            }
        });

        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                Err(CacheError::InvariantViolation(format!(
                    "resolve task aborted: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared();

        flights.insert(
            id.clone(),
            Flight {
                locator: locator.clone(),
                generation,
                outcome: outcome.clone(),
            },
        );

        outcome
    }

    /// Store, then origin. Runs inside the flight task.
    async fn load(&self, id: &AssetId, locator: &SourceLocator) -> Result<Handle<T>> {
        if let Some(store) = &self.store {
            if let Some(raw) = store.get(id.as_str()).await? {
                match StoredEntry::decode(raw) {
                    Some(stored) if stored.is_from(locator) => {
                        self.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            namespace = %self.namespace,
                            id = %id,
                            size = stored.payload.len(),
                            "Store hit"
                        );
                        return self.install(id, locator, stored.payload);
                    }
                    _ => {
                        info!(
                            namespace = %self.namespace,
                            id = %id,
                            locator = %locator,
                            "Stored bytes are from another locator, discarding"
                        );
                        store.delete(id.as_str()).await?;
                    }
                }
            }
        }

        debug!(namespace = %self.namespace, id = %id, locator = %locator, "Fetching asset");
        let bytes = self.fetcher.fetch(locator.as_str()).await?;
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        // Persist before materializing so a handle never outlives a failed write
        if let Some(store) = &self.store {
            store.put(id.as_str(), &entry::encode(locator, &bytes)).await?;
        }

        self.install(id, locator, bytes)
    }

    fn install(&self, id: &AssetId, locator: &SourceLocator, bytes: Bytes) -> Result<Handle<T>> {
        let handle = self.registry.materialize(id, bytes)?;
        self.tracker.record(id, locator);
        Ok(handle)
    }

    fn land(&self, id: &AssetId, generation: u64) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if flights.get(id).is_some_and(|f| f.generation == generation) {
            flights.remove(id);
        }
    }
}

/// Unregisters a flight when its task finishes, whether it returned or panicked
struct FlightLanding<'a, T: Send + Sync + 'static> {
    coordinator: &'a FetchCoordinator<T>,
    id: &'a AssetId,
    generation: u64,
}

impl<T: Send + Sync + 'static> Drop for FlightLanding<'_, T> {
    fn drop(&mut self) {
        self.coordinator.land(self.id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::LocalAsset;
    use crate::testing::{locator, stored_payload, ScriptedFetcher};
    use asset_blob_store::MemoryBlobStore;
    use std::time::Duration;

    fn coordinator(
        store: Option<Arc<dyn KeyValueBlobStore>>,
        fetcher: Arc<ScriptedFetcher>,
    ) -> Arc<FetchCoordinator<LocalAsset>> {
        let factory: fn(&AssetId, Bytes) -> LocalAsset = LocalAsset::from_bytes;
        Arc::new(FetchCoordinator::new(
            "models".to_string(),
            store,
            fetcher,
            HandleRegistry::new(Arc::new(factory)),
        ))
    }

    #[tokio::test]
    async fn test_lookup_requires_matching_locator() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let coordinator = coordinator(None, Arc::clone(&fetcher));
        let id = AssetId::from("iter_1");

        let handle = coordinator.resolve(&id, &locator("a.glb")).await.unwrap();

        assert_eq!(coordinator.lookup(&id, &locator("a.glb")), Some(handle));
        assert_eq!(coordinator.lookup(&id, &locator("b.glb")), None);
    }

    #[tokio::test]
    async fn test_flight_is_unregistered_after_landing() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let coordinator = coordinator(None, Arc::clone(&fetcher));
        let id = AssetId::from("iter_1");

        coordinator.resolve(&id, &locator("a.glb")).await.unwrap();
        assert!(coordinator.flight(&id).is_none());

        fetcher.fail_next();
        assert!(coordinator.resolve(&id, &locator("b.glb")).await.is_err());
        assert!(coordinator.flight(&id).is_none());
    }

    #[tokio::test]
    async fn test_store_delete_failure_keeps_old_state() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = MemoryBlobStore::new("models").unwrap();
        let coordinator = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let id = AssetId::from("iter_1");

        let old = coordinator.resolve(&id, &locator("a.glb")).await.unwrap();

        store.set_available(false);
        let result = coordinator.resolve(&id, &locator("b.glb")).await;
        assert!(matches!(result, Err(CacheError::Store(_))));

        // Fail-static: the previous handle is still registered
        assert_eq!(coordinator.lookup(&id, &locator("a.glb")), Some(old));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_stats_count_each_path() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = MemoryBlobStore::new("models").unwrap();
        let first = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let id = AssetId::from("iter_1");

        first.resolve(&id, &locator("a.glb")).await.unwrap();
        first.resolve(&id, &locator("a.glb")).await.unwrap();

        let second = coordinator(Some(Arc::new(store)), Arc::clone(&fetcher));
        second.resolve(&id, &locator("a.glb")).await.unwrap();
        second.evict(&id).await;

        let stats = first.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.registry_hits, 1);
        assert_eq!(stats.handles, 1);

        let stats = second.stats();
        assert_eq!(stats.store_hits, 1);
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.handles, 0);
        assert!(stats.persistent);
    }

    fn id_lock_count(coordinator: &FetchCoordinator<LocalAsset>) -> usize {
        coordinator.id_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_evict_clears_memory_when_store_delete_fails() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = MemoryBlobStore::new("models").unwrap();
        let coordinator = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let id = AssetId::from("iter_1");

        let old = coordinator.resolve(&id, &locator("a.glb")).await.unwrap();

        store.set_available(false);
        coordinator.evict(&id).await;

        assert!(coordinator.lookup(&id, &locator("a.glb")).is_none());
        assert_eq!(coordinator.stats().handles, 0);
        assert_eq!(coordinator.stats().evictions, 1);

        // The surviving bytes still belong to a.glb, so they are reused
        store.set_available(true);
        let again = coordinator.resolve(&id, &locator("a.glb")).await.unwrap();
        assert_ne!(again, old);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_stored_bytes_from_another_locator_are_refetched() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = MemoryBlobStore::new("models").unwrap();
        let id = AssetId::from("iter_1");

        let before_restart = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        before_restart
            .resolve(&id, &locator("model.glb"))
            .await
            .unwrap();

        let restarted = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let handle = restarted
            .resolve(&id, &locator("model_v2.glb"))
            .await
            .unwrap();

        assert_eq!(&handle.bytes[..], locator("model_v2.glb").as_str().as_bytes());
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(restarted.stats().store_hits, 0);
        assert_eq!(
            &stored_payload(&store, "iter_1").await.unwrap()[..],
            locator("model_v2.glb").as_str().as_bytes()
        );

        // And the refreshed entry is what the next run picks up
        let next_run = coordinator(Some(Arc::new(store)), Arc::clone(&fetcher));
        next_run
            .resolve(&id, &locator("model_v2.glb"))
            .await
            .unwrap();
        assert_eq!(next_run.stats().store_hits, 1);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unframed_stored_bytes_are_refetched() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = MemoryBlobStore::new("models").unwrap();
        store.put("iter_1", b"glTF from an older layout").await.unwrap();

        let coordinator = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let handle = coordinator
            .resolve(&AssetId::from("iter_1"), &locator("model.glb"))
            .await
            .unwrap();

        assert_eq!(&handle.bytes[..], locator("model.glb").as_str().as_bytes());
        assert_eq!(fetcher.calls(), 1);
        assert!(stored_payload(&store, "iter_1").await.is_some());
    }

    #[tokio::test]
    async fn test_evict_releases_id_lock() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let coordinator = coordinator(None, Arc::clone(&fetcher));

        for i in 0..100 {
            let id = AssetId::new(format!("iter_{}", i));
            coordinator.resolve(&id, &locator("model.glb")).await.unwrap();
            coordinator.evict(&id).await;
        }

        assert_eq!(coordinator.stats().handles, 0);
        assert_eq!(id_lock_count(&coordinator), 0);
    }

    #[tokio::test]
    async fn test_evict_all_releases_id_locks() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let coordinator = coordinator(None, Arc::clone(&fetcher));

        for i in 0..10 {
            let id = AssetId::new(format!("iter_{}", i));
            coordinator.resolve(&id, &locator("model.glb")).await.unwrap();
        }
        assert_eq!(id_lock_count(&coordinator), 10);

        coordinator.evict_all().await;
        assert_eq!(id_lock_count(&coordinator), 0);

        // Locks are recreated on demand
        coordinator
            .resolve(&AssetId::from("iter_0"), &locator("model.glb"))
            .await
            .unwrap();
        assert_eq!(id_lock_count(&coordinator), 1);
    }

    #[tokio::test]
    async fn test_resolve_during_evict_all_waits_for_it() {
        let store = MemoryBlobStore::new("models").unwrap();
        let earlier_run = coordinator(
            Some(Arc::new(store.clone())),
            Arc::new(ScriptedFetcher::new()),
        );
        earlier_run
            .resolve(&AssetId::from("iter_2"), &locator("b.glb"))
            .await
            .unwrap();

        let fetcher = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(30)));
        let coordinator = coordinator(Some(Arc::new(store.clone())), Arc::clone(&fetcher));
        let (first, second) = (AssetId::from("iter_1"), AssetId::from("iter_2"));
        let first_locator = locator("a.glb");

        let (a, (), b) = tokio::join!(
            coordinator.resolve(&first, &first_locator),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                coordinator.evict_all().await;
            },
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                coordinator.resolve(&second, &locator("b.glb")).await
            }
        );
        a.unwrap();
        let b = b.unwrap();

        // The late resolve ran after the namespace was cleared, so it refetched
        // and its handle is both registered and persisted
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(coordinator.lookup(&second, &locator("b.glb")), Some(b));
        assert!(stored_payload(&store, "iter_2").await.is_some());
        assert!(coordinator.lookup(&first, &locator("a.glb")).is_none());
    }
}
