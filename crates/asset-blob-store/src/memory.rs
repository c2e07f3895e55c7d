//! In-memory blob store
//!
//! Clones share one backend, so a fresh cache built over a clone sees the
//! same blobs. `set_available(false)` makes every operation fail, which
//! lets callers exercise their store-failure paths.

use crate::error::{Result, StoreError};
use crate::store::{validate_namespace, KeyValueBlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

type Namespaces = HashMap<String, HashMap<String, Bytes>>;

#[derive(Clone)]
pub struct MemoryBlobStore {
    namespace: String,
    blobs: Arc<RwLock<Namespaces>>,
    available: Arc<AtomicBool>,
}

impl MemoryBlobStore {
    pub fn new(namespace: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            namespace: namespace.to_string(),
            blobs: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A store for another namespace over the same backend
    pub fn with_namespace(&self, namespace: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            namespace: namespace.to_string(),
            blobs: Arc::clone(&self.blobs),
            available: Arc::clone(&self.available),
        })
    }

    /// Toggle the backend on or off for every store sharing it
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of blobs in this store's namespace
    pub async fn len(&self) -> usize {
        let blobs = self.blobs.read().await;
        blobs.get(&self.namespace).map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "memory backend for {:?} is offline",
                self.namespace
            )))
        }
    }
}

#[async_trait]
impl KeyValueBlobStore for MemoryBlobStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn init(&self) -> Result<()> {
        self.check_available()
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.check_available()?;
        let mut blobs = self.blobs.write().await;
        blobs
            .entry(self.namespace.clone())
            .or_default()
            .insert(key.to_string(), Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.check_available()?;
        let blobs = self.blobs.read().await;
        Ok(blobs
            .get(&self.namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        let mut blobs = self.blobs.write().await;
        if let Some(ns) = blobs.get_mut(&self.namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn delete_namespace(&self) -> Result<()> {
        self.check_available()?;
        let mut blobs = self.blobs.write().await;
        blobs.remove(&self.namespace);
        Ok(())
    }
}
