//! Process-lifetime map from asset id to its materialized handle

use crate::error::{CacheError, Result};
use crate::handle::{Handle, HandleFactory};
use crate::types::AssetId;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Holds at most one live handle per id and materializes each id exactly
/// once between evictions. No I/O.
pub struct HandleRegistry<T> {
    handles: RwLock<HashMap<AssetId, Handle<T>>>,
    factory: Arc<dyn HandleFactory<T>>,
}

impl<T> HandleRegistry<T> {
    pub fn new(factory: Arc<dyn HandleFactory<T>>) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            factory,
        }
    }

    pub fn get(&self, id: &AssetId) -> Option<Handle<T>> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.get(id).cloned()
    }

    /// Build the handle for `id` from `bytes` and register it.
    ///
    /// Fails if `id` already has a live handle: the coordinator must evict first.
    pub fn materialize(&self, id: &AssetId, bytes: Bytes) -> Result<Handle<T>> {
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);

        if handles.contains_key(id) {
            return Err(CacheError::InvariantViolation(format!(
                "second handle materialized for live id {}",
                id
            )));
        }

        let handle = Handle::new(self.factory.materialize(id, bytes));
        handles.insert(id.clone(), handle.clone());
        Ok(handle)
    }

    pub fn remove(&self, id: &AssetId) -> Option<Handle<T>> {
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        handles.remove(id)
    }

    /// Drop every handle, returning how many were registered
    pub fn clear(&self) -> usize {
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        let count = handles.len();
        handles.clear();
        count
    }

    pub fn len(&self) -> usize {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
