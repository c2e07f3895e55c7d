//! Handles to materialized asset bytes

use crate::types::AssetId;
use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Opaque, identity-stable reference to a materialized asset.
///
/// Equality is pointer identity: two handles are equal only if they came
/// from the same materialization. Dropping a handle never affects the
/// cache; only `evict`/`evict_all` retire an id's registered handle.
pub struct Handle<T>(Arc<T>);

impl<T> Handle<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Whether both handles refer to the same materialization
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for Handle<T> {}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle")
            .field(&Arc::as_ptr(&self.0))
            .field(&*self.0)
            .finish()
    }
}

/// Turns raw bytes into the value a handle points at.
///
/// Called at most once per id between evictions.
pub trait HandleFactory<T>: Send + Sync {
    fn materialize(&self, id: &AssetId, bytes: Bytes) -> T;
}

impl<T, F> HandleFactory<T> for F
where
    F: Fn(&AssetId, Bytes) -> T + Send + Sync,
{
    fn materialize(&self, id: &AssetId, bytes: Bytes) -> T {
        self(id, bytes)
    }
}

/// Bytes held in memory, addressable without going back to the store
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub id: AssetId,
    pub bytes: Bytes,
}

impl LocalAsset {
    pub fn from_bytes(id: &AssetId, bytes: Bytes) -> Self {
        Self {
            id: id.clone(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
