//! The key/blob store interface

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A durable byte-blob store scoped to one namespace.
///
/// Implementations must never expose partial writes: `get` returns the
/// complete bytes of a prior successful `put`, or `None`.
#[async_trait]
pub trait KeyValueBlobStore: Send + Sync {
    /// The namespace every key of this store lives in
    fn namespace(&self) -> &str;

    /// Prepare the backend. Failing here means the backend is unusable.
    async fn init(&self) -> Result<()>;

    /// Store `bytes` under `key`, replacing any previous value
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key in the namespace
    async fn delete_namespace(&self) -> Result<()>;
}

/// Namespaces become directory names and map keys, so they must be a
/// single plain path component.
pub(crate) fn validate_namespace(namespace: &str) -> Result<()> {
    let invalid = namespace.is_empty()
        || namespace == "."
        || namespace == ".."
        || namespace.contains(|c: char| matches!(c, '/' | '\\' | '\0'));

    if invalid {
        return Err(crate::StoreError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}
