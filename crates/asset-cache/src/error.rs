//! Error types for the asset cache

use asset_blob_store::StoreError;
use asset_fetcher::FetchError;
use std::fmt;
use std::sync::Arc;

/// Errors surfaced by `resolve`.
///
/// Cloneable so one in-flight fetch can hand its outcome to every waiter.
#[derive(Debug, Clone)]
pub enum CacheError {
    Fetch(Arc<FetchError>),
    Store(Arc<StoreError>),
    /// A coordinator bug, e.g. a second handle for a live id
    InvariantViolation(String),
}

impl CacheError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, CacheError::Fetch(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, CacheError::Store(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Fetch(err) => write!(f, "Fetch error: {}", err),
            CacheError::Store(err) => write!(f, "Store error: {}", err),
            CacheError::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Fetch(err) => Some(err.as_ref()),
            CacheError::Store(err) => Some(err.as_ref()),
            CacheError::InvariantViolation(_) => None,
        }
    }
}

impl From<FetchError> for CacheError {
    fn from(err: FetchError) -> Self {
        CacheError::Fetch(Arc::new(err))
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        CacheError::Store(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
