//! Core types for the asset cache

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Caller-supplied identifier for one generated artifact instance.
///
/// Stable for the artifact's lifetime and never reused for other content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Where an asset's bytes can currently be fetched: a URL or a `data:` reference.
///
/// Compared by exact string equality; a different locator for a known id
/// means the content changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator(String);

impl SourceLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inline data references are not worth logging in full
        if self.0.starts_with("data:") && self.0.len() > 64 {
            let cut = self.0.char_indices().nth(48).map_or(self.0.len(), |(i, _)| i);
            write!(f, "{}...({} bytes)", &self.0[..cut], self.0.len())
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for SourceLocator {
    fn from(locator: &str) -> Self {
        Self(locator.to_string())
    }
}

impl From<String> for SourceLocator {
    fn from(locator: String) -> Self {
        Self(locator)
    }
}

/// Statistics about one cache instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub namespace: String,
    pub persistent: bool,
    /// Live handles in the registry
    pub handles: usize,
    pub registry_hits: u64,
    pub store_hits: u64,
    pub fetches: u64,
    pub evictions: u64,
}
