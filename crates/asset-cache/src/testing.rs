//! Test doubles shared by the cache's unit tests

use crate::entry::StoredEntry;
use crate::types::SourceLocator;
use asset_blob_store::KeyValueBlobStore;
use asset_fetcher::{AssetFetcher, FetchError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub fn locator(name: &str) -> SourceLocator {
    SourceLocator::new(format!("https://assets.test/{}", name))
}

/// The payload persisted under `key`, without its framing
pub async fn stored_payload(store: &dyn KeyValueBlobStore, key: &str) -> Option<Bytes> {
    let raw = store.get(key).await.unwrap()?;
    Some(StoredEntry::decode(raw).unwrap().payload)
}

/// Origin that answers every locator with the locator's own text as bytes,
/// counting calls. Can be slowed down or told to fail.
pub struct ScriptedFetcher {
    calls: AtomicUsize,
    delay_ms: AtomicU64,
    fail_next: AtomicBool,
    fail_always: AtomicBool,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            fail_next: AtomicBool::new(false),
            fail_always: AtomicBool::new(false),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        let fetcher = Self::new();
        fetcher
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        fetcher
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_always.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str) -> asset_fetcher::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) || self.fail_always.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                locator: locator.to_string(),
                status: 503,
            });
        }

        Ok(Bytes::copy_from_slice(locator.as_bytes()))
    }
}
