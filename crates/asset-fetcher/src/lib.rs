//! Remote asset origin
//!
//! Fetches the complete bytes behind a source locator. `http`/`https`
//! locators go over the network; `data:` locators carry their bytes inline.
//! Retries and backoff are left to callers; timeouts live on the HTTP client.

pub mod data_url;
pub mod error;
pub mod fetcher;

pub use error::{FetchError, Result};
pub use fetcher::{AssetFetcher, HttpAssetFetcher};
