//! Locator-based byte fetching

use crate::data_url;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Read-only byte source addressed by locator.
///
/// A successful fetch yields the complete, final bytes for the locator.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Bytes>;
}

/// Fetches `http(s)` locators with reqwest and decodes `data:` locators inline
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    /// Create a fetcher with reqwest's default client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a fetcher whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: Url) -> Result<Bytes> {
        debug!(url = %url, "Fetching asset from origin");

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch asset");
            return Err(FetchError::Status {
                locator: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let data = response.bytes().await?;
        debug!(url = %url, size = data.len(), "Fetched asset from origin");
        Ok(data)
    }
}

impl Default for HttpAssetFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        // Data URLs can be megabytes long; decode without building a Url
        if locator.starts_with("data:") {
            return data_url::decode(locator);
        }

        let url = Url::parse(locator)
            .map_err(|e| FetchError::InvalidLocator(format!("{}: {}", locator, e)))?;

        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            other => Err(FetchError::UnsupportedLocator(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn spawn_origin() -> SocketAddr {
        let router = Router::new()
            .route("/model.glb", get(|| async { b"glTF-binary".to_vec() }))
            .route(
                "/gone.glb",
                get(|| async { (StatusCode::NOT_FOUND, "not found") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_fetch_http() {
        let addr = spawn_origin().await;
        let fetcher = HttpAssetFetcher::with_timeout(Duration::from_secs(5)).unwrap();

        let bytes = fetcher
            .fetch(&format!("http://{}/model.glb", addr))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"glTF-binary");
    }

    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let addr = spawn_origin().await;
        let fetcher = HttpAssetFetcher::new();

        let result = fetcher.fetch(&format!("http://{}/gone.glb", addr)).await;
        assert!(matches!(
            result,
            Err(FetchError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_data_url() {
        let fetcher = HttpAssetFetcher::new();

        let bytes = fetcher.fetch("data:image/png;base64,aGVsbG8=").await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_fetch_unsupported_scheme() {
        let fetcher = HttpAssetFetcher::new();

        let result = fetcher.fetch("ftp://example.com/model.glb").await;
        assert!(matches!(result, Err(FetchError::UnsupportedLocator(s)) if s == "ftp"));
    }

    #[tokio::test]
    async fn test_fetch_invalid_locator() {
        let fetcher = HttpAssetFetcher::new();

        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidLocator(_))));
    }
}
