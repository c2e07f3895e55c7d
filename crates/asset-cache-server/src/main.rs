//! Asset Cache Server
//!
//! Serves generated 3D models and textures through identity-stable,
//! disk-backed caches, one namespace per asset class.

mod error;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use asset_blob_store::FileBlobStore;
use asset_cache::{AssetCache, AssetId, LocalAsset};
use asset_fetcher::{AssetFetcher, HttpAssetFetcher};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("asset_cache_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting asset cache server...");

    let config = load_config();
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Fetch timeout: {} seconds", config.fetch_timeout_secs);

    // Models and textures reuse ids, so they must never share a namespace
    if config.models_namespace == config.textures_namespace {
        return Err(ServerError::Config(format!(
            "models and textures share namespace {:?}",
            config.models_namespace
        )));
    }

    let fetcher: Arc<dyn AssetFetcher> = Arc::new(HttpAssetFetcher::with_timeout(
        Duration::from_secs(config.fetch_timeout_secs),
    )?);

    let models = build_cache(&config.cache_dir, &config.models_namespace, &fetcher).await?;
    let textures = build_cache(&config.cache_dir, &config.textures_namespace, &fetcher).await?;

    // Create shared state
    let state: SharedState = Arc::new(ServerState::new(models, textures));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}

async fn build_cache(
    cache_dir: &Path,
    namespace: &str,
    fetcher: &Arc<dyn AssetFetcher>,
) -> Result<AssetCache<LocalAsset>> {
    let store = FileBlobStore::new(cache_dir, namespace)?;
    let factory: fn(&AssetId, Bytes) -> LocalAsset = LocalAsset::from_bytes;

    let cache = AssetCache::builder(namespace, Arc::clone(fetcher), factory)
        .store(Arc::new(store))
        .build()
        .await?;

    if !cache.is_persistent() {
        info!(namespace, "Serving without persistence");
    }
    Ok(cache)
}

fn load_config() -> ServerConfig {
    let defaults = ServerConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let cache_dir = std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.cache_dir);

    let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.fetch_timeout_secs);

    let models_namespace =
        std::env::var("MODELS_NAMESPACE").unwrap_or(defaults.models_namespace);

    let textures_namespace =
        std::env::var("TEXTURES_NAMESPACE").unwrap_or(defaults.textures_namespace);

    ServerConfig {
        port,
        cache_dir,
        fetch_timeout_secs,
        models_namespace,
        textures_namespace,
    }
}
