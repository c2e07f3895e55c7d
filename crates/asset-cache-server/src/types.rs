//! Core types for the asset cache server

use asset_cache::CacheStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the asset cache server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub models_namespace: String,
    pub textures_namespace: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3005,
            cache_dir: PathBuf::from("./cache/assets"),
            fetch_timeout_secs: 120,
            models_namespace: "models".to_string(),
            textures_namespace: "textures".to_string(),
        }
    }
}

/// Asset classes served, each backed by its own cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Texture,
}

impl AssetKind {
    /// Parse the `{kind}` path segment
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "models" => Some(AssetKind::Model),
            "textures" => Some(AssetKind::Texture),
            _ => None,
        }
    }
}

/// Query string of `GET /assets/{kind}/{id}`
#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub src: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub models: CacheStats,
    pub textures: CacheStats,
}
