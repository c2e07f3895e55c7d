//! HTTP server for asset cache endpoints
//!
//! Provides /health, GET and DELETE /assets/{kind}/{id}, and DELETE /assets/{kind}.

use crate::types::{AssetKind, HealthResponse, ResolveQuery};
use asset_cache::{AssetCache, AssetId, CacheError, LocalAsset, SourceLocator};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use url::Url;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const OCTET_STREAM: &str = "application/octet-stream";

/// Shared state for the HTTP server
pub struct ServerState {
    pub models: AssetCache<LocalAsset>,
    pub textures: AssetCache<LocalAsset>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(models: AssetCache<LocalAsset>, textures: AssetCache<LocalAsset>) -> Self {
        Self {
            models,
            textures,
            started_at: Utc::now(),
        }
    }

    fn cache_for(&self, segment: &str) -> Option<&AssetCache<LocalAsset>> {
        match AssetKind::from_segment(segment)? {
            AssetKind::Model => Some(&self.models),
            AssetKind::Texture => Some(&self.textures),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/assets/{kind}", delete(evict_kind))
        .route("/assets/{kind}/{id}", get(get_asset).delete(evict_asset))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        models: state.models.stats(),
        textures: state.textures.stats(),
    })
}

/// Resolve an asset and return its bytes
async fn get_asset(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<ResolveQuery>,
) -> Response {
    let Some(cache) = state.cache_for(&kind) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown asset kind");
    };

    let Some(src) = query.src.filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing src locator");
    };

    let id = AssetId::new(id);
    let locator = SourceLocator::new(src);
    let from_cache = cache.peek(&id, &locator).is_some();

    match cache.resolve(&id, &locator).await {
        Ok(handle) => {
            let cache_header = if from_cache { "HIT" } else { "MISS" };

            (
                [
                    (header::CONTENT_TYPE, content_type_for(locator.as_str())),
                    (header::CACHE_CONTROL, "public, max-age=86400"),
                    (X_CACHE, cache_header),
                ],
                Body::from(handle.bytes.clone()),
            )
                .into_response()
        }
        Err(e) => {
            let status = match &e {
                CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
                CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                CacheError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };

            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(kind = %kind, id = %id, error = %e, "Cache invariant violated");
            } else {
                warn!(
                    kind = %kind,
                    id = %id,
                    locator = %locator,
                    error = %e,
                    "Failed to resolve asset"
                );
            }

            error_response(status, "Asset unavailable")
        }
    }
}

/// Evict one asset
async fn evict_asset(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let Some(cache) = state.cache_for(&kind) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown asset kind");
    };

    cache.evict(&AssetId::new(id)).await;
    StatusCode::NO_CONTENT.into_response()
}

/// Evict every asset of one kind
async fn evict_kind(State(state): State<SharedState>, Path(kind): Path<String>) -> Response {
    let Some(cache) = state.cache_for(&kind) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown asset kind");
    };

    cache.evict_all().await;
    StatusCode::NO_CONTENT.into_response()
}

fn media_type(name: &str) -> Option<&'static str> {
    let media = match name.to_ascii_lowercase().as_str() {
        "glb" | "model/gltf-binary" => "model/gltf-binary",
        "gltf" | "model/gltf+json" => "model/gltf+json",
        "png" | "image/png" => "image/png",
        "jpg" | "jpeg" | "image/jpeg" => "image/jpeg",
        "webp" | "image/webp" => "image/webp",
        "ply" | "application/ply" => "application/ply",
        "mp4" | "video/mp4" => "video/mp4",
        _ => return None,
    };
    Some(media)
}

/// Content type from a `data:` media type or the locator's file extension
fn content_type_for(locator: &str) -> &'static str {
    if let Some(rest) = locator.strip_prefix("data:") {
        let declared = rest.split(|c: char| c == ';' || c == ',').next().unwrap_or_default();
        return media_type(declared).unwrap_or(OCTET_STREAM);
    }

    Url::parse(locator)
        .ok()
        .and_then(|url| {
            let path = url.path();
            let (_, ext) = path.rsplit_once('.')?;
            media_type(ext)
        })
        .unwrap_or(OCTET_STREAM)
}
