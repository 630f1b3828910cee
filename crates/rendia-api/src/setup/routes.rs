//! Route configuration.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use rendia_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::constants::{API_PREFIX, MAX_BODY_BYTES};
use crate::handlers;
use crate::state::AppState;

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any))
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    let media_routes = Router::new()
        .route("/presigned-upload-url", post(handlers::presigned_upload::request_presigned_upload))
        .route("/confirm-upload", post(handlers::confirm_upload::confirm_upload))
        .route("/", get(handlers::media_get::list_media))
        .route(
            "/{media_id}",
            get(handlers::media_get::get_media).delete(handlers::media_delete::delete_media),
        );

    let router = Router::new()
        .route("/health", get(handlers::health::health))
        .nest(API_PREFIX, media_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    Ok(router)
}
