use std::sync::Arc;

use avatar_core::AvatarConfig;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Route table: avatar endpoints, health and static serving of `uploads_dir`.
pub fn build_router(state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let config = &state.config;
    let cors = setup_cors(config)?;
    let body_limit = usize::try_from(config.site_upload_limit_bytes).unwrap_or(usize::MAX);

    let avatar_routes = Router::new()
        .route("/avatar/upload", post(handlers::avatar::upload_avatar))
        .route(
            "/avatar/{user}",
            get(handlers::avatar::get_avatar).delete(handlers::avatar::delete_avatar),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(avatar_routes)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &AvatarConfig) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
