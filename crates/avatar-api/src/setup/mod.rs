//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use avatar_core::AvatarConfig;
use avatar_services::AvatarService;
use std::sync::Arc;

/// Build the avatar service, shared state and router.
pub async fn initialize_app(config: AvatarConfig) -> Result<(Arc<AppState>, axum::Router)> {
    tokio::fs::create_dir_all(config.avatars_dir())
        .await
        .with_context(|| format!("Failed to create {}", config.avatars_dir().display()))?;

    let avatars = AvatarService::from_config(&config).context("Failed to build avatar service")?;

    tracing::info!(
        environment = %config.environment,
        uploads_dir = %config.uploads_dir.display(),
        "Configuration loaded and validated successfully"
    );

    let state = Arc::new(AppState::new(avatars, config));
    let router = routes::build_router(state.clone())?;

    Ok((state, router))
}
