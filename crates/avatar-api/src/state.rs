use avatar_core::AvatarConfig;
use avatar_services::AvatarService;

/// Shared application state, handed to handlers as `Arc<AppState>`.
pub struct AppState {
    pub avatars: AvatarService,
    pub config: AvatarConfig,
}

impl AppState {
    pub fn new(avatars: AvatarService, config: AvatarConfig) -> Self {
        Self { avatars, config }
    }
}
