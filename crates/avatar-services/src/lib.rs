//! Avatar Services Layer
//!
//! Orchestration of the avatar pipeline. `AvatarService` is the composition
//! root: it owns the validator, the per-user store, the renderer and the
//! resolver, and is built once from `AvatarConfig` by every entry point (HTTP
//! server, CLI, tests). Keep thin transport handling in avatar-api.

pub mod cache;
pub mod resolver;
pub mod service;
pub mod session;

pub use cache::AvatarUrlCache;
pub use resolver::AvatarResolver;
pub use service::{AvatarService, UPLOAD_FIELD};
pub use session::AvatarSession;

pub use avatar_processing::{
    AvatarRenderer, DecodedAvatar, ImageRenderer, RenderPlan, UploadValidator,
};
pub use avatar_storage::{ConfiguredPaths, LocalAvatarStore, StoragePathProvider};
