//! Avatar Core Library
//!
//! This crate provides the domain models, error types, configuration and policy
//! traits shared by every avatar component: the upload validator, the per-user
//! store, the image pipeline and the resolver.

pub mod capability;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod upload;

// Re-export commonly used types
pub use capability::{Actor, EditOthersPolicy, EditorAllowlist};
pub use config::AvatarConfig;
pub use error::{AvatarError, AvatarResult, ErrorMetadata, LogLevel};
pub use models::{
    AvatarSize, DeleteOutcome, GeneratedAvatar, HousekeepingFailure, HousekeepingOp,
    OutputFormat, SizeVariant, UserId,
};
pub use policy::{AllowedTypesPolicy, ConfiguredTypes, ImageType};
pub use upload::{
    format_size, StoredUpload, UploadDescriptor, UploadErrorCode, UploadFiles, UploadOutcome,
};
