//! Avatar Storage Library
//!
//! Local filesystem storage for avatar variants.
//!
//! # Layout
//!
//! Every user owns one folder under the avatars directory:
//!
//! - `{uploads_base}/{avatars_dir}/{user_id}/{token}-full.{ext}`
//! - `{uploads_base}/{avatars_dir}/{user_id}/{token}-thumb.{ext}`
//!
//! There is no index and no metadata file: the folder listing is the source of
//! truth. Filename generation and parsing is centralized in the `keys` module.

pub mod keys;
pub mod local;
pub mod paths;
pub mod traits;

// Re-export commonly used types
pub use keys::{parse_variant_filename, variant_filename, VariantFile};
pub use local::LocalAvatarStore;
pub use paths::ConfiguredPaths;
pub use traits::{StorageError, StoragePathProvider, StorageResult};
