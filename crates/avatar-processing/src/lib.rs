//! Avatar Processing Library
//!
//! Everything between an untrusted upload and the encoded variant bytes:
//! the upload validator, metadata and EXIF reading, orientation correction,
//! square cropping, resizing and encoding, behind the `AvatarRenderer` seam.

pub mod compression;
pub mod image;
pub mod metadata;
pub mod pipeline;
pub mod validator;

pub use compression::AvatarEncoder;
pub use metadata::ImageMetadata;
pub use pipeline::{
    AvatarRenderer, DecodedAvatar, ImageRenderer, ProcessingError, RenderPlan, RenderedVariant,
};
pub use validator::{UploadValidator, ValidationError};
