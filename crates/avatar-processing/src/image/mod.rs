//! Image processing module
//!
//! - Metadata and EXIF extraction (processor)
//! - Orientation correction (orientation)
//! - Center square crop (crop)
//! - Downscaling to the variant sizes (resize)

pub mod crop;
pub mod orientation;
pub mod processor;
pub mod resize;

pub use crop::{center_square_region, CropRegion};
pub use orientation::ImageOrientation;
pub use processor::ImageProcessor;
pub use resize::ImageResize;
