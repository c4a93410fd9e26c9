pub mod codec;
pub mod crop;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod model;
pub mod pipeline;
pub mod yunet;

// Re-export commonly used types
pub use codec::{ImageCodec, JpegCodec};
pub use crop::{CropConfig, FaceSquareCropper};
pub use detector::{FaceDetector, NoFaces};
pub use error::CropError;
pub use geometry::{CropResult, ImageExtent, Rectangle};
pub use pipeline::{CropPlan, Pipeline, Thumbnail};
pub use yunet::YunetDetector;
