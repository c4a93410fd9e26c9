pub mod backup;
pub mod config;
pub mod process;

// Re-export vision types for convenience
pub use facesquare_vision::{
    codec, crop, detector, geometry, pipeline, CropConfig, CropError, CropResult, FaceDetector,
    FaceSquareCropper, ImageCodec, ImageExtent, JpegCodec, NoFaces, Pipeline, Rectangle,
    YunetDetector,
};
