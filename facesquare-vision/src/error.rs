use thiserror::Error;

/// Rejected inputs of the square cropper.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CropError {
    #[error("image extent {width}x{height} has a zero dimension")]
    EmptyExtent { width: u32, height: u32 },

    #[error("face rectangle {width}x{height} has a zero dimension")]
    DegenerateFace { width: u32, height: u32 },

    #[error("face rectangle at ({x}, {y}) lies entirely outside the {width}x{height} image")]
    FaceOutsideImage {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("invalid crop configuration: {0}")]
    InvalidConfig(String),
}
