//! Face-centered square cropping.
//!
//! Given the extent of a photo and the faces a detector found in it, pick a
//! square region that frames the largest face with a fixed amount of padding,
//! translated (never shrunk, unless the image itself is too small) to stay
//! inside the image. Without a face, the largest centered square is used.

use std::cmp::Reverse;

use crate::error::CropError;
use crate::geometry::{CropResult, ImageExtent, Rectangle};

/// Crop side as a multiple of the larger face dimension.
pub const DEFAULT_PADDING_FACTOR: f64 = 2.2;

/// Smallest crop side that is still worth thumbnailing.
pub const DEFAULT_MIN_SIDE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropConfig {
    /// Margin around the detected face: side = max(face w, face h) * padding_factor.
    pub padding_factor: f64,
    /// Floor on the crop side; the image's larger dimension is the ceiling.
    pub min_side: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            padding_factor: DEFAULT_PADDING_FACTOR,
            min_side: DEFAULT_MIN_SIDE,
        }
    }
}

/// Computes square crops around faces. Stateless apart from its policy,
/// so one instance can be shared freely across images and threads.
#[derive(Debug, Clone)]
pub struct FaceSquareCropper {
    config: CropConfig,
}

impl Default for FaceSquareCropper {
    fn default() -> Self {
        Self {
            config: CropConfig::default(),
        }
    }
}

impl FaceSquareCropper {
    pub fn new(config: CropConfig) -> Result<Self, CropError> {
        if !config.padding_factor.is_finite() || config.padding_factor <= 0.0 {
            return Err(CropError::InvalidConfig(format!(
                "padding factor must be a positive number, got {}",
                config.padding_factor
            )));
        }
        if config.min_side == 0 {
            return Err(CropError::InvalidConfig(
                "minimum side must be at least 1 pixel".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    /// Largest face by area. Equal areas resolve to the lowest x, then the
    /// lowest y, then the narrowest box, so the choice never depends on the
    /// order the detector reported them in.
    pub fn select_primary_face(faces: &[Rectangle]) -> Option<Rectangle> {
        faces
            .iter()
            .copied()
            .min_by_key(|f| (Reverse(f.area()), f.x, f.y, f.width))
    }

    /// Square crop around the primary face of `faces`, or the centered
    /// fallback when `faces` is empty.
    pub fn crop(&self, extent: ImageExtent, faces: &[Rectangle]) -> Result<CropResult, CropError> {
        self.compute_crop(extent, Self::select_primary_face(faces))
    }

    pub fn compute_crop(
        &self,
        extent: ImageExtent,
        face: Option<Rectangle>,
    ) -> Result<CropResult, CropError> {
        if extent.is_empty() {
            return Err(CropError::EmptyExtent {
                width: extent.width,
                height: extent.height,
            });
        }

        let crop = match face {
            None => center_square(0, 0, extent.width as i64, extent.height as i64),
            Some(face) => {
                validate_face(extent, &face)?;
                self.face_square(extent, &face)
            }
        };

        debug_assert!(crop.fits(extent), "{crop:?} escapes {extent:?}");
        Ok(crop)
    }

    fn face_square(&self, extent: ImageExtent, face: &Rectangle) -> CropResult {
        let width = extent.width as i64;
        let height = extent.height as i64;
        let (fx, fy) = face.center();

        let desired = (face.width.max(face.height) as f64 * self.config.padding_factor)
            .round_ties_even() as i64;
        let side = desired
            .max(self.config.min_side as i64)
            .min(width.max(height));

        let half = side as f64 / 2.0;
        let (x1, x2) = place_on_axis((fx - half).round_ties_even() as i64, side, width);
        let (y1, y2) = place_on_axis((fy - half).round_ties_even() as i64, side, height);

        // Only non-square when `side` exceeds the smaller image dimension.
        center_square(x1, y1, x2 - x1, y2 - y1)
    }
}

fn validate_face(extent: ImageExtent, face: &Rectangle) -> Result<(), CropError> {
    if face.width == 0 || face.height == 0 {
        return Err(CropError::DegenerateFace {
            width: face.width,
            height: face.height,
        });
    }
    if !face.overlaps(extent) {
        return Err(CropError::FaceOutsideImage {
            x: face.x,
            y: face.y,
            width: extent.width,
            height: extent.height,
        });
    }
    Ok(())
}

/// Moves the span `[start, start + len)` into `[0, limit)`.
///
/// Underflow is fixed first by translating right, then overflow by
/// translating left. The span is truncated only when it is longer than the
/// axis itself.
fn place_on_axis(start: i64, len: i64, limit: i64) -> (i64, i64) {
    let (mut lo, mut hi) = (start, start + len);
    if lo < 0 {
        hi -= lo;
        lo = 0;
    }
    if hi > limit {
        lo -= hi - limit;
        hi = limit;
        lo = lo.max(0);
    }
    (lo, hi.min(limit))
}

/// Largest square centered (floor division) in the box at `(x0, y0)`.
fn center_square(x0: i64, y0: i64, width: i64, height: i64) -> CropResult {
    let side = width.min(height);
    let x = (width / 2 - side / 2).max(0);
    let y = (height / 2 - side / 2).max(0);
    CropResult {
        x: (x0 + x) as u32,
        y: (y0 + y) as u32,
        side: side as u32,
    }
}
