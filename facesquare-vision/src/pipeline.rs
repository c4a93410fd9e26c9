use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};

use crate::crop::FaceSquareCropper;
use crate::detector::{prepare_gray, FaceDetector};
use crate::geometry::{CropResult, ImageExtent, Rectangle};

/// Output side of finished thumbnails.
pub const DEFAULT_TARGET_SIZE: u32 = 512;

/// Where a photo would be cropped, without touching its pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
    pub extent: ImageExtent,
    /// Face the crop is centered on; `None` means the centered fallback.
    pub face: Option<Rectangle>,
    pub faces_found: usize,
    pub crop: CropResult,
}

#[derive(Debug)]
pub struct Thumbnail {
    pub plan: CropPlan,
    pub image: DynamicImage,
}

/// Full pipeline: detect faces → pick a square → resize
pub struct Pipeline<D: FaceDetector> {
    pub detector: D,
    pub cropper: FaceSquareCropper,
    pub target_size: u32,
    /// Equalize the grayscale histogram before detection.
    pub equalize: bool,
}

impl<D: FaceDetector> Pipeline<D> {
    pub fn new(detector: D, cropper: FaceSquareCropper) -> Self {
        Self {
            detector,
            cropper,
            target_size: DEFAULT_TARGET_SIZE,
            equalize: true,
        }
    }

    pub fn with_target_size(mut self, target_size: u32) -> Self {
        self.target_size = target_size;
        self
    }

    pub fn with_equalize(mut self, equalize: bool) -> Self {
        self.equalize = equalize;
        self
    }

    /// Detect faces and compute the crop for `img`.
    pub fn plan(&mut self, img: &DynamicImage) -> Result<CropPlan> {
        let extent = ImageExtent::of(img);
        let gray = prepare_gray(img, self.equalize);
        let faces = self.detector.detect(&gray).context("detecting faces")?;

        let face = FaceSquareCropper::select_primary_face(&faces);
        match &face {
            Some(f) => log::debug!(
                "{} face(s), framing {}x{} at ({}, {})",
                faces.len(),
                f.width,
                f.height,
                f.x,
                f.y
            ),
            None => log::warn!("no face detected, falling back to a centered crop"),
        }

        let crop = self
            .cropper
            .compute_crop(extent, face)
            .context("computing square crop")?;

        Ok(CropPlan {
            extent,
            face,
            faces_found: faces.len(),
            crop,
        })
    }

    /// Crop `img` around its primary face and resize to `target_size` square.
    pub fn process(&mut self, img: &DynamicImage) -> Result<Thumbnail> {
        if self.target_size == 0 {
            anyhow::bail!("target size must be positive");
        }
        let plan = self.plan(img)?;
        let CropResult { x, y, side } = plan.crop;
        let image = img
            .crop_imm(x, y, side, side)
            .resize_exact(self.target_size, self.target_size, FilterType::Triangle);

        Ok(Thumbnail { plan, image })
    }
}
