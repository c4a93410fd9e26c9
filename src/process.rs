use anyhow::{Context, Result};
use facesquare_vision::{CropPlan, FaceDetector, ImageCodec, Pipeline};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::backup;

/// What happened to one photo.
#[derive(Debug)]
pub struct Outcome {
    pub plan: CropPlan,
    pub size: u32,
    /// Set when this run made the backup copy.
    pub backup: Option<PathBuf>,
}

/// Crop plan of one photo in a form fit for `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub faces_found: usize,
    /// `[x, y, width, height]` of the framed face.
    pub face: Option<[i64; 4]>,
    /// `[x, y, side]` of the square crop.
    pub crop: [u32; 3],
}

impl PlanReport {
    pub fn new(path: &Path, plan: &CropPlan) -> Self {
        Self {
            path: path.to_path_buf(),
            width: plan.extent.width,
            height: plan.extent.height,
            faces_found: plan.faces_found,
            face: plan
                .face
                .map(|f| [f.x as i64, f.y as i64, f.width as i64, f.height as i64]),
            crop: [plan.crop.x, plan.crop.y, plan.crop.side],
        }
    }
}

/// Thumbnails are always written as JPEG, in place.
fn check_writable_as_jpeg(path: &Path) -> Result<()> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if !is_jpeg {
        anyhow::bail!(
            "{} would be overwritten with JPEG data; only .jpg/.jpeg targets are supported",
            path.display()
        );
    }
    Ok(())
}

fn decode<C: ImageCodec>(path: &Path, codec: &C) -> Result<image::DynamicImage> {
    if !path.exists() {
        anyhow::bail!("{} not found", path.display());
    }
    codec.decode(path)
}

/// Computes where `path` would be cropped without writing anything.
pub fn plan_one<D: FaceDetector, C: ImageCodec>(
    path: &Path,
    pipeline: &mut Pipeline<D>,
    codec: &C,
) -> Result<CropPlan> {
    let img = decode(path, codec)?;
    pipeline
        .plan(&img)
        .with_context(|| format!("planning crop for {}", path.display()))
}

/// Turns `path` into a square thumbnail in place, after backing the
/// original up into `backup_dir` (once).
pub fn process_one<D: FaceDetector, C: ImageCodec>(
    path: &Path,
    pipeline: &mut Pipeline<D>,
    codec: &C,
    backup_dir: &Path,
) -> Result<Outcome> {
    check_writable_as_jpeg(path)?;
    let img = decode(path, codec)?;
    let thumb = pipeline
        .process(&img)
        .with_context(|| format!("cropping {}", path.display()))?;
    log::debug!(
        "{}: crop {}px at ({}, {})",
        path.display(),
        thumb.plan.crop.side,
        thumb.plan.crop.x,
        thumb.plan.crop.y
    );

    let backup = backup::backup_once(path, backup_dir)?;
    if let Some(b) = &backup {
        log::info!("Backed up {} to {}", path.display(), b.display());
    }

    codec.encode(&thumb.image, path)?;

    Ok(Outcome {
        plan: thumb.plan,
        size: pipeline.target_size,
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facesquare_vision::{FaceSquareCropper, JpegCodec, NoFaces, Rectangle};
    use image::{DynamicImage, GrayImage, RgbImage};

    struct OneFace(Rectangle);

    impl FaceDetector for OneFace {
        fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<Rectangle>> {
            Ok(vec![self.0])
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("facesquare-process-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_photo(path: &Path, width: u32, height: u32) -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 120, 200])));
        JpegCodec::default().encode(&img, path)
    }

    #[test]
    fn test_process_overwrites_and_backs_up_once() -> Result<()> {
        let dir = scratch("overwrite");
        let photo = dir.join("me.jpg");
        write_photo(&photo, 640, 480)?;
        let originals = dir.join("originals");

        let codec = JpegCodec::default();
        let mut pipeline = Pipeline::new(NoFaces, FaceSquareCropper::default()).with_target_size(96);

        let outcome = process_one(&photo, &mut pipeline, &codec, &originals)?;
        assert_eq!(outcome.size, 96);
        assert_eq!(outcome.backup, Some(originals.join("me.jpg")));
        assert_eq!(outcome.plan.crop.side, 480);

        let written = image::open(&photo)?;
        assert_eq!((written.width(), written.height()), (96, 96));
        let kept = image::open(originals.join("me.jpg"))?;
        assert_eq!((kept.width(), kept.height()), (640, 480));

        // Second run crops the thumbnail again but leaves the backup alone.
        let outcome = process_one(&photo, &mut pipeline, &codec, &originals)?;
        assert_eq!(outcome.backup, None);
        let kept = image::open(originals.join("me.jpg"))?;
        assert_eq!((kept.width(), kept.height()), (640, 480));

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_plan_writes_nothing() -> Result<()> {
        let dir = scratch("plan");
        let photo = dir.join("me.jpg");
        write_photo(&photo, 1000, 1000)?;
        let before = std::fs::read(&photo)?;

        let mut pipeline = Pipeline::new(
            OneFace(Rectangle::new(490, 490, 20, 20)),
            FaceSquareCropper::default(),
        );
        let plan = plan_one(&photo, &mut pipeline, &JpegCodec::default())?;
        assert_eq!(plan.face, Some(Rectangle::new(490, 490, 20, 20)));

        let report = PlanReport::new(&photo, &plan);
        assert_eq!(report.crop, [400, 400, 200]);
        assert_eq!(report.face, Some([490, 490, 20, 20]));
        assert_eq!((report.width, report.height), (1000, 1000));

        let json = serde_json::to_value(&report)?;
        assert_eq!(json["crop"], serde_json::json!([400, 400, 200]));
        assert_eq!(json["faces_found"], 1);

        assert_eq!(std::fs::read(&photo)?, before);
        assert!(!dir.join("originals").exists());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_non_jpeg_target_is_left_alone() -> Result<()> {
        let dir = scratch("png");
        let photo = dir.join("me.png");
        let img = DynamicImage::ImageRgb8(RgbImage::new(300, 200));
        img.save(&photo)?;
        let before = std::fs::read(&photo)?;

        let mut pipeline = Pipeline::new(NoFaces, FaceSquareCropper::default());
        let err = process_one(
            &photo,
            &mut pipeline,
            &JpegCodec::default(),
            &dir.join("originals"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("only .jpg/.jpeg"));
        assert_eq!(std::fs::read(&photo)?, before);
        assert!(!dir.join("originals").exists());

        // Upper-case extensions are still JPEG.
        let upper = dir.join("ME.JPEG");
        JpegCodec::default().encode(&img, &upper)?;
        process_one(&upper, &mut pipeline, &JpegCodec::default(), &dir.join("originals"))?;

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_missing_photo() {
        let dir = scratch("missing");
        let mut pipeline = Pipeline::new(NoFaces, FaceSquareCropper::default());
        let err = process_one(
            &dir.join("ghost.jpg"),
            &mut pipeline,
            &JpegCodec::default(),
            &dir.join("originals"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!dir.join("originals").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
