use anyhow::Result;
use image::{DynamicImage, GrayImage};

use crate::geometry::{ImageExtent, Rectangle};

/// Anything that can find faces in a grayscale frame.
///
/// Implementations report every face they are confident about; picking the
/// one to frame is left to [`crate::crop::FaceSquareCropper`].
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Rectangle>>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Rectangle>> {
        (**self).detect(gray)
    }
}

/// Detector that never finds anything; every image takes the centered crop.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaces;

impl FaceDetector for NoFaces {
    fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<Rectangle>> {
        Ok(Vec::new())
    }
}

/// Scored detection in image pixels, before it is snapped to the pixel grid.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
}

impl Detection {
    /// Rounds to whole pixels, keeping any part that hangs over the image
    /// edge so the face center stays where the detector put it. `None` when
    /// the box is empty or shares no pixel with `extent`.
    pub fn to_rectangle(&self, extent: ImageExtent) -> Option<Rectangle> {
        let [x, y, w, h] = self.bbox;
        let left = x.round();
        let top = y.round();
        let right = (x + w).round();
        let bottom = (y + h).round();
        if right <= left || bottom <= top {
            return None;
        }
        let rect = Rectangle::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        rect.overlaps(extent).then_some(rect)
    }
}

/// Luma conversion, optionally followed by global histogram equalization so
/// that dim or washed-out portraits still present usable contrast.
pub fn prepare_gray(img: &DynamicImage, equalize: bool) -> GrayImage {
    let gray = img.to_luma8();
    if equalize {
        imageproc::contrast::equalize_histogram(&gray)
    } else {
        gray
    }
}

/// Drops faces smaller than `min_size` in either dimension.
pub fn filter_min_size(faces: Vec<Rectangle>, min_size: u32) -> Vec<Rectangle> {
    faces
        .into_iter()
        .filter(|f| f.width >= min_size && f.height >= min_size)
        .collect()
}

/// Apply non-maximum suppression to remove overlapping detections
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        if keep
            .iter()
            .all(|kept| compute_iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    inter / (a[2] * a[3] + b[2] * b[3] - inter)
}
