//! YuNet face detector backed by ONNX Runtime.
//!
//! The exported model takes a fixed `[1, 3, 640, 640]` BGR tensor and emits
//! twelve heads, four per stride (8, 16, 32), in the order
//! `cls_8, cls_16, cls_32, obj_*, bbox_*, kps_*`. Decoding is anchor-free:
//!
//! ```text
//! score = sqrt(clamp(cls) * clamp(obj))
//! cx = (col + dx) * stride        w = exp(dw) * stride
//! cy = (row + dy) * stride        h = exp(dh) * stride
//! ```
//!
//! Landmarks (`kps_*`) are not needed for framing and are ignored.

use std::path::Path;

use anyhow::Result;
use image::{imageops, GrayImage};
use ndarray::{Array2, Array4};
use ort::{session::Session, value::Value};

use crate::detector::{filter_min_size, nms, Detection, FaceDetector};
use crate::geometry::{ImageExtent, Rectangle};

const STRIDES: [usize; 3] = [8, 16, 32];

/// Side of the square network input.
pub const INPUT_SIZE: u32 = 640;

/// Classification and box predictions of one stride, one row per grid cell.
#[derive(Debug, Clone)]
pub struct Head {
    pub stride: usize,
    pub scores: Array2<f32>,
    pub boxes: Array2<f32>,
}

/// Picks the score and box heads out of the raw model outputs and checks
/// their shapes against the grid implied by `input_size`.
pub fn parse_outputs(outputs: &[(&[i64], &[f32])], input_size: usize) -> Result<Vec<Head>> {
    let levels = STRIDES.len();
    STRIDES
        .iter()
        .enumerate()
        .map(|(level, &stride)| {
            let cells = (input_size / stride) * (input_size / stride);
            let cls = head_tensor(outputs, level, cells, 1, "cls")?;
            let obj = head_tensor(outputs, level + levels, cells, 1, "obj")?;
            let boxes = head_tensor(outputs, level + 2 * levels, cells, 4, "bbox")?;

            let scores = ndarray::Zip::from(&cls)
                .and(&obj)
                .map_collect(|&c, &o| (c.clamp(0.0, 1.0) * o.clamp(0.0, 1.0)).sqrt());

            Ok(Head {
                stride,
                scores,
                boxes,
            })
        })
        .collect()
}

fn head_tensor(
    outputs: &[(&[i64], &[f32])],
    index: usize,
    cells: usize,
    width: usize,
    name: &str,
) -> Result<Array2<f32>> {
    let (shape, data) = outputs
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing {} output at index {}", name, index))?;
    if shape[..] != [1, cells as i64, width as i64] {
        anyhow::bail!(
            "unexpected {} shape at index {}: {:?}, expected [1, {}, {}]",
            name,
            index,
            shape,
            cells,
            width
        );
    }
    Ok(Array2::from_shape_vec((cells, width), data.to_vec())?)
}

/// Turns grid predictions into boxes in network-input pixels.
pub fn decode(heads: &[Head], score_threshold: f32, input_size: usize) -> Vec<Detection> {
    let mut detections = Vec::new();

    for head in heads {
        let cols = input_size / head.stride;
        let stride = head.stride as f32;

        for (idx, &score) in head.scores.column(0).iter().enumerate() {
            if score < score_threshold {
                continue;
            }
            let (row, col) = ((idx / cols) as f32, (idx % cols) as f32);
            let b = head.boxes.row(idx);

            let cx = (col + b[0]) * stride;
            let cy = (row + b[1]) * stride;
            let w = b[2].exp() * stride;
            let h = b[3].exp() * stride;

            detections.push(Detection {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
            });
        }
    }

    detections
}

/// A frame scaled to fit the network input and pasted centered on a black
/// square canvas, with the transform needed to map boxes back.
pub struct Letterbox {
    pub canvas: GrayImage,
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    pub fn fit(gray: &GrayImage, target_size: u32) -> Self {
        let (width, height) = gray.dimensions();
        let scale = target_size as f32 / width.max(height) as f32;
        let new_width = ((width as f32 * scale) as u32).clamp(1, target_size);
        let new_height = ((height as f32 * scale) as u32).clamp(1, target_size);

        let resized = imageops::resize(gray, new_width, new_height, imageops::FilterType::Triangle);

        let mut canvas = GrayImage::new(target_size, target_size);
        let offset_x = (target_size - new_width) / 2;
        let offset_y = (target_size - new_height) / 2;
        imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

        Self {
            canvas,
            scale,
            offset_x,
            offset_y,
        }
    }

    /// NCHW tensor with the gray plane repeated across the B, G and R channels.
    pub fn to_tensor(&self) -> Result<Array4<f32>> {
        let (w, h) = self.canvas.dimensions();
        let plane: Vec<f32> = self.canvas.as_raw().iter().map(|&v| v as f32).collect();
        let data = plane.repeat(3);
        Ok(Array4::from_shape_vec((1, 3, h as usize, w as usize), data)?)
    }

    /// Maps a detection on the canvas back into source-image pixels.
    pub fn unmap(&self, d: &Detection) -> Detection {
        let [x, y, w, h] = d.bbox;
        Detection {
            bbox: [
                (x - self.offset_x as f32) / self.scale,
                (y - self.offset_y as f32) / self.scale,
                w / self.scale,
                h / self.scale,
            ],
            score: d.score,
        }
    }
}

pub struct YunetDetector {
    session: Session,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Faces smaller than this in either dimension are dropped.
    pub min_face_size: u32,
}

impl YunetDetector {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            score_threshold: 0.6,
            nms_threshold: 0.3,
            min_face_size: 60,
        }
    }

    pub fn from_file(model: &Path) -> Result<Self> {
        Ok(Self::new(crate::model::detector_session(model)?))
    }

    pub fn with_thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self.nms_threshold = nms_threshold;
        self
    }

    pub fn with_min_face_size(mut self, min_face_size: u32) -> Self {
        self.min_face_size = min_face_size;
        self
    }
}

impl FaceDetector for YunetDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Rectangle>> {
        let extent = ImageExtent::new(gray.height(), gray.width());
        let letterbox = Letterbox::fit(gray, INPUT_SIZE);
        let input_tensor = Value::from_array(letterbox.to_tensor()?)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }
        drop(outputs);

        let output_refs: Vec<(&[i64], &[f32])> = output_data
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let heads = parse_outputs(&output_refs, INPUT_SIZE as usize)?;
        let raw = decode(&heads, self.score_threshold, INPUT_SIZE as usize);
        let kept = if self.nms_threshold < 1.0 {
            nms(&raw, self.nms_threshold)
        } else {
            raw
        };

        let faces: Vec<Rectangle> = kept
            .iter()
            .filter_map(|d| letterbox.unmap(d).to_rectangle(extent))
            .collect();
        let found = faces.len();
        let faces = filter_min_size(faces, self.min_face_size);
        log::debug!(
            "yunet: {} candidates, {} after nms, {} of at least {}px",
            found,
            kept.len(),
            faces.len(),
            self.min_face_size
        );

        Ok(faces)
    }
}
