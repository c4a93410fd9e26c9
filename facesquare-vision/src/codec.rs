use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// Reads source photos and writes finished thumbnails.
pub trait ImageCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage>;
    fn encode(&self, img: &DynamicImage, path: &Path) -> Result<()>;
}

/// Decodes whatever `image` understands, always writes baseline JPEG.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    pub const DEFAULT_QUALITY: u8 = 92;

    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            anyhow::bail!("jpeg quality must be between 1 and 100, got {}", quality);
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self {
            quality: Self::DEFAULT_QUALITY,
        }
    }
}

impl ImageCodec for JpegCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).with_context(|| format!("failed to read image {}", path.display()))
    }

    fn encode(&self, img: &DynamicImage, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        // JPEG has no alpha channel.
        let rgb = img.to_rgb8();
        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .encode_image(&rgb)
            .with_context(|| format!("failed to write image {}", path.display()))?;
        Ok(())
    }
}
