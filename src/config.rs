use anyhow::{Context, Result};
use facesquare_vision::{crop, pipeline, CropConfig, JpegCodec};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACESQUARE_CONFIG_PATH").unwrap_or("facesquare.toml"))
});

/// Name of the backup directory created next to each processed photo
/// when `backup_dir` is not set.
pub const BACKUP_DIR_NAME: &str = "originals";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub padding_factor: f64,
    pub min_side: u32,
    pub target_size: u32,
    pub jpeg_quality: u8,
    pub backup_dir: Option<PathBuf>,
    pub targets: Vec<PathBuf>,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub min_face_size: u32,
    pub equalize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            padding_factor: crop::DEFAULT_PADDING_FACTOR,
            min_side: crop::DEFAULT_MIN_SIDE,
            target_size: pipeline::DEFAULT_TARGET_SIZE,
            jpeg_quality: JpegCodec::DEFAULT_QUALITY,
            backup_dir: None,
            targets: Vec::new(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            score_threshold: 0.6,
            nms_threshold: 0.3,
            min_face_size: 60,
            equalize: true,
        }
    }
}

impl Config {
    pub fn crop_config(&self) -> CropConfig {
        CropConfig {
            padding_factor: self.padding_factor,
            min_side: self.min_side,
        }
    }

    pub fn codec(&self) -> Result<JpegCodec> {
        JpegCodec::new(self.jpeg_quality)
    }

    /// Where the original of `photo` is kept before it is overwritten.
    pub fn backup_dir_for(&self, photo: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => photo
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(BACKUP_DIR_NAME),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("facesquare-config-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let cfg = load_config(Some(scratch("missing").join("none.toml").as_path()))?;
        assert_eq!(cfg.padding_factor, 2.2);
        assert_eq!(cfg.min_side, 200);
        assert_eq!(cfg.target_size, 512);
        assert_eq!(cfg.jpeg_quality, 92);
        assert_eq!(cfg.detector.min_face_size, 60);
        assert!(cfg.detector.equalize);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() -> Result<()> {
        let dir = scratch("partial");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("facesquare.toml");
        std::fs::write(
            &path,
            "padding_factor = 1.5\ntargets = [\"a.jpg\"]\n\n[detector]\nequalize = false\n",
        )?;

        let cfg = load_config(Some(path.as_path()))?;
        assert_eq!(cfg.padding_factor, 1.5);
        assert_eq!(cfg.min_side, 200);
        assert_eq!(cfg.targets, vec![PathBuf::from("a.jpg")]);
        assert!(!cfg.detector.equalize);
        assert_eq!(cfg.detector.score_threshold, 0.6);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = scratch("save");
        let path = dir.join("nested").join("facesquare.toml");
        let cfg = Config {
            min_side: 128,
            backup_dir: Some(PathBuf::from("/tmp/originals")),
            ..Config::default()
        };
        save_config(&cfg, Some(path.as_path()))?;

        let loaded = load_config(Some(path.as_path()))?;
        assert_eq!(loaded.min_side, 128);
        assert_eq!(loaded.backup_dir, cfg.backup_dir);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_bad_toml_names_the_file() {
        let dir = scratch("bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("facesquare.toml");
        std::fs::write(&path, "min_side = \"big\"").unwrap();

        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("facesquare.toml"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_backup_dir_defaults_next_to_photo() {
        let cfg = Config::default();
        assert_eq!(
            cfg.backup_dir_for(Path::new("site/img/me.jpg")),
            PathBuf::from("site/img/originals")
        );
        assert_eq!(
            cfg.backup_dir_for(Path::new("me.jpg")),
            PathBuf::from("originals")
        );

        let cfg = Config {
            backup_dir: Some(PathBuf::from("/var/backups")),
            ..Config::default()
        };
        assert_eq!(
            cfg.backup_dir_for(Path::new("site/me.jpg")),
            PathBuf::from("/var/backups")
        );
    }

    #[test]
    fn test_crop_config_and_codec() {
        let cfg = Config {
            padding_factor: 3.0,
            min_side: 10,
            jpeg_quality: 0,
            ..Config::default()
        };
        assert_eq!(
            cfg.crop_config(),
            CropConfig {
                padding_factor: 3.0,
                min_side: 10
            }
        );
        assert!(cfg.codec().is_err());
    }
}
