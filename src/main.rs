use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facesquare::{
    config, process, FaceDetector, FaceSquareCropper, NoFaces, Pipeline, YunetDetector,
};
use log::info;

#[derive(Parser)]
#[command(name = "facesquare")]
#[command(version, about = "Square, face-centered profile thumbnails")]
struct Cli {
    /// Config file (defaults to the built-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop photos in place to square thumbnails around the largest face
    Crop {
        /// Photos to process (defaults to `targets` from the config)
        files: Vec<PathBuf>,
        /// Compute the crops but write nothing
        #[arg(long)]
        dry_run: bool,
        /// Print the dry-run plan as JSON
        #[arg(long, requires = "dry_run")]
        json: bool,
        /// Skip face detection and always use the centered crop
        #[arg(long)]
        no_detect: bool,
    },
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Crop {
            files,
            dry_run,
            json,
            no_detect,
        } => {
            let cfg = config::load_config(config_path)?;
            crop(&cfg, files, dry_run, json, no_detect)
        }
        Commands::Init { force } => init(config_path, force),
        Commands::Config => open_config(config_path),
    }
}

fn build_detector(cfg: &config::Config, no_detect: bool) -> Result<Box<dyn FaceDetector>> {
    if no_detect {
        info!("Face detection disabled, using centered crops");
        return Ok(Box::new(NoFaces));
    }
    let d = &cfg.detector;
    let detector = YunetDetector::from_file(&d.model)
        .context("Failed to initialize face detector")?
        .with_thresholds(d.score_threshold, d.nms_threshold)
        .with_min_face_size(d.min_face_size);
    Ok(Box::new(detector))
}

fn crop(
    cfg: &config::Config,
    files: Vec<PathBuf>,
    dry_run: bool,
    json: bool,
    no_detect: bool,
) -> Result<()> {
    let targets = if files.is_empty() {
        cfg.targets.clone()
    } else {
        files
    };
    if targets.is_empty() {
        anyhow::bail!("No photos given and no `targets` configured");
    }

    let cropper = FaceSquareCropper::new(cfg.crop_config()).context("Invalid crop settings")?;
    let codec = cfg.codec()?;
    let mut pipeline = Pipeline::new(build_detector(cfg, no_detect)?, cropper)
        .with_target_size(cfg.target_size)
        .with_equalize(cfg.detector.equalize);

    if dry_run {
        let mut reports = Vec::with_capacity(targets.len());
        for path in &targets {
            let plan = process::plan_one(path, &mut pipeline, &codec)?;
            reports.push(process::PlanReport::new(path, &plan));
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            for r in &reports {
                info!(
                    "{}: {}x{}, {} face(s), crop {}px at ({}, {})",
                    r.path.display(),
                    r.width,
                    r.height,
                    r.faces_found,
                    r.crop[2],
                    r.crop[0],
                    r.crop[1]
                );
            }
        }
        return Ok(());
    }

    for path in &targets {
        let outcome = process::process_one(path, &mut pipeline, &codec, &cfg.backup_dir_for(path))?;
        info!(
            "Processed {} -> {}x{}",
            path.display(),
            outcome.size,
            outcome.size
        );
    }

    Ok(())
}

fn init(path: Option<&Path>, force: bool) -> Result<()> {
    let target = path.unwrap_or(&config::CONFIG_PATH);
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }
    config::save_config(&config::Config::default(), Some(target))?;
    info!("Wrote {}", target.display());
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH).as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
