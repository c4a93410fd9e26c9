use anyhow::{Context, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};

/// Copies `photo` into `dir` unless a backup of the same name is already
/// there, so the first original survives any number of re-runs.
///
/// The copy keeps the original's modification time. Returns the backup path
/// when a copy was made.
pub fn backup_once(photo: &Path, dir: &Path) -> Result<Option<PathBuf>> {
    let name = photo
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", photo.display()))?;
    let backup = dir.join(name);
    if backup.exists() {
        log::debug!("keeping existing backup {}", backup.display());
        return Ok(None);
    }

    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::copy(photo, &backup)
        .with_context(|| format!("copying {} to {}", photo.display(), backup.display()))?;

    let meta = std::fs::metadata(photo).with_context(|| format!("reading {}", photo.display()))?;
    filetime::set_file_mtime(&backup, FileTime::from_last_modification_time(&meta))
        .with_context(|| format!("setting mtime on {}", backup.display()))?;

    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("facesquare-backup-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_backup_is_made_once() -> Result<()> {
        let dir = scratch("once");
        let photo = dir.join("me.jpg");
        std::fs::write(&photo, b"original")?;
        let originals = dir.join("originals");

        let first = backup_once(&photo, &originals)?;
        assert_eq!(first, Some(originals.join("me.jpg")));
        assert_eq!(std::fs::read(originals.join("me.jpg"))?, b"original");

        std::fs::write(&photo, b"thumbnail")?;
        assert_eq!(backup_once(&photo, &originals)?, None);
        assert_eq!(std::fs::read(originals.join("me.jpg"))?, b"original");

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_backup_keeps_mtime() -> Result<()> {
        let dir = scratch("mtime");
        let photo = dir.join("me.jpg");
        std::fs::write(&photo, b"original")?;
        let then = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&photo, then)?;

        let backup = backup_once(&photo, &dir.join("originals"))?.unwrap();
        let meta = std::fs::metadata(&backup)?;
        assert_eq!(FileTime::from_last_modification_time(&meta), then);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_missing_photo_fails() {
        let dir = scratch("missing");
        let err = backup_once(&dir.join("nope.jpg"), &dir.join("originals")).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.jpg"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
