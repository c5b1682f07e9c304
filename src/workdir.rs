use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;

/// Pick the directory to work in.
///
/// With no argument, or one that doesn't exist, this is the current working
/// directory. Only stat failures other than "not found" are errors.
pub fn resolve_working_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    resolve_against(requested, cwd)
}

fn resolve_against(requested: Option<&Path>, cwd: PathBuf) -> Result<PathBuf> {
    let Some(dir) = requested else {
        log::info!("No directory given. Working dir is set to {}", cwd.display());
        return Ok(cwd);
    };

    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(dir.to_path_buf()),
        Ok(_) => {
            log::warn!(
                "{} is not a directory. Working dir is set to {}",
                dir.display(),
                cwd.display()
            );
            Ok(cwd)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!(
                "Directory {} does not exist. Working dir is set to {}",
                dir.display(),
                cwd.display()
            );
            Ok(cwd)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", dir.display())),
    }
}

/// Paths of the archive and JPEG subdirectories under `dir`.
pub fn output_dirs(dir: &Path, output: &OutputConfig) -> (PathBuf, PathBuf) {
    (dir.join(&output.archive_dir), dir.join(&output.jpeg_dir))
}

/// Create the archive and JPEG subdirectories. Existing ones are left alone.
pub fn ensure_output_dirs(dir: &Path, output: &OutputConfig) -> Result<(PathBuf, PathBuf)> {
    let (archive, jpeg) = output_dirs(dir, output);
    create_dir_once(&archive, output.dir_mode)?;
    create_dir_once(&jpeg, output.dir_mode)?;
    Ok((archive, jpeg))
}

fn create_dir_once(path: &Path, mode: u32) -> Result<()> {
    if path.is_dir() {
        log::info!("Directory {} already exists", path.display());
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    log::debug!("Created {}", path.display());
    Ok(())
}
