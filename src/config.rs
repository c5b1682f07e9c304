use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// File name of the settings file looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "mass-heic2jpeg.json";

/// Top-level configuration for a conversion run.
///
/// Every field has a default, so a settings file only needs the keys it
/// wants to change.
///
/// ```rust
/// use mass_heic2jpeg::config::Config;
///
/// let mut config = Config::default();
/// config.jpeg.quality = 90;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where converted files and archived originals go.
    pub output: OutputConfig,
    /// JPEG encoder settings.
    pub jpeg: JpegConfig,
    /// Log a progress line after this many files.
    pub progress_interval: usize,
    /// If `true`, only log what would be converted.
    pub dry_run: bool,
}

/// Output directory layout, relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Subdirectory that receives the original HEIC files.
    pub archive_dir: String,
    /// Subdirectory that receives the converted JPEG files.
    pub jpeg_dir: String,
    /// Unix permission bits for newly created output directories.
    pub dir_mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegConfig {
    /// Encoder quality, 1 to 100.
    pub quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            jpeg: JpegConfig::default(),
            progress_interval: 100,
            dry_run: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_dir: "heic".to_string(),
            jpeg_dir: "jpg".to_string(),
            dir_mode: 0o755,
        }
    }
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self { quality: 75 }
    }
}

impl Config {
    /// Default settings file path: next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from the given path, or from the default location.
    ///
    /// An explicitly given path must exist. A missing file at the default
    /// location just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    log::debug!(
                        "No config file at {}. Using defaults.",
                        default_path.display()
                    );
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let contents = std::fs::read_to_string(&config_path).with_context(|| {
            format!("Failed to read config file {}", config_path.display())
        })?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        log::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg.quality) {
            anyhow::bail!("JPEG quality must be between 1 and 100, got {}", self.jpeg.quality);
        }
        if self.progress_interval == 0 {
            anyhow::bail!("progress_interval must be at least 1");
        }
        for (key, dir) in [
            ("archive_dir", &self.output.archive_dir),
            ("jpeg_dir", &self.output.jpeg_dir),
        ] {
            let mut parts = Path::new(dir).components();
            if !matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None)) {
                anyhow::bail!("output.{key} must be a single directory name, got {dir:?}");
            }
        }
        if self.output.archive_dir == self.output.jpeg_dir {
            anyhow::bail!("output.archive_dir and output.jpeg_dir must differ");
        }
        Ok(())
    }
}
