use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use mass_heic2jpeg::config::Config;
#[cfg(feature = "heif")]
use mass_heic2jpeg::decode::LibheifDecoder;
use mass_heic2jpeg::pipeline::RunSummary;
use mass_heic2jpeg::workdir;

#[derive(Parser, Debug)]
#[command(
    name = "mass-heic2jpeg",
    version,
    about = "Convert every HEIC photo in a directory to JPEG, keeping EXIF, and archive the originals"
)]
struct Cli {
    /// Directory containing the HEIC files (default: current directory)
    #[arg(value_name = "DIRECTORY")]
    directory: Option<PathBuf>,

    /// Path to settings file (default: mass-heic2jpeg.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a default settings file and exit
    #[arg(long)]
    init: bool,

    /// JPEG quality, 1-100 (overrides the settings file)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// List what would be converted without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default settings written to {}", save_path.display());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(quality) = cli.quality {
        config.jpeg.quality = quality;
    }
    if cli.dry_run {
        config.dry_run = true;
    }

    let dir = workdir::resolve_working_dir(cli.directory.as_deref())?;
    log::info!("Process started. Working dir is set to {}", dir.display());

    convert_dir(&dir, &config)?;
    Ok(())
}

#[cfg(feature = "heif")]
fn convert_dir(dir: &Path, config: &Config) -> Result<RunSummary> {
    mass_heic2jpeg::pipeline::run(dir, &LibheifDecoder::new(), config)
}

#[cfg(not(feature = "heif"))]
fn convert_dir(dir: &Path, _config: &Config) -> Result<RunSummary> {
    anyhow::bail!(
        "Cannot convert {}: built without HEIC decoding, rebuild with `--features heif`",
        dir.display()
    )
}
