//! # mass-heic2jpeg
//!
//! Batch-convert the HEIC photos in a directory to JPEG, carrying each photo's
//! EXIF block over unchanged, and move the originals into an archive folder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "heif")]
//! # fn main() -> anyhow::Result<()> {
//! use mass_heic2jpeg::config::Config;
//! use mass_heic2jpeg::decode::LibheifDecoder;
//! use mass_heic2jpeg::{pipeline, workdir};
//!
//! let config = Config::default();
//! let dir = workdir::resolve_working_dir(Some("./photos".as_ref()))?;
//! let summary = pipeline::run(&dir, &LibheifDecoder::new(), &config)?;
//! println!("{} of {} converted", summary.converted, summary.found);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "heif"))]
//! # fn main() {}
//! ```
//!
//! Running it on `./photos` leaves:
//!
//! | Path | Contents |
//! |------|----------|
//! | `photos/jpg/` | converted JPEGs, lower-cased names |
//! | `photos/heic/` | the original HEIC files |
//! | `photos/` | anything that failed to convert |
//!
//! ## Modules
//!
//! - [`config`] — Settings file with defaults
//! - [`decode`] — HEIC decoder trait and the libheif implementation
//! - [`error`] — Per-file error kinds
//! - [`exif`] — APP1 payload handling and the EXIF-splicing JPEG writer
//! - [`pipeline`] — File discovery, per-file conversion, and the batch loop
//! - [`relocate`] — Copy-then-delete file move
//! - [`workdir`] — Working directory resolution and output folders

pub mod config;
pub mod decode;
pub mod error;
pub mod exif;
pub mod pipeline;
pub mod relocate;
pub mod workdir;
