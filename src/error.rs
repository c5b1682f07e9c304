use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while decoding a HEIC container.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read HEIC data: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed or unsupported HEIC container: {message}")]
    Malformed { message: String },

    #[error("HEIC image has no interleaved pixel plane")]
    MissingPixels,
}

/// Failure while converting one HEIC file to JPEG.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Couldn't open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Couldn't decode {}: {source}", path.display())]
    Decode { path: PathBuf, source: DecodeError },

    #[error("Couldn't create {}: {source}", path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("EXIF payload of {len} bytes does not fit in a single APP1 segment")]
    ExifTooLarge { len: usize },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Writing JPEG output failed: {0}")]
    Write(#[from] io::Error),
}

/// Failure while moving a processed original into the archive directory.
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("Couldn't open source file: {0}")]
    OpenSource(#[source] io::Error),

    #[error("Couldn't open dest file: {0}")]
    CreateDest(#[source] io::Error),

    #[error("Writing to output file failed: {0}")]
    Copy(#[source] io::Error),

    #[error("Failed removing original file: {0}")]
    RemoveSource(#[source] io::Error),
}
