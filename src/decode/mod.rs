//! HEIC decoding seam.
//!
//! The pipeline only talks to [`HeicDecoder`]; the container format itself is
//! never inspected here. `LibheifDecoder` is the real implementation and
//! needs the `heif` feature.

#[cfg(feature = "heif")]
mod libheif;

#[cfg(feature = "heif")]
pub use libheif::LibheifDecoder;

use image::DynamicImage;
use std::io::Read;

use crate::error::DecodeError;

/// Pixels and metadata pulled out of one HEIC file.
#[derive(Debug)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// EXIF payload in JPEG APP1 form (`Exif\0\0` + TIFF), if the file had one.
    /// It must describe `image` as returned: a decoder that rotates pixels
    /// resets the Orientation tag.
    pub exif: Option<Vec<u8>>,
}

/// Something that can turn a HEIC byte stream into pixels plus EXIF.
pub trait HeicDecoder {
    /// Short name for log lines.
    fn name(&self) -> &str;

    /// Decode the primary image read from `input`.
    fn decode(&self, input: &mut dyn Read) -> Result<DecodedImage, DecodeError>;
}
