use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, ItemId, LibHeif, RgbChroma};
use std::io::Read;

use super::{DecodedImage, HeicDecoder};
use crate::error::DecodeError;
use crate::exif::{app1_payload_from_heif_item, reset_orientation};

/// HEIC decoder backed by the system libheif.
pub struct LibheifDecoder {
    lib: LibHeif,
}

impl LibheifDecoder {
    pub fn new() -> Self {
        Self { lib: LibHeif::new() }
    }
}

impl Default for LibheifDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeicDecoder for LibheifDecoder {
    fn name(&self) -> &str {
        "libheif"
    }

    fn decode(&self, input: &mut dyn Read) -> Result<DecodedImage, DecodeError> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;

        let ctx = HeifContext::read_from_bytes(&bytes).map_err(malformed)?;
        let handle = ctx.primary_image_handle().map_err(malformed)?;

        let exif = extract_exif(&handle);

        let decoded = self
            .lib
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(malformed)?;
        let planes = decoded.planes();
        let plane = planes.interleaved.ok_or(DecodeError::MissingPixels)?;

        let (width, height) = (plane.width, plane.height);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            let row = row.get(..row_len).ok_or(DecodeError::MissingPixels)?;
            pixels.extend_from_slice(row);
        }

        let image = RgbImage::from_raw(width, height, pixels).ok_or(DecodeError::MissingPixels)?;
        Ok(DecodedImage {
            image: DynamicImage::ImageRgb8(image),
            exif,
        })
    }
}

/// First `Exif` metadata block of the image, normalized for APP1, with its
/// Orientation matching the already transformed pixels.
fn extract_exif(handle: &ImageHandle) -> Option<Vec<u8>> {
    let mut ids: Vec<ItemId> = vec![0; 1];
    if handle.metadata_block_ids(&mut ids, b"Exif") == 0 {
        log::debug!("  No EXIF block in HEIC");
        return None;
    }

    let item = match handle.metadata(ids[0]) {
        Ok(item) => item,
        Err(e) => {
            log::warn!("  Could not read EXIF block: {e}");
            return None;
        }
    };

    let Some(mut payload) = app1_payload_from_heif_item(&item) else {
        log::warn!("  EXIF block is malformed ({} bytes), dropping it", item.len());
        return None;
    };
    // decode() applies the container's rotation and mirroring to the pixels
    if reset_orientation(&mut payload) {
        log::debug!("  Orientation tag reset to top-left");
    }
    Some(payload)
}

fn malformed(e: libheif_rs::HeifError) -> DecodeError {
    DecodeError::Malformed {
        message: e.to_string(),
    }
}
