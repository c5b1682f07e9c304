use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use std::io::{self, Write};

use crate::error::ConvertError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: [u8; 2] = [0xFF, 0xE1];

/// Largest payload an APP1 segment can carry (the length field counts itself).
pub const MAX_APP1_PAYLOAD: usize = u16::MAX as usize - 2;

/// A writer that drops the first `remaining` bytes it is given and passes
/// everything after that straight through.
///
/// Used to swallow the JPEG encoder's own SOI marker once ours is already
/// in the output stream.
#[derive(Debug)]
pub struct SkipWriter<W> {
    inner: W,
    remaining: usize,
}

impl<W: Write> SkipWriter<W> {
    pub fn new(inner: W, skip: usize) -> Self {
        Self {
            inner,
            remaining: skip,
        }
    }

    /// Bytes still to be discarded.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for SkipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return self.inner.write(buf);
        }

        if buf.len() <= self.remaining {
            self.remaining -= buf.len();
            return Ok(buf.len());
        }

        let skipped = self.remaining;
        let written = self.inner.write(&buf[skipped..])?;
        self.remaining = 0;
        Ok(skipped + written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Write SOI and, if there is a payload, an APP1 segment carrying it.
///
/// `exif` must already be in APP1 form (`Exif\0\0` followed by TIFF data).
/// Returns the writer the JPEG encoder should use for the rest of the stream.
pub fn begin_jpeg_with_exif<W: Write>(
    mut out: W,
    exif: Option<&[u8]>,
) -> Result<SkipWriter<W>, ConvertError> {
    let exif = exif.filter(|e| !e.is_empty());
    if let Some(payload) = exif {
        if payload.len() > MAX_APP1_PAYLOAD {
            return Err(ConvertError::ExifTooLarge { len: payload.len() });
        }
    }

    out.write_all(&SOI)?;

    if let Some(payload) = exif {
        let segment_len = (2 + payload.len()) as u16;
        out.write_all(&APP1)?;
        out.write_all(&segment_len.to_be_bytes())?;
        out.write_all(payload)?;
        log::debug!("  APP1 EXIF segment: {} bytes", payload.len());
    }

    Ok(SkipWriter::new(out, SOI.len()))
}

/// Encode `image` as JPEG into `out`, with `exif` spliced in as the first
/// segment after SOI.
///
/// Images with an alpha channel are flattened to RGB first, since baseline
/// JPEG has no alpha.
pub fn write_jpeg_with_exif<W: Write>(
    out: W,
    image: &DynamicImage,
    exif: Option<&[u8]>,
    quality: u8,
) -> Result<(), ConvertError> {
    let mut writer = begin_jpeg_with_exif(out, exif)?;

    let rgb = image.to_rgb8();
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;

    writer.flush()?;
    Ok(())
}
