//! EXIF handling for the JPEG output.
//!
//! - [`app1_payload_from_heif_item`] — Normalize a HEIF `Exif` item into APP1 form
//! - [`reset_orientation`] — Mark the payload as describing upright pixels
//! - [`write_jpeg_with_exif`] — Encode a JPEG with that payload spliced in right after SOI
//!
//! Apart from the Orientation value the payload is copied verbatim.

mod payload;
mod writer;

pub use payload::{EXIF_HEADER, app1_payload_from_heif_item, reset_orientation};
pub use writer::{MAX_APP1_PAYLOAD, SkipWriter, begin_jpeg_with_exif, write_jpeg_with_exif};
