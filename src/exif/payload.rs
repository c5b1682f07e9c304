//! Turn a HEIF `Exif` item into the payload a JPEG APP1 segment expects.
//!
//! A HEIF `Exif` item is a 4-byte big-endian offset followed by the data,
//! where the offset says how many bytes to skip to reach the TIFF header.
//! Apple writes offset 6 with an `Exif\0\0` prefix, other encoders use 0
//! and start the TIFF header right away. JPEG wants `Exif\0\0` + TIFF.
//!
//! libheif hands out pixels with the container's rotation and mirroring
//! already applied, so the Orientation tag copied along with them has to be
//! reset or viewers rotate the photo a second time.

pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Build the APP1 payload from a raw HEIF `Exif` item.
///
/// Returns `None` when the item is too short, its offset runs past the
/// end, or what it points at is not a TIFF header.
pub fn app1_payload_from_heif_item(item: &[u8]) -> Option<Vec<u8>> {
    let (offset, data) = item.split_first_chunk::<4>()?;
    let offset = u32::from_be_bytes(*offset) as usize;

    let tiff = data.get(offset..)?;
    if !is_tiff_header(tiff) {
        return None;
    }

    let mut payload = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    payload.extend_from_slice(EXIF_HEADER);
    payload.extend_from_slice(tiff);
    Some(payload)
}

fn is_tiff_header(data: &[u8]) -> bool {
    data.starts_with(b"II\x2A\x00") || data.starts_with(b"MM\x00\x2A")
}

const TAG_ORIENTATION: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;
const ORIENTATION_NORMAL: u16 = 1;
const IFD_ENTRY_LEN: usize = 12;

/// Set the IFD0 Orientation tag of an APP1 payload to 1 (top-left), in place.
///
/// Returns `true` if the tag was found and rewritten. Payloads without the
/// tag, or too damaged to walk, are left untouched.
pub fn reset_orientation(payload: &mut [u8]) -> bool {
    if !payload.starts_with(EXIF_HEADER) {
        return false;
    }
    let tiff = &mut payload[EXIF_HEADER.len()..];
    if !is_tiff_header(tiff) {
        return false;
    }
    let big_endian = tiff[0] == b'M';

    match orientation_value_offset(tiff, big_endian) {
        Some(at) => {
            let value = if big_endian {
                ORIENTATION_NORMAL.to_be_bytes()
            } else {
                ORIENTATION_NORMAL.to_le_bytes()
            };
            tiff[at..at + 2].copy_from_slice(&value);
            true
        }
        None => false,
    }
}

/// Offset inside `tiff` of the inline Orientation value in IFD0.
fn orientation_value_offset(tiff: &[u8], big_endian: bool) -> Option<usize> {
    let ifd0 = read_u32(tiff, 4, big_endian)? as usize;
    let count = read_u16(tiff, ifd0, big_endian)? as usize;

    for i in 0..count {
        let entry = ifd0 + 2 + i * IFD_ENTRY_LEN;
        if read_u16(tiff, entry, big_endian)? != TAG_ORIENTATION {
            continue;
        }
        if read_u16(tiff, entry + 2, big_endian)? != TYPE_SHORT {
            return None;
        }
        let at = entry + 8;
        tiff.get(at..at + 2)?;
        return Some(at);
    }
    None
}

fn read_u16(data: &[u8], at: usize, big_endian: bool) -> Option<u16> {
    let bytes: [u8; 2] = data.get(at..at + 2)?.try_into().ok()?;
    Some(if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    })
}

fn read_u32(data: &[u8], at: usize, big_endian: bool) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    })
}
