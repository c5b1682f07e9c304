use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::MoveError;

/// Move `source` to `dest` by copying the bytes and then deleting `source`.
///
/// Works across filesystems where `rename` cannot. The source is only
/// removed after the copy has fully succeeded; a failed copy leaves it in
/// place next to a partial destination.
pub fn move_file(source: &Path, dest: &Path) -> Result<u64, MoveError> {
    let input = File::open(source).map_err(MoveError::OpenSource)?;
    let output = File::create(dest).map_err(MoveError::CreateDest)?;
    let copied = copy_then_remove(input, output, source)?;
    log::debug!("  Moved {} -> {} ({copied} bytes)", source.display(), dest.display());
    Ok(copied)
}

/// Stream `input` into `output`, close both, then remove `source`.
fn copy_then_remove<W: Write>(
    mut input: File,
    mut output: W,
    source: &Path,
) -> Result<u64, MoveError> {
    let copied = io::copy(&mut input, &mut output).map_err(MoveError::Copy)?;
    output.flush().map_err(MoveError::Copy)?;
    drop(input);
    drop(output);

    std::fs::remove_file(source).map_err(MoveError::RemoveSource)?;
    Ok(copied)
}
