use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::Config;
use crate::decode::HeicDecoder;
use crate::error::ConvertError;
use crate::exif::write_jpeg_with_exif;
use crate::relocate::move_file;
use crate::workdir;

const HEIC_MARKER: &str = ".heic";

/// Outcome of converting and archiving one HEIC file.
///
/// `error` holds the first failure; `converted` without `archived` means
/// the JPEG exists but the original is still in the working directory.
#[derive(Debug)]
pub struct ProcessResult {
    pub source: PathBuf,
    pub jpeg_path: PathBuf,
    pub archive_path: PathBuf,
    pub converted: bool,
    pub archived: bool,
    pub error: Option<String>,
}

/// Totals for one run over a directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub converted: usize,
    pub archived: usize,
    pub failed: usize,
}

/// Names of the HEIC files directly inside `dir`, in directory order.
///
/// Any non-directory entry whose lower-cased name contains `.heic` counts,
/// so `photo.heic.bak` is picked up too. Subdirectories are not entered.
/// Names are returned as the file system has them, UTF-8 or not.
pub fn collect_heic_files(dir: &Path) -> Result<Vec<OsString>> {
    let mut names = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().to_lowercase().contains(HEIC_MARKER) {
            names.push(name.to_os_string());
        }
    }

    Ok(names)
}

/// Output file name for a HEIC file name.
///
/// Lower-cased, with a trailing `.heic` swapped for `.jpg`. Names that only
/// contain `.heic` somewhere in the middle keep it and get `.jpg` appended.
/// Names that are not valid UTF-8 only have their ASCII letters lower-cased.
pub fn jpeg_file_name(heic_name: &OsStr) -> OsString {
    match heic_name.to_str() {
        Some(name) => {
            let lower = name.to_lowercase();
            match lower.strip_suffix(HEIC_MARKER) {
                Some(stem) => format!("{stem}.jpg").into(),
                None => format!("{lower}.jpg").into(),
            }
        }
        None => raw_jpeg_file_name(heic_name),
    }
}

#[cfg(unix)]
fn raw_jpeg_file_name(heic_name: &OsStr) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let mut lower = heic_name.as_bytes().to_ascii_lowercase();
    if lower.ends_with(HEIC_MARKER.as_bytes()) {
        lower.truncate(lower.len() - HEIC_MARKER.len());
    }
    lower.extend_from_slice(b".jpg");
    OsString::from_vec(lower)
}

#[cfg(not(unix))]
fn raw_jpeg_file_name(heic_name: &OsStr) -> OsString {
    let lossy = heic_name.to_string_lossy();
    jpeg_file_name(OsStr::new(&*lossy))
}

/// Periodic progress line: `<timestamp> <n> files processed. <m> left`.
pub fn progress_line(timestamp: impl Display, processed: usize, left: usize) -> String {
    format!("{timestamp} {processed} files processed. {left} left")
}

/// Decode `input` and write it to `output` as a JPEG carrying the source EXIF.
///
/// A failed encode leaves whatever was already written at `output`.
pub fn convert_heic_to_jpeg(
    input: &Path,
    output: &Path,
    decoder: &dyn HeicDecoder,
    quality: u8,
) -> Result<(), ConvertError> {
    let decoded = {
        let mut file = File::open(input).map_err(|source| ConvertError::Open {
            path: input.to_path_buf(),
            source,
        })?;
        decoder
            .decode(&mut file)
            .map_err(|source| ConvertError::Decode {
                path: input.to_path_buf(),
                source,
            })?
    };

    let file = File::create(output).map_err(|source| ConvertError::CreateOutput {
        path: output.to_path_buf(),
        source,
    })?;
    write_jpeg_with_exif(
        BufWriter::new(file),
        &decoded.image,
        decoded.exif.as_deref(),
        quality,
    )
}

/// Convert one HEIC file, then move the original into the archive directory.
///
/// The original is only moved if the conversion succeeded.
pub fn process_file(
    dir: &Path,
    name: &OsStr,
    decoder: &dyn HeicDecoder,
    config: &Config,
) -> ProcessResult {
    let (archive_dir, jpeg_dir) = workdir::output_dirs(dir, &config.output);
    let mut result = ProcessResult {
        source: dir.join(name),
        jpeg_path: jpeg_dir.join(jpeg_file_name(name)),
        archive_path: archive_dir.join(name),
        converted: false,
        archived: false,
        error: None,
    };

    if let Err(e) = convert_heic_to_jpeg(
        &result.source,
        &result.jpeg_path,
        decoder,
        config.jpeg.quality,
    ) {
        result.error = Some(e.to_string());
        return result;
    }
    result.converted = true;

    match move_file(&result.source, &result.archive_path) {
        Ok(_) => result.archived = true,
        Err(e) => result.error = Some(e.to_string()),
    }

    result
}

/// Convert every HEIC file in `dir`, archiving originals as it goes.
///
/// Listing `dir` or creating the output directories are the only fatal
/// failures; a file that fails is logged and skipped.
pub fn run(dir: &Path, decoder: &dyn HeicDecoder, config: &Config) -> Result<RunSummary> {
    let files = collect_heic_files(dir)?;
    let total = files.len();
    let mut summary = RunSummary {
        found: total,
        ..RunSummary::default()
    };

    if files.is_empty() {
        log::info!("No HEIC files found in {}", dir.display());
        return Ok(summary);
    }
    log::info!("{total} HEIC file(s) found in {}", dir.display());

    if config.dry_run {
        log::info!("DRY RUN: no files will be modified");
        let (archive_dir, jpeg_dir) = workdir::output_dirs(dir, &config.output);
        for name in &files {
            log::info!(
                "  {} -> {} (original to {})",
                Path::new(name).display(),
                jpeg_dir.join(jpeg_file_name(name)).display(),
                archive_dir.join(name).display()
            );
        }
        return Ok(summary);
    }

    workdir::ensure_output_dirs(dir, &config.output)?;
    log::debug!("Decoding with {}", decoder.name());

    let started = Instant::now();
    let mut batch = 0;

    for (i, name) in files.iter().enumerate() {
        log::debug!(
            "[{}/{}] Processing: {}",
            i + 1,
            total,
            Path::new(name).display()
        );
        let result = process_file(dir, name, decoder, config);

        if result.converted {
            summary.converted += 1;
        }
        if result.archived {
            summary.archived += 1;
        }
        if let Some(ref err) = result.error {
            summary.failed += 1;
            if result.converted {
                log::error!(
                    "Archiving {} to {} failed: {err}",
                    result.source.display(),
                    result.archive_path.display()
                );
            } else {
                log::error!(
                    "Converting {} to {} failed: {err}",
                    result.source.display(),
                    result.jpeg_path.display()
                );
            }
        }

        batch += 1;
        if batch == config.progress_interval {
            log::info!(
                "{}",
                progress_line(
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    batch,
                    total - (i + 1)
                )
            );
            log::debug!("{:.1?} elapsed", started.elapsed());
            batch = 0;
        }
    }

    log::info!(
        "Done: {} converted, {} archived, {} failed out of {total} files",
        summary.converted,
        summary.archived,
        summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedImage;
    use crate::error::DecodeError;
    use image::{DynamicImage, Rgb, RgbImage};
    use img_parts::jpeg::Jpeg;
    use img_parts::{Bytes, ImageEXIF};
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    const FAKE_MAGIC: &[u8] = b"FAKEHEIC";

    /// Stand-in decoder for a toy container:
    /// magic, width byte, height byte, then the EXIF payload (if any).
    struct FakeDecoder;

    impl HeicDecoder for FakeDecoder {
        fn name(&self) -> &str {
            "fake"
        }

        fn decode(&self, input: &mut dyn Read) -> Result<DecodedImage, DecodeError> {
            let mut bytes = Vec::new();
            input.read_to_end(&mut bytes)?;
            let rest = bytes
                .strip_prefix(FAKE_MAGIC)
                .ok_or_else(|| DecodeError::Malformed {
                    message: "bad magic".to_string(),
                })?;
            let [w, h, exif @ ..] = rest else {
                return Err(DecodeError::Malformed {
                    message: "truncated header".to_string(),
                });
            };
            let image = RgbImage::from_pixel(u32::from(*w), u32::from(*h), Rgb([200, 100, 50]));
            Ok(DecodedImage {
                image: DynamicImage::ImageRgb8(image),
                exif: (!exif.is_empty()).then(|| exif.to_vec()),
            })
        }
    }

    fn fake_heic(exif: &[u8]) -> Vec<u8> {
        let mut bytes = FAKE_MAGIC.to_vec();
        bytes.extend_from_slice(&[8, 8]);
        bytes.extend_from_slice(exif);
        bytes
    }

    fn exif_payload(tag: &[u8]) -> Vec<u8> {
        let mut payload = b"Exif\0\0MM\x00\x2A\x00\x00\x00\x08".to_vec();
        payload.extend_from_slice(tag);
        payload
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort();
        v
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        sorted(
            fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
        )
    }

    // ── collect_heic_files ───────────────────────────────────────────

    #[test]
    fn collects_loose_case_insensitive_matches() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.HEIC"), b"x").unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("c.heic.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("d.heic"), b"x").unwrap();

        let files = collect_heic_files(dir.path()).unwrap();
        assert_eq!(sorted(files), vec!["a.HEIC", "c.heic.txt"]);
    }

    #[test]
    fn directories_named_heic_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("heic")).unwrap();
        fs::create_dir(dir.path().join("trip.heic")).unwrap();
        assert!(collect_heic_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn empty_dir_collects_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(collect_heic_files(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_name_is_converted_and_archived() {
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let name = OsStr::from_bytes(b"caf\xE9.heic");
        fs::write(dir.path().join(name), fake_heic(&[])).unwrap();

        let files = collect_heic_files(dir.path()).unwrap();
        assert_eq!(files, vec![name.to_os_string()]);
        assert!(dir.path().join(&files[0]).exists());

        let summary = run(dir.path(), &FakeDecoder, &Config::default()).unwrap();
        assert_eq!(summary.archived, 1);
        assert!(dir.path().join("heic").join(name).exists());
        assert!(dir.path().join("jpg").join(OsStr::from_bytes(b"caf\xE9.jpg")).exists());
        assert!(!dir.path().join(name).exists());
    }

    #[test]
    fn unreadable_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(collect_heic_files(&dir.path().join("gone")).is_err());
    }

    // ── jpeg_file_name ───────────────────────────────────────────────

    fn jpeg_name(name: &str) -> OsString {
        jpeg_file_name(OsStr::new(name))
    }

    #[test]
    fn jpeg_name_lowercases_and_swaps_suffix() {
        assert_eq!(jpeg_name("IMG_0001.HEIC"), "img_0001.jpg");
        assert_eq!(jpeg_name("photo.heic"), "photo.jpg");
        assert_eq!(jpeg_name("Photo.HeIc"), "photo.jpg");
    }

    #[test]
    fn jpeg_name_keeps_inner_marker() {
        assert_eq!(jpeg_name("c.heic.txt"), "c.heic.txt.jpg");
        assert_eq!(jpeg_name("my.heic.photos.HEIC"), "my.heic.photos.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn jpeg_name_keeps_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"CAF\xE9.HEIC");
        assert_eq!(
            jpeg_file_name(name).as_os_str(),
            OsStr::from_bytes(b"caf\xE9.jpg")
        );
    }

    // ── progress_line ────────────────────────────────────────────────

    #[test]
    fn progress_line_wording() {
        assert_eq!(
            progress_line("2024-05-01 10:00:00", 100, 250),
            "2024-05-01 10:00:00 100 files processed. 250 left"
        );
    }

    // ── process_file ─────────────────────────────────────────────────

    #[test]
    fn process_file_converts_and_archives() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        workdir::ensure_output_dirs(dir.path(), &config.output).unwrap();

        let exif = exif_payload(b"\x00\x00");
        let original = fake_heic(&exif);
        fs::write(dir.path().join("IMG_0001.HEIC"), &original).unwrap();

        let result = process_file(dir.path(), OsStr::new("IMG_0001.HEIC"), &FakeDecoder, &config);
        assert!(result.error.is_none(), "{:?}", result.error);
        assert!(result.converted && result.archived);
        assert_eq!(result.jpeg_path, dir.path().join("jpg").join("img_0001.jpg"));

        assert!(!result.source.exists());
        assert_eq!(fs::read(&result.archive_path).unwrap(), original);

        let jpeg_bytes = fs::read(&result.jpeg_path).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::from(jpeg_bytes)).unwrap();
        assert_eq!(&jpeg.exif().unwrap()[..], &exif[6..]);
    }

    #[test]
    fn process_file_without_exif() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        workdir::ensure_output_dirs(dir.path(), &config.output).unwrap();
        fs::write(dir.path().join("plain.heic"), fake_heic(&[])).unwrap();

        let result = process_file(dir.path(), OsStr::new("plain.heic"), &FakeDecoder, &config);
        assert!(result.archived);
        let out = fs::read(&result.jpeg_path).unwrap();
        assert_ne!(&out[2..4], &[0xFF, 0xE1]);
    }

    #[test]
    fn decode_failure_leaves_original_in_place() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        workdir::ensure_output_dirs(dir.path(), &config.output).unwrap();
        fs::write(dir.path().join("broken.heic"), b"junk").unwrap();

        let result = process_file(dir.path(), OsStr::new("broken.heic"), &FakeDecoder, &config);
        assert!(!result.converted && !result.archived);
        assert!(result.error.unwrap().contains("broken.heic"));
        assert!(result.source.exists());
        assert!(!result.jpeg_path.exists());
        assert!(!result.archive_path.exists());
    }

    #[test]
    fn missing_output_dir_is_a_per_file_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.heic"), fake_heic(&[])).unwrap();

        let result = process_file(dir.path(), OsStr::new("a.heic"), &FakeDecoder, &Config::default());
        assert!(!result.converted);
        assert!(result.error.unwrap().starts_with("Couldn't create"));
        assert!(result.source.exists());
    }

    #[test]
    fn archive_failure_keeps_jpeg_and_original() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        // only the jpeg dir exists, so the move has nowhere to go
        fs::create_dir(dir.path().join("jpg")).unwrap();
        fs::write(dir.path().join("a.heic"), fake_heic(&[])).unwrap();

        let result = process_file(dir.path(), OsStr::new("a.heic"), &FakeDecoder, &config);
        assert!(result.converted && !result.archived);
        assert!(result.error.unwrap().starts_with("Couldn't open dest file"));
        assert!(result.jpeg_path.exists());
        assert!(result.source.exists());
    }

    // ── run ──────────────────────────────────────────────────────────

    #[test]
    fn run_converts_good_files_and_skips_corrupt_one() {
        let dir = TempDir::new().unwrap();
        for name in ["one.heic", "TWO.HEIC", "three.heic"] {
            fs::write(dir.path().join(name), fake_heic(&exif_payload(b"\x00\x00"))).unwrap();
        }
        fs::write(dir.path().join("corrupt.heic"), b"not a heic").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let summary = run(dir.path(), &FakeDecoder, &Config::default()).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                found: 4,
                converted: 3,
                archived: 3,
                failed: 1,
            }
        );

        assert_eq!(
            dir_names(&dir.path().join("jpg")),
            vec!["one.jpg", "three.jpg", "two.jpg"]
        );
        assert_eq!(
            dir_names(&dir.path().join("heic")),
            vec!["TWO.HEIC", "one.heic", "three.heic"]
        );
        assert_eq!(
            dir_names(dir.path()),
            vec!["corrupt.heic", "heic", "jpg", "notes.txt"]
        );
        assert_eq!(fs::read(dir.path().join("corrupt.heic")).unwrap(), b"not a heic");
    }

    #[test]
    fn run_on_empty_dir_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let summary = run(dir.path(), &FakeDecoder, &Config::default()).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(dir_names(dir.path()).is_empty());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.heic"), fake_heic(&[])).unwrap();
        let config = Config {
            dry_run: true,
            ..Config::default()
        };

        let summary = run(dir.path(), &FakeDecoder, &config).unwrap();
        assert_eq!(summary.found, 1);
        assert_eq!(summary.converted, 0);
        assert_eq!(dir_names(dir.path()), vec!["a.heic"]);
    }

    #[test]
    fn run_honors_custom_dirs_and_small_progress_interval() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("p{i}.heic")), fake_heic(&[])).unwrap();
        }
        let mut config = Config::default();
        config.output.archive_dir = "originals".to_string();
        config.output.jpeg_dir = "converted".to_string();
        config.progress_interval = 2;

        let summary = run(dir.path(), &FakeDecoder, &config).unwrap();
        assert_eq!(summary.archived, 5);
        assert_eq!(dir_names(&dir.path().join("converted")).len(), 5);
        assert_eq!(dir_names(&dir.path().join("originals")).len(), 5);
    }

    #[test]
    fn run_on_missing_dir_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(run(&dir.path().join("gone"), &FakeDecoder, &Config::default()).is_err());
    }
}
