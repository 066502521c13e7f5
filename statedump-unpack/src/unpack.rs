use crate::error::UnpackError;
use crate::filter::{is_allowed_name, normalize_entry_name};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io::{self, Cursor, Read, Write};
use tempfile::TempDir;
use tracing::{debug, info};
use zip::ZipArchive;

/// Maximum total uncompressed size accepted from one archive (100 MB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 100_000_000;

const LOCAL_FILE_HEADER: &[u8] = b"PK\x03\x04";
const END_OF_CENTRAL_DIRECTORY: &[u8] = b"PK\x05\x06";

#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Budget for decompressed bytes across all accepted entries.
    pub max_total_bytes: u64,
    /// Parent for the scratch directory; the system temp dir when `None`.
    pub temp_root: Option<Utf8PathBuf>,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            temp_root: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAllowed,
    Empty,
}

/// An entry that was dropped by the filter. Not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredEntry {
    /// The entry name as stored in the archive.
    pub name: String,
    pub reason: IgnoreReason,
}

/// Scratch directory holding the accepted files of one run.
///
/// Owns the directory: dropping this value deletes it, whichever way the
/// consuming operation exits.
#[derive(Debug)]
pub struct UnpackedDir {
    dir: TempDir,
    root: Utf8PathBuf,
    accepted: Vec<String>,
    ignored: Vec<IgnoredEntry>,
}

impl UnpackedDir {
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Accepted file names, in archive order.
    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn ignored(&self) -> &[IgnoredEntry] {
        &self.ignored
    }

    /// Remove the directory now and report failures instead of swallowing
    /// them in `Drop`.
    pub fn close(self) -> io::Result<()> {
        debug!(dir = %self.root, "removing unpack directory");
        self.dir.close()
    }
}

/// True when `bytes` starts like a zip archive (local file header or an
/// empty archive's end record).
pub fn is_zip_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(LOCAL_FILE_HEADER) || bytes.starts_with(END_OF_CENTRAL_DIRECTORY)
}

/// Unpack a statedump archive into a fresh scratch directory.
///
/// # Errors
///
/// - [`UnpackError::ArchiveFormat`] before any extraction when the bytes are
///   not a zip archive, or later when an entry is malformed.
/// - [`UnpackError::SizeLimitExceeded`] as soon as decompressed content would
///   go over `opts.max_total_bytes`; nothing is truncated.
/// - [`UnpackError::EmptyArchive`] when no entry passes the allow-list.
/// - [`UnpackError::DuplicateEntry`] when two entries share a final segment.
pub fn unpack(bytes: &[u8], opts: &UnpackOptions) -> Result<UnpackedDir, UnpackError> {
    if !is_zip_archive(bytes) {
        return Err(UnpackError::ArchiveFormat {
            message: "missing zip file header".to_string(),
        });
    }
    if bytes.starts_with(END_OF_CENTRAL_DIRECTORY) {
        return Err(UnpackError::EmptyArchive);
    }

    let dir = create_scratch_dir(opts)?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|p| {
        UnpackError::NonUtf8TempDir {
            path: p.display().to_string(),
        }
    })?;
    info!(bytes = bytes.len(), dir = %root, "unpacking statedump archive");

    // Sizes come from the central directory, so entries written with a
    // trailing data descriptor are read like any other. Entries are still
    // decompressed one at a time against the shared budget.
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_format)?;
    let mut remaining = opts.max_total_bytes;
    let mut accepted = Vec::new();
    let mut ignored = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_format)?;

        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let name = normalize_entry_name(&raw_name).to_string();
        if !is_allowed_name(&name) {
            debug!(entry = %raw_name, "ignoring archive entry");
            ignored.push(IgnoredEntry {
                name: raw_name,
                reason: IgnoreReason::NotAllowed,
            });
            continue;
        }

        debug!(entry = %raw_name, file = %name, "extracting archive entry");
        let dest = root.join(&name);
        let mut out = create_exclusive(&dest, &name)?;
        let copied = copy_with_limit(&mut entry, &mut out, remaining, opts.max_total_bytes)?;
        out.flush()?;
        drop(out);

        if copied == 0 {
            debug!(entry = %raw_name, "ignoring empty archive entry");
            fs::remove_file(&dest)?;
            ignored.push(IgnoredEntry {
                name: raw_name,
                reason: IgnoreReason::Empty,
            });
            continue;
        }

        remaining -= copied;
        accepted.push(name);
    }

    if accepted.is_empty() {
        return Err(UnpackError::EmptyArchive);
    }

    info!(
        accepted = accepted.len(),
        ignored = ignored.len(),
        "statedump archive unpacked"
    );
    Ok(UnpackedDir {
        dir,
        root,
        accepted,
        ignored,
    })
}

fn archive_format(err: zip::result::ZipError) -> UnpackError {
    UnpackError::ArchiveFormat {
        message: err.to_string(),
    }
}

fn create_scratch_dir(opts: &UnpackOptions) -> Result<TempDir, UnpackError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("statedump-");
    let dir = match &opts.temp_root {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Create `path` only if nothing exists there yet, so a later entry can never
/// overwrite an earlier one or write through a pre-existing special file.
fn create_exclusive(path: &Utf8Path, name: &str) -> Result<fs::File, UnpackError> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => UnpackError::DuplicateEntry {
                name: name.to_string(),
            },
            _ => UnpackError::Io(err),
        })
}

/// Copy at most `remaining` bytes; reading one byte past it fails the run.
fn copy_with_limit(
    src: &mut impl Read,
    dst: &mut impl Write,
    remaining: u64,
    limit: u64,
) -> Result<u64, UnpackError> {
    let mut bounded = src.by_ref().take(remaining.saturating_add(1));
    let copied = io::copy(&mut bounded, dst).map_err(|err| match err.kind() {
        io::ErrorKind::InvalidData => UnpackError::ArchiveFormat {
            message: err.to_string(),
        },
        _ => UnpackError::Io(err),
    })?;
    if copied > remaining {
        return Err(UnpackError::SizeLimitExceeded { limit });
    }
    Ok(copied)
}
