//! Error types for the archive unpacker.

use thiserror::Error;

/// Failures that abort an unpack run. The scratch directory is already gone
/// by the time the caller sees one of these.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// The bytes are not a zip archive, or an entry is malformed.
    #[error("not a valid zip archive: {message}")]
    ArchiveFormat {
        /// What was wrong with the container.
        message: String,
    },

    /// Decompressed content went over the per-run budget.
    #[error("archive expands to more than {limit} bytes, aborting")]
    SizeLimitExceeded {
        /// The budget that was exceeded, in bytes.
        limit: u64,
    },

    /// No entry passed the allow-list.
    #[error("archive did not contain any statedump files")]
    EmptyArchive,

    /// Two entries normalized to the same file name.
    #[error("archive contains {name} more than once")]
    DuplicateEntry {
        /// The normalized file name.
        name: String,
    },

    /// The scratch directory is not representable as UTF-8.
    #[error("temporary directory {path} is not valid UTF-8")]
    NonUtf8TempDir {
        /// Lossy rendering of the path.
        path: String,
    },

    #[error("unpack I/O error: {0}")]
    Io(#[from] std::io::Error),
}
