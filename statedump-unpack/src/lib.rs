//! Archive unpacker for statedump bundles.
//!
//! Turns raw, untrusted zip bytes into a freshly created directory holding
//! only allow-listed object files:
//! - entries are streamed one at a time from the local headers;
//! - every entry name is reduced to its final path segment;
//! - one decompressed-byte budget is shared by the whole run;
//! - the directory is removed when the returned [`UnpackedDir`] drops.

mod error;
mod filter;
mod unpack;

pub use error::UnpackError;
pub use filter::{REPLACEMENTS_FILE, is_allowed_name, normalize_entry_name};
pub use unpack::{
    DEFAULT_MAX_TOTAL_BYTES, IgnoreReason, IgnoredEntry, UnpackOptions, UnpackedDir,
    is_zip_archive, unpack,
};
