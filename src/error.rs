//! Error types for zipvfs.
//!
//! Every fallible operation in the crate returns [`ZipError`], so callers
//! can distinguish "this is not a ZIP at all" from "the archive is damaged"
//! from "the entry you asked for does not exist" without string matching.

use thiserror::Error;

/// Result type for zipvfs operations.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Errors produced by archive parsing, lookup and streaming reads.
#[derive(Debug, Error)]
pub enum ZipError {
    /// No end-of-central-directory signature within the search bound.
    #[error("not a ZIP archive")]
    NotAnArchive,

    /// Structurally damaged archive data.
    #[error("corrupted archive: {0}")]
    Corrupted(&'static str),

    /// Well-formed but outside what this crate handles (multi-disk,
    /// ZIP64, comment-length mismatch).
    #[error("unsupported archive: {0}")]
    Unsupported(&'static str),

    /// Entry uses a compression method other than STORE or DEFLATE.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// No entry with the given name.
    #[error("no such file: {0}")]
    NotFound(String),

    /// The name exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Seek target beyond the end of the entry.
    #[error("position past end of file")]
    PastEof,

    /// A symbolic link chain returned to an entry already being resolved.
    #[error("symlink loop through: {0}")]
    SymlinkLoop(String),

    /// Any write-side operation; the archive is read-only.
    #[error("archive is read-only")]
    ReadOnly,

    /// Error from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DEFLATE stream failure reported by the codec.
    #[error("decompression error: {0}")]
    Codec(#[from] flate2::DecompressError),

    /// Transport failure while reading a remote archive.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
