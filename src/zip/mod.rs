//! ZIP archive parsing and the read-only filesystem view.
//!
//! ## Architecture
//!
//! - [`structures`]: wire-format records, signatures, and field decoding
//! - [`parser`]: end-record location, validation, and index loading
//! - [`entry`]: in-memory member records and their resolution states
//! - [`path`]: symlink target normalization
//! - [`archive`]: the mounted archive — lookups, resolution, directory ops
//! - [`file`]: the streaming read handle for open members
//!
//! ## How an archive is read
//!
//! A ZIP file is read from the end: the end-of-central-directory record is
//! found by a bounded backward scan (archive comments and self-extracting
//! prefixes both tolerated), the central directory is read in one request
//! and indexed, and per-member local headers are validated lazily on first
//! open. Nothing before the central directory is touched until a member is
//! actually opened — which is what keeps HTTP-mounted archives cheap.
//!
//! ## Supported input
//!
//! Standard single-disk PKZIP archives, STORE and DEFLATE members, UNIX
//! symlink entries, arbitrary prefix data, comments up to 65,535 bytes.
//! ZIP64, multi-disk archives, encryption, and other compression methods
//! are rejected as unsupported.

mod archive;
mod entry;
mod file;
mod parser;
mod path;
mod structures;

pub use archive::{ZipArchive, is_archive};
pub use entry::EntryInfo;
pub use file::ZipFile;
pub use structures::CompressionMethod;
