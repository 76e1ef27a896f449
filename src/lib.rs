//! # zipvfs
//!
//! A read-only virtual filesystem over ZIP archives.
//!
//! This library mounts a ZIP archive — on local disk or on a remote HTTP
//! server — and presents its contents as a hierarchical read-only
//! filesystem: existence and directory tests, enumeration, modification
//! times, UNIX symlink chasing, and streaming file handles with seek
//! support and transparent DEFLATE decompression.
//!
//! ## Features
//!
//! - Central-directory indexing with O(log n) lookups; local headers are
//!   validated lazily on first open
//! - Tolerates archive comments and self-extracting prefixes
//! - Follows symlink entries stored by UNIX archivers, with loop detection
//! - Random access into DEFLATE members (backward seeks re-decode)
//! - Remote archives over HTTP Range requests
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipvfs::{HttpSource, ZipArchive};
//!
//! #[tokio::main]
//! async fn main() -> zipvfs::Result<()> {
//!     let source = Arc::new(HttpSource::open("https://example.com/data.zip".to_string()).await?);
//!     let mut archive = ZipArchive::open(source, "data.zip").await?;
//!
//!     for name in archive.enumerate("", false) {
//!         println!("{name}");
//!     }
//!
//!     let mut file = archive.open_read("README.md").await?;
//!     file.seek(100).await?;
//!     let mut buf = [0u8; 64];
//!     let n = file.read(&mut buf).await?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{ByteSource, FileSource, HttpSource};
pub use zip::{CompressionMethod, EntryInfo, ZipArchive, ZipFile, is_archive};
