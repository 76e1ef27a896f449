//! Byte-source abstractions for reading archives from various backends.
//!
//! The archive layer never touches a file or socket directly; it consumes
//! the [`ByteSource`] trait, which provides:
//! - positioned reads at arbitrary offsets
//! - the total length of the underlying data
//!
//! Positioned reads (rather than a shared seek cursor) are what allow any
//! number of open files on the same archive to make progress independently:
//! each open file tracks its own compressed and uncompressed positions and
//! never contends on source state.
//!
//! ## Implementations
//!
//! - [`FileSource`]: local files, using `pread(2)` on Unix and a cloned
//!   handle elsewhere
//! - [`HttpSource`]: remote archives over HTTP Range requests, so a ZIP on
//!   a web server can be browsed without downloading it whole

mod http;
mod local;

pub use http::HttpSource;
pub use local::FileSource;

use crate::error::{Result, ZipError};
use async_trait::async_trait;

/// Random-access read interface over some backing store of bytes.
///
/// Implementations must be `Send + Sync`; a [`ZipArchive`](crate::ZipArchive)
/// and all files opened from it share one source behind an `Arc`.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes read, which may be short; zero means
    /// the offset is at or past the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total length of the source in bytes.
    fn len(&self) -> u64;
}

/// Fill `buf` completely from `offset`, looping over short reads.
///
/// # Errors
///
/// Fails with [`ZipError::Io`] (unexpected EOF) if the source ends before
/// the buffer is full, which for archive structures always indicates
/// truncation.
pub async fn read_exact_at<S: ByteSource + ?Sized>(
    source: &S,
    mut offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_at(offset, &mut buf[filled..]).await?;
        if n == 0 {
            return Err(ZipError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "byte source ended early",
            )));
        }
        filled += n;
        offset += n as u64;
    }
    Ok(())
}
