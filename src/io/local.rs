//! Local-file byte source.

use super::ByteSource;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Byte source backed by a local file.
///
/// Reads use `pread(2)` on Unix (atomic positioned reads, no shared file
/// position to race on). On other platforms the handle is cloned per read
/// and the clone is seeked, leaving the original position untouched.
///
/// ## Example
///
/// ```no_run
/// use std::path::Path;
/// use zipvfs::FileSource;
///
/// # fn main() -> zipvfs::Result<()> {
/// let source = FileSource::open(Path::new("archive.zip"))?;
/// println!("{} bytes", zipvfs::ByteSource::len(&source));
/// # Ok(())
/// # }
/// ```
pub struct FileSource {
    file: std::fs::File,
    /// Length captured at open time; archives are not expected to grow.
    len: u64,
}

impl FileSource {
    /// Open `path` read-only and capture its length.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or its metadata read.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self.file.try_clone()?;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file.read(buf)?)
        }
    }

    fn len(&self) -> u64 {
        self.len
    }
}
