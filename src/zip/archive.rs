//! The mounted archive: index, lazy resolution, and filesystem operations.
//!
//! [`ZipArchive`] is the read-only filesystem view over one ZIP source.
//! Opening it parses the central directory into a name-sorted index;
//! everything afterwards is binary search plus, on the first open of each
//! member, a lazy validation of that member's local file header.
//!
//! Symbolic links stored by UNIX archivers are first-class: lookups can
//! chase them transitively, loops are detected and the entries involved
//! are marked broken so later opens fail fast without re-reading headers.
//!
//! Mutating operations do not exist here; the write-side surface returns
//! [`ZipError::ReadOnly`]. Callers serialize operations on one archive by
//! construction — everything that can resolve an entry takes `&mut self`.

use byteorder::{LittleEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::Cursor;
use std::sync::Arc;

use super::entry::{Entry, EntryInfo, EntryKind, ResolveState};
use super::file::ZipFile;
use super::parser;
use super::path::normalize_link_target;
use super::structures::{HOST_FAT, LOCAL_HEADER_SIGNATURE, LOCAL_HEADER_SIZE};
use crate::error::{Result, ZipError};
use crate::io::{ByteSource, read_exact_at};

/// Cheap test for "does this look like a ZIP archive".
///
/// True when the source starts with a local file header signature, or —
/// for archives behind a self-extracting stub — when an
/// end-of-central-directory record exists near EOF. A `true` here means
/// [`ZipArchive::open`] is worth attempting, not that it will succeed.
pub async fn is_archive<S: ByteSource + ?Sized>(source: &S) -> bool {
    let mut sig = [0u8; 4];
    if read_exact_at(source, 0, &mut sig).await.is_ok() && sig == LOCAL_HEADER_SIGNATURE {
        return true;
    }
    parser::locate_eocd(source).await.is_ok()
}

/// A ZIP archive presented as a read-only hierarchical filesystem.
///
/// Generic over the byte source, so the same archive code serves local
/// files and HTTP-mounted remotes. The source is shared behind an `Arc`
/// with every file opened from the archive.
///
/// ## Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use zipvfs::{FileSource, ZipArchive};
///
/// # async fn example() -> zipvfs::Result<()> {
/// let source = Arc::new(FileSource::open(Path::new("assets.zip"))?);
/// let mut archive = ZipArchive::open(source, "assets.zip").await?;
///
/// for name in archive.enumerate("textures", false) {
///     println!("{name}");
/// }
/// let mut file = archive.open_read("textures/stone.png").await?;
/// let mut buf = vec![0u8; file.len() as usize];
/// file.read(&mut buf).await?;
/// # Ok(())
/// # }
/// ```
pub struct ZipArchive<S: ByteSource> {
    source: Arc<S>,
    /// Archive name, for diagnostics and host bookkeeping.
    name: String,
    /// Entries sorted ascending by byte-wise name compare.
    entries: Vec<Entry>,
}

impl<S: ByteSource> std::fmt::Debug for ZipArchive<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<S: ByteSource> ZipArchive<S> {
    /// Open an archive: locate the end record, parse and sort the central
    /// directory, and build the index.
    ///
    /// No local file header is touched here; members are validated the
    /// first time they are opened.
    ///
    /// # Errors
    ///
    /// See [`ZipError`]: `NotAnArchive` when no end record exists,
    /// `Unsupported` for multi-disk/ZIP64/comment-mismatch archives,
    /// `Corrupted` for damaged structures.
    pub async fn open(source: Arc<S>, name: impl Into<String>) -> Result<Self> {
        let entries = parser::load_entries(&*source).await?;
        Ok(Self {
            source,
            name: name.into(),
            entries,
        })
    }

    /// The name this archive was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of members in the index.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over member metadata in index (name) order.
    pub fn entries(&self) -> impl Iterator<Item = EntryInfo<'_>> {
        self.entries.iter().map(EntryInfo::from_entry)
    }

    /// True when an entry with exactly this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// True when the name is symlink-shaped: an unresolved or broken
    /// symlink, or a resolved entry carrying a link target.
    pub fn is_symlink(&self, name: &str) -> bool {
        self.find(name)
            .map(|idx| self.entries[idx].is_symlink())
            .unwrap_or(false)
    }

    /// Modification time of the named entry as Unix epoch seconds.
    ///
    /// `None` when the entry does not exist or its DOS stamp did not
    /// denote a real date.
    pub fn last_mod_time(&self, name: &str) -> Option<i64> {
        self.find(name).and_then(|idx| self.entries[idx].mtime)
    }

    /// Decide whether `name` denotes a directory.
    ///
    /// A name with entries beneath it is a directory outright. Otherwise
    /// the entry itself is consulted; a symlink is resolved (this is the
    /// one directory query that can perform I/O) and judged by its
    /// target.
    ///
    /// # Errors
    ///
    /// [`ZipError::NotFound`] when nothing carries the name;
    /// resolution errors when a symlink in the way is broken or loops.
    pub async fn is_directory(&mut self, name: &str) -> Result<bool> {
        if self.first_in_dir(name).is_some() {
            return Ok(true);
        }
        let idx = self
            .find(name)
            .ok_or_else(|| ZipError::NotFound(name.to_string()))?;
        if !self.entries[idx].is_symlink() {
            return Ok(false);
        }

        let target = self.resolve(idx).await?;
        let target_name = self.entries[target].name.clone();
        Ok(target_name.ends_with('/') || self.first_in_dir(&target_name).is_some())
    }

    /// List the direct children of `dir`.
    ///
    /// Yields one name per child: plain members by their final component,
    /// and each immediate subdirectory component once, regardless of how
    /// many entries live below it. The directory's own entry (archivers
    /// often store `dir/` explicitly) is not listed. Pass
    /// `omit_symlinks` to leave symlink members out.
    ///
    /// An empty or unknown directory yields an empty list; the root is
    /// named by `""`.
    pub fn enumerate(&self, dir: &str, omit_symlinks: bool) -> Vec<String> {
        let Some(start) = self.first_in_dir(dir) else {
            return Vec::new();
        };
        let dir = dir.strip_suffix('/').unwrap_or(dir);
        let skip = if dir.is_empty() { 0 } else { dir.len() + 1 };

        let mut names = Vec::new();
        let mut i = start;
        while i < self.entries.len() {
            let entry = &self.entries[i];
            if !dir.is_empty() && !in_dir(&entry.name, dir) {
                break;
            }

            let tail = &entry.name[skip..];
            if tail.is_empty() {
                // The directory's own entry.
                i += 1;
                continue;
            }

            match tail.find('/') {
                Some(0) => {
                    // Doubled slash; nothing nameable here.
                    i += 1;
                }
                Some(pos) => {
                    // First entry under an immediate subdirectory: emit
                    // the component, then skip everything sharing it.
                    names.push(tail[..pos].to_string());
                    let sub_prefix = entry.name[..skip + pos + 1].to_string();
                    while i < self.entries.len()
                        && self.entries[i].name.as_bytes().starts_with(sub_prefix.as_bytes())
                    {
                        i += 1;
                    }
                }
                None => {
                    if !(omit_symlinks && entry.is_symlink()) {
                        names.push(tail.to_string());
                    }
                    i += 1;
                }
            }
        }
        names
    }

    /// Open a member for streaming reads.
    ///
    /// Resolves the entry on first use (validating its local file header)
    /// and follows symlinks to their final target. The returned handle is
    /// independent of this archive's other open files.
    ///
    /// # Errors
    ///
    /// [`ZipError::NotFound`] for unknown names, [`ZipError::Corrupted`]
    /// for entries whose local header disagrees with the central
    /// directory (cached across opens), [`ZipError::SymlinkLoop`] for
    /// cyclic links, [`ZipError::UnsupportedCompression`] for methods
    /// other than STORE and DEFLATE.
    pub async fn open_read(&mut self, name: &str) -> Result<ZipFile<S>> {
        let idx = self
            .find(name)
            .ok_or_else(|| ZipError::NotFound(name.to_string()))?;
        let idx = self.resolve(idx).await?;

        let entry = &self.entries[idx];
        ZipFile::new(
            Arc::clone(&self.source),
            entry.offset,
            entry.compressed_size,
            entry.uncompressed_size,
            entry.method,
        )
    }

    /// Archives are read-only; opening for writing always fails.
    pub fn open_write(&mut self, _name: &str) -> Result<ZipFile<S>> {
        Err(ZipError::ReadOnly)
    }

    /// Archives are read-only; opening for append always fails.
    pub fn open_append(&mut self, _name: &str) -> Result<ZipFile<S>> {
        Err(ZipError::ReadOnly)
    }

    /// Archives are read-only; directory creation always fails.
    pub fn mkdir(&mut self, _name: &str) -> Result<()> {
        Err(ZipError::ReadOnly)
    }

    /// Archives are read-only; removal always fails.
    pub fn remove(&mut self, _name: &str) -> Result<()> {
        Err(ZipError::ReadOnly)
    }

    /// Exact binary lookup by name.
    fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
    }

    /// Index of the first entry inside directory `dir`, if any.
    ///
    /// `dir` may carry one trailing `/`; the empty string is the root and
    /// answers with index 0.
    fn first_in_dir(&self, dir: &str) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let dir = dir.strip_suffix('/').unwrap_or(dir);
        if dir.is_empty() {
            return Some(0);
        }

        let idx = self
            .entries
            .partition_point(|e| dir_relation(e.name.as_bytes(), dir.as_bytes()) == Ordering::Less);
        (idx < self.entries.len()
            && dir_relation(self.entries[idx].name.as_bytes(), dir.as_bytes()) == Ordering::Equal)
            .then_some(idx)
    }

    /// Resolve an entry to its final non-symlink entry index.
    ///
    /// Idempotent: a resolved entry answers from cache, a broken one
    /// fails from cache without touching the source. Unresolved entries
    /// get their local file header validated and, for symlinks, their
    /// target read, normalized and chased. Each entry on the chain is
    /// marked `Resolving` while the walk runs; stepping onto an entry
    /// already in that state proves the chain loops, and every entry on
    /// it is marked broken.
    async fn resolve(&mut self, start: usize) -> Result<usize> {
        let mut chain: Vec<(usize, EntryKind)> = Vec::new();
        let mut cur = start;

        let last = loop {
            match self.entries[cur].state {
                ResolveState::Resolved { link } => break link.unwrap_or(cur),
                ResolveState::Broken(_) => {
                    let err = ZipError::Corrupted("entry previously failed to resolve");
                    self.mark_broken(&chain);
                    return Err(err);
                }
                ResolveState::Resolving => {
                    let name = self.entries[start].name.clone();
                    self.mark_broken(&chain);
                    return Err(ZipError::SymlinkLoop(name));
                }
                ResolveState::Unresolved(kind) => {
                    self.entries[cur].state = ResolveState::Resolving;
                    chain.push((cur, kind));

                    if let Err(e) = self.validate_local_header(cur).await {
                        self.mark_broken(&chain);
                        return Err(e);
                    }

                    match kind {
                        EntryKind::File => break cur,
                        EntryKind::Symlink => {
                            let target = match self.read_link_target(cur).await {
                                Ok(t) => t,
                                Err(e) => {
                                    self.mark_broken(&chain);
                                    return Err(e);
                                }
                            };
                            match self.find(&target) {
                                Some(next) => cur = next,
                                None => {
                                    self.mark_broken(&chain);
                                    return Err(ZipError::NotFound(target));
                                }
                            }
                        }
                    }
                }
            }
        };

        for &(idx, _) in &chain {
            self.entries[idx].state = ResolveState::Resolved {
                link: (idx != last).then_some(last),
            };
        }
        Ok(last)
    }

    /// Mark every entry on a failed resolve chain broken, preserving its
    /// kind.
    fn mark_broken(&mut self, chain: &[(usize, EntryKind)]) {
        for &(idx, kind) in chain {
            self.entries[idx].state = ResolveState::Broken(kind);
        }
    }

    /// Validate an entry's local file header against its central
    /// directory record, then move `offset` to the first data byte.
    async fn validate_local_header(&mut self, idx: usize) -> Result<()> {
        let entry = &self.entries[idx];

        let mut header = [0u8; LOCAL_HEADER_SIZE];
        read_exact_at(&*self.source, entry.offset, &mut header).await?;
        if header[0..4] != LOCAL_HEADER_SIGNATURE {
            return Err(ZipError::Corrupted("bad local file header signature"));
        }

        let mut cursor = Cursor::new(&header[4..]);
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _dos_time = cursor.read_u16::<LittleEndian>()?;
        let _dos_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_len = cursor.read_u16::<LittleEndian>()? as u64;

        if version_needed != entry.version_needed
            || method != entry.method.as_u16()
            || crc32 != entry.crc32
            || compressed_size != entry.compressed_size
            || uncompressed_size != entry.uncompressed_size
        {
            return Err(ZipError::Corrupted(
                "local file header disagrees with central directory",
            ));
        }

        self.entries[idx].offset += LOCAL_HEADER_SIZE as u64 + name_len + extra_len;
        Ok(())
    }

    /// Read and normalize a symlink entry's target path.
    ///
    /// The member data *is* the target text (not NUL-terminated), stored
    /// or deflated like any other member; it streams through the regular
    /// file engine.
    async fn read_link_target(&self, idx: usize) -> Result<String> {
        let entry = &self.entries[idx];

        let mut file = ZipFile::new(
            Arc::clone(&self.source),
            entry.offset,
            entry.compressed_size,
            entry.uncompressed_size,
            entry.method,
        )?;
        let mut raw = vec![0u8; entry.uncompressed_size as usize];
        let mut filled = 0;
        while filled < raw.len() {
            let n = file.read(&mut raw[filled..]).await?;
            if n == 0 {
                return Err(ZipError::Corrupted("short symlink target"));
            }
            filled += n;
        }

        let mut target = String::from_utf8_lossy(&raw).into_owned();
        if (entry.version_made_by >> 8) as u8 == HOST_FAT {
            target = target.replace('\\', "/");
        }
        Ok(normalize_link_target(&target))
    }
}

/// True when `name` lies strictly inside directory `dir`.
fn in_dir(name: &str, dir: &str) -> bool {
    name.len() > dir.len()
        && name.as_bytes()[..dir.len()] == *dir.as_bytes()
        && name.as_bytes()[dir.len()] == b'/'
}

/// Order an entry name relative to the interior of directory `dir`
/// (which must not carry a trailing slash).
///
/// `Equal` means the name lies inside the directory; `Less`/`Greater`
/// follow byte order, with the byte at the separator position compared
/// against `/`. This keeps the "inside `dir`" names a contiguous run of
/// the sorted index, so a binary search can land on its left edge.
fn dir_relation(name: &[u8], dir: &[u8]) -> Ordering {
    let dlen = dir.len();
    let head = &name[..name.len().min(dlen)];
    match head.cmp(&dir[..head.len()]) {
        Ordering::Equal => {
            if name.len() <= dlen {
                // `dir` itself, or a strict prefix of it: sorts before
                // everything inside.
                Ordering::Less
            } else {
                name[dlen].cmp(&b'/')
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::dir_relation;
    use std::cmp::Ordering;

    #[test]
    fn dir_relation_brackets_the_directory_span() {
        let dir = b"dir";
        assert_eq!(dir_relation(b"dia", dir), Ordering::Less);
        assert_eq!(dir_relation(b"dir", dir), Ordering::Less);
        assert_eq!(dir_relation(b"dir.txt", dir), Ordering::Less);
        assert_eq!(dir_relation(b"dir/", dir), Ordering::Equal);
        assert_eq!(dir_relation(b"dir/a", dir), Ordering::Equal);
        assert_eq!(dir_relation(b"dir/z/deep", dir), Ordering::Equal);
        assert_eq!(dir_relation(b"dir0", dir), Ordering::Greater);
        assert_eq!(dir_relation(b"dis", dir), Ordering::Greater);
    }

    #[test]
    fn dir_relation_orders_prefixes_first() {
        assert_eq!(dir_relation(b"d", b"dir"), Ordering::Less);
        assert_eq!(dir_relation(b"", b"dir"), Ordering::Less);
    }
}
