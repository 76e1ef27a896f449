//! In-memory index records for archive members.

use super::structures::CompressionMethod;

/// What a not-yet-validated entry claims to be, from its central
/// directory attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    /// Regular content (or an explicit directory entry).
    File,
    /// UNIX symbolic link; the entry data is the target path.
    Symlink,
}

/// Lazy resolution state of an entry.
///
/// Entries start `Unresolved`; the first open (or symlink chase) validates
/// the local file header and moves them to `Resolved` or `Broken`, both of
/// which are terminal. `Resolving` exists only while a resolve pass is on
/// the stack — meeting it again proves the symlink chain loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveState {
    /// Local header not yet validated.
    Unresolved(EntryKind),
    /// Validation in progress on the current chain.
    Resolving,
    /// Validated. `link` is the index of the transitively resolved
    /// non-symlink entry for symlinks, `None` for plain files.
    Resolved { link: Option<usize> },
    /// Validation failed; cached so reopening fails without I/O.
    Broken(EntryKind),
}

/// One central directory record, indexed by name.
///
/// `offset` starts out pointing at the local file header and is moved to
/// the first byte of file data when the entry resolves.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    /// Member name, `/`-separated, as stored (trailing `/` marks explicit
    /// directory entries).
    pub name: String,
    /// Local header offset, then data offset once resolved. Already
    /// corrected for any non-ZIP prefix.
    pub offset: u64,
    /// `version made by`; the high byte is the recording host type.
    pub version_made_by: u16,
    /// Minimum extractor version, cross-checked against the local header.
    pub version_needed: u16,
    /// Compression method.
    pub method: CompressionMethod,
    /// CRC-32 of the uncompressed data; recorded and cross-checked
    /// against the local header, not verified during reads.
    pub crc32: u32,
    /// Compressed size in bytes.
    pub compressed_size: u32,
    /// Uncompressed size in bytes.
    pub uncompressed_size: u32,
    /// Modification time as Unix epoch seconds, if the DOS stamp denoted
    /// a real date.
    pub mtime: Option<i64>,
    /// Resolution state.
    pub state: ResolveState,
}

impl Entry {
    /// True for anything symlink-shaped: an unresolved or broken symlink,
    /// or a resolved entry that carries a link target.
    pub fn is_symlink(&self) -> bool {
        matches!(
            self.state,
            ResolveState::Unresolved(EntryKind::Symlink)
                | ResolveState::Broken(EntryKind::Symlink)
                | ResolveState::Resolved { link: Some(_) }
        )
    }
}

/// Public, read-only view of one archive member.
///
/// Yielded by [`ZipArchive::entries`](crate::ZipArchive::entries) so hosts
/// can list an archive without walking the directory tree.
#[derive(Debug, Clone, Copy)]
pub struct EntryInfo<'a> {
    /// Member name as stored in the archive.
    pub name: &'a str,
    /// Uncompressed size in bytes.
    pub uncompressed_size: u32,
    /// Compressed size in bytes.
    pub compressed_size: u32,
    /// Compression method.
    pub method: CompressionMethod,
    /// Modification time as Unix epoch seconds.
    pub last_modified: Option<i64>,
    /// Whether the member is a symbolic link.
    pub is_symlink: bool,
}

impl<'a> EntryInfo<'a> {
    pub(crate) fn from_entry(entry: &'a Entry) -> Self {
        Self {
            name: &entry.name,
            uncompressed_size: entry.uncompressed_size,
            compressed_size: entry.compressed_size,
            method: entry.method,
            last_modified: entry.mtime,
            is_symlink: entry.is_symlink(),
        }
    }
}
