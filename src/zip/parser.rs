//! Archive discovery: locating the end record and loading the index.
//!
//! ZIP files are read from the end:
//! 1. Scan backward from EOF for the end-of-central-directory signature,
//!    past any archive comment.
//! 2. Validate the end record and compute the prefix correction for
//!    archives embedded behind non-ZIP data (self-extracting stubs).
//! 3. Read the central directory in one request and parse every record
//!    into an [`Entry`].
//!
//! Local file headers are deliberately *not* touched here; they are
//! validated lazily on first open, so opening an archive costs reads at
//! its tail only — which also keeps remote (Range-request) mounts cheap.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::entry::{Entry, EntryKind, ResolveState};
use super::structures::{
    CENTRAL_HEADER_SIGNATURE, CENTRAL_HEADER_SIZE, CompressionMethod, EOCD_SIGNATURE,
    EndOfCentralDirectory, HOST_FAT, dos_datetime_to_unix, is_symlink_attrs,
};
use crate::error::{Result, ZipError};
use crate::io::{ByteSource, read_exact_at};

/// Size of one backward scan window while hunting for the end record.
const EOCD_SCAN_WINDOW: usize = 256;

/// How far back from EOF the end record can legally start: a maximal
/// 65,535-byte comment plus the 22-byte fixed record.
const EOCD_SCAN_BOUND: u64 = 65_535 + EndOfCentralDirectory::SIZE as u64;

/// Find the absolute offset of the end-of-central-directory signature.
///
/// Scans backward from EOF in fixed windows, keeping a 3-byte overlap
/// between windows so a signature straddling a window boundary is still
/// seen. The match nearest EOF wins.
///
/// # Errors
///
/// [`ZipError::NotAnArchive`] when no signature exists within the legal
/// bound.
pub(crate) async fn locate_eocd<S: ByteSource + ?Sized>(source: &S) -> Result<u64> {
    let len = source.len();
    let floor = len.saturating_sub(EOCD_SCAN_BOUND);

    let mut window = [0u8; EOCD_SCAN_WINDOW];
    let mut end = len;

    loop {
        let start = end.saturating_sub(EOCD_SCAN_WINDOW as u64).max(floor);
        let n = (end - start) as usize;
        if n < 4 {
            return Err(ZipError::NotAnArchive);
        }
        read_exact_at(source, start, &mut window[..n]).await?;

        // Highest offset first: the rightmost signature is the real one
        // when file data happens to contain the byte pattern too.
        for i in (0..=n - 4).rev() {
            if window[i..i + 4] == EOCD_SIGNATURE {
                return Ok(start + i as u64);
            }
        }

        if start == floor {
            return Err(ZipError::NotAnArchive);
        }
        // Step the window down, re-covering 3 bytes across the boundary.
        end = start + 3;
    }
}

/// Load and sort the full entry index of an archive.
///
/// Validates the end record (single disk, consistent counts, no ZIP64
/// escapes, comment reaching exactly to EOF), computes the non-ZIP prefix
/// length, then parses `total_entries` central directory records. Every
/// local header offset in the result is already prefix-corrected.
///
/// # Errors
///
/// - [`ZipError::NotAnArchive`] if no end record is found;
/// - [`ZipError::Unsupported`] for multi-disk or ZIP64 archives and
///   comment-length mismatches;
/// - [`ZipError::Corrupted`] for truncated or misplaced structures.
pub(crate) async fn load_entries<S: ByteSource + ?Sized>(source: &S) -> Result<Vec<Entry>> {
    let len = source.len();
    let eocd_pos = locate_eocd(source).await?;

    let mut eocd_buf = [0u8; EndOfCentralDirectory::SIZE];
    read_exact_at(source, eocd_pos, &mut eocd_buf).await?;
    let eocd = EndOfCentralDirectory::from_bytes(&eocd_buf)?;

    if eocd.disk_number != 0 || eocd.disk_with_cd != 0 {
        return Err(ZipError::Unsupported("multi-disk archive"));
    }
    if eocd.disk_entries != eocd.total_entries {
        return Err(ZipError::Unsupported("entry counts disagree across disks"));
    }
    if eocd.has_zip64_markers() {
        return Err(ZipError::Unsupported("ZIP64 archive"));
    }
    if eocd_pos + EndOfCentralDirectory::SIZE as u64 + eocd.comment_len as u64 != len {
        return Err(ZipError::Unsupported("comment length mismatch"));
    }

    // Anything between the physical start of the file and where the end
    // record says the archive begins is a foreign prefix (a self-extracting
    // stub, an installer…). Every stored offset is relative to the prefix
    // end and must be shifted.
    let cd_span = eocd.cd_offset as u64 + eocd.cd_size as u64;
    if cd_span > eocd_pos {
        return Err(ZipError::Corrupted(
            "central directory overlaps its end record",
        ));
    }
    let prefix = eocd_pos - cd_span;

    let mut cd = vec![0u8; eocd.cd_size as usize];
    read_exact_at(source, eocd.cd_offset as u64 + prefix, &mut cd).await?;

    let mut entries = Vec::with_capacity(eocd.total_entries as usize);
    let mut cursor = Cursor::new(&cd[..]);
    for _ in 0..eocd.total_entries {
        entries.push(parse_central_record(&mut cursor, prefix)?);
    }

    // The index is searched with binary lookups; order is byte-wise on
    // the name.
    entries.sort_unstable_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    Ok(entries)
}

/// Parse one central directory record at the cursor.
fn parse_central_record(cursor: &mut Cursor<&[u8]>, prefix: u64) -> Result<Entry> {
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if remaining < CENTRAL_HEADER_SIZE as u64 {
        return Err(ZipError::Corrupted("truncated central directory"));
    }

    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CENTRAL_HEADER_SIGNATURE {
        return Err(ZipError::Corrupted("bad central directory signature"));
    }

    let version_made_by = cursor.read_u16::<LittleEndian>()?;
    let version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let dos_time = cursor.read_u16::<LittleEndian>()?;
    let dos_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let name_len = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_len = cursor.read_u16::<LittleEndian>()? as u64;
    let comment_len = cursor.read_u16::<LittleEndian>()? as u64;
    let _disk_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let external_attrs = cursor.read_u32::<LittleEndian>()?;
    let local_offset = cursor.read_u32::<LittleEndian>()? as u64 + prefix;

    let tail = cursor.get_ref().len() as u64 - cursor.position();
    if name_len + extra_len + comment_len > tail {
        return Err(ZipError::Corrupted("truncated central directory"));
    }

    let mut name_bytes = vec![0u8; name_len as usize];
    cursor.read_exact(&mut name_bytes)?;
    if name_bytes.contains(&0) {
        return Err(ZipError::Corrupted("entry name contains NUL"));
    }
    let mut name = String::from_utf8_lossy(&name_bytes).into_owned();

    // FAT tools store `\` separators; the index speaks `/` only.
    if (version_made_by >> 8) as u8 == HOST_FAT {
        name = name.replace('\\', "/");
    }

    // Extra field and comment carry nothing this reader needs.
    cursor.set_position(cursor.position() + extra_len + comment_len);

    let kind = if is_symlink_attrs(version_made_by, external_attrs, uncompressed_size) {
        EntryKind::Symlink
    } else {
        EntryKind::File
    };

    Ok(Entry {
        name,
        offset: local_offset,
        version_made_by,
        version_needed,
        method: CompressionMethod::from_u16(method),
        crc32,
        compressed_size,
        uncompressed_size,
        mtime: dos_datetime_to_unix(dos_date, dos_time),
        state: ResolveState::Unresolved(kind),
    })
}
