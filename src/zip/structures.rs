//! ZIP wire-format structures and field decoding.
//!
//! Everything here is defined by the PKZIP APPNOTE: signatures, the fixed
//! layout of the end-of-central-directory record, compression method codes,
//! the host-type table carried in `version made by`, and the MS-DOS
//! timestamp encoding.
//!
//! ## Archive layout
//!
//! ```text
//! [optional non-ZIP prefix, e.g. a self-extracting stub]
//! [Local File Header 1][File Data 1]
//! [Local File Header 2][File Data 2]
//! ...
//! [Central Directory Header 1]
//! [Central Directory Header 2]
//! ...
//! [End of Central Directory Record][optional comment]
//! ```
//!
//! All multi-byte integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{Local, NaiveDate, TimeZone};
use std::io::Cursor;

use crate::error::{Result, ZipError};

/// Local file header signature: "PK\x03\x04".
pub const LOCAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Central directory header signature: "PK\x01\x02".
pub const CENTRAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x01\x02";

/// End of central directory signature: "PK\x05\x06".
pub const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";

/// Fixed size of a local file header, before name and extra field.
pub const LOCAL_HEADER_SIZE: usize = 30;

/// Fixed size of a central directory header, before its variable tail.
pub const CENTRAL_HEADER_SIZE: usize = 46;

/// ZIP compression methods.
///
/// Only `Stored` (0) and `Deflate` (8) are readable here; every other
/// method is recorded as [`CompressionMethod::Unknown`] at parse time and
/// rejected when the entry is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (method 0).
    Stored,
    /// Raw DEFLATE per RFC 1951 (method 8).
    Deflate,
    /// Anything else; carried so errors can name the method.
    Unknown(u16),
}

impl CompressionMethod {
    /// Map a raw method code to a variant.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    /// The raw method code.
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of central directory record.
///
/// The fixed trailer of every ZIP file; locating it is the first step of
/// opening an archive.
///
/// ## Structure (22 bytes + comment)
///
/// | Offset | Size | Description |
/// |--------|------|-------------|
/// | 0 | 4 | Signature (0x06054b50) |
/// | 4 | 2 | Number of this disk |
/// | 6 | 2 | Disk where the central directory starts |
/// | 8 | 2 | Central directory entries on this disk |
/// | 10 | 2 | Total central directory entries |
/// | 12 | 4 | Central directory size |
/// | 16 | 4 | Central directory offset |
/// | 20 | 2 | Comment length |
/// | 22 | n | Comment (variable) |
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub disk_with_cd: u16,
    /// Central directory entries on this disk.
    pub disk_entries: u16,
    /// Total central directory entries.
    pub total_entries: u16,
    /// Central directory size in bytes.
    pub cd_size: u32,
    /// Stated central directory offset (before prefix correction).
    pub cd_offset: u32,
    /// Archive comment length.
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    /// Size of the fixed portion of the record.
    pub const SIZE: usize = 22;

    /// Parse the fixed record from `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`ZipError::Corrupted`] if `data` is short or the
    /// signature does not match.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || data[0..4] != EOCD_SIGNATURE {
            return Err(ZipError::Corrupted("bad end-of-central-directory record"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// True when any field carries a ZIP64 escape value.
    ///
    /// ZIP64 archives are not readable here; the caller rejects them as
    /// unsupported rather than chasing the ZIP64 end record.
    pub fn has_zip64_markers(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Host-type code for FAT, whose names use `\` as a separator.
pub const HOST_FAT: u8 = 0;

/// Host types whose external attributes never encode UNIX mode bits.
///
/// `version made by` high byte. Everything outside this table is treated
/// as UNIX-like, so its attribute bits are trusted for symlink detection.
const NON_UNIX_HOSTS: [u8; 10] = [
    0,  // FAT
    1,  // Amiga
    2,  // VMS
    4,  // VM/CMS
    6,  // HPFS
    11, // NTFS
    13, // Acorn
    14, // VFAT
    15, // MVS
    18, // THEOS
];

/// UNIX file-type mask over the high 16 attribute bits.
const UNIX_TYPE_MASK: u32 = 0o170000;

/// UNIX symlink file type (S_IFLNK).
const UNIX_TYPE_SYMLINK: u32 = 0o120000;

/// Decide whether a central directory record describes a symbolic link.
///
/// True when the recording host is UNIX-like, the high attribute bits
/// carry S_IFLNK, and the entry has content to hold the target path.
pub fn is_symlink_attrs(version_made_by: u16, external_attrs: u32, uncompressed_size: u32) -> bool {
    let host = (version_made_by >> 8) as u8;
    !NON_UNIX_HOSTS.contains(&host)
        && (external_attrs >> 16) & UNIX_TYPE_MASK == UNIX_TYPE_SYMLINK
        && uncompressed_size > 0
}

/// Convert an MS-DOS date/time pair to seconds since the Unix epoch.
///
/// The fields are interpreted as local civil time; daylight savings is
/// resolved by the platform's timezone database. A wall-clock reading
/// that falls in a DST gap is taken at its UTC face value; an ambiguous
/// one takes the earlier instant.
///
/// Returns `None` for stamps that do not denote a real date (DOS permits
/// month 0 and day 0, and nothing stops a writer from storing them).
pub fn dos_datetime_to_unix(date: u16, time: u16) -> Option<i64> {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    // Stored in two-second units; clamp the (invalid) 60..62 range.
    let second = (((time & 0x1F) << 1) as u32).min(59);

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.timestamp()),
        chrono::LocalResult::Ambiguous(earlier, _) => Some(earlier.timestamp()),
        chrono::LocalResult::None => Some(naive.and_utc().timestamp()),
    }
}
