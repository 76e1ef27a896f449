//! Test support: an in-memory byte source and a fixture archive builder.
//!
//! The builder writes real PKZIP bytes by hand — local file headers,
//! central directory, end record — so tests control every field,
//! including the ones production archivers never misuse.
#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::sync::Arc;

use zipvfs::{ByteSource, Result, ZipArchive};

/// Byte source over an owned buffer.
pub struct MemSource(pub Vec<u8>);

#[async_trait::async_trait]
impl ByteSource for MemSource {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.0.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.0.len() - start);
        buf[..n].copy_from_slice(&self.0[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.0.len() as u64
    }
}

/// Mount archive bytes, panicking on failure.
pub async fn mount(bytes: Vec<u8>) -> ZipArchive<MemSource> {
    ZipArchive::open(Arc::new(MemSource(bytes)), "fixture.zip")
        .await
        .expect("fixture archive should mount")
}

/// Read an open file to the end.
pub async fn read_all<S: ByteSource>(file: &mut zipvfs::ZipFile<S>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = file.read(&mut buf).await.expect("read should succeed");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Fixture modification stamp: 2024-05-06 07:08:10 local time.
pub const DOS_DATE: u16 = (44 << 9) | (5 << 5) | 6;
pub const DOS_TIME: u16 = (7 << 11) | (8 << 5) | 5;

const VERSION_NEEDED: u16 = 20;
const HOST_UNIX: u8 = 3;

struct MemberRecord {
    name: Vec<u8>,
    method: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    local_offset: u32,
    version_made_by: u16,
    external_attrs: u32,
}

/// Builds PKZIP archive bytes member by member.
pub struct ArchiveBuilder {
    data: Vec<u8>,
    members: Vec<MemberRecord>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Add a STORE member with UNIX regular-file attributes.
    pub fn stored(mut self, name: &str, content: &[u8]) -> Self {
        self.add(name, content, content.to_vec(), 0, 0o100644, HOST_UNIX);
        self
    }

    /// Add a DEFLATE member with UNIX regular-file attributes.
    pub fn deflated(mut self, name: &str, content: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        let compressed = encoder.finish().unwrap();
        self.add(name, content, compressed, 8, 0o100644, HOST_UNIX);
        self
    }

    /// Add a member whose data is stored verbatim but labelled with an
    /// arbitrary compression method.
    pub fn with_method(mut self, name: &str, content: &[u8], method: u16) -> Self {
        self.add(name, content, content.to_vec(), method, 0o100644, HOST_UNIX);
        self
    }

    /// Add a UNIX symlink member; the content is the target path.
    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        let bytes = target.as_bytes();
        self.add(name, bytes, bytes.to_vec(), 0, 0o120777, HOST_UNIX);
        self
    }

    /// Add a UNIX symlink member with a DEFLATE-compressed target path.
    pub fn symlink_deflated(mut self, name: &str, target: &str) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(target.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        self.add(name, target.as_bytes(), compressed, 8, 0o120777, HOST_UNIX);
        self
    }

    /// Add an explicit directory entry (trailing slash, no content).
    pub fn dir_entry(mut self, name: &str) -> Self {
        self.add(name, b"", Vec::new(), 0, 0o040755, HOST_UNIX);
        self
    }

    fn add(
        &mut self,
        name: &str,
        content: &[u8],
        stored_bytes: Vec<u8>,
        method: u16,
        mode: u32,
        host: u8,
    ) {
        let mut crc = flate2::Crc::new();
        crc.update(content);

        let local_offset = self.data.len() as u32;

        // Local file header.
        self.data.extend_from_slice(b"PK\x03\x04");
        put_u16(&mut self.data, VERSION_NEEDED);
        put_u16(&mut self.data, 0); // flags
        put_u16(&mut self.data, method);
        put_u16(&mut self.data, DOS_TIME);
        put_u16(&mut self.data, DOS_DATE);
        put_u32(&mut self.data, crc.sum());
        put_u32(&mut self.data, stored_bytes.len() as u32);
        put_u32(&mut self.data, content.len() as u32);
        put_u16(&mut self.data, name.len() as u16);
        put_u16(&mut self.data, 0); // extra length
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(&stored_bytes);

        self.members.push(MemberRecord {
            name: name.as_bytes().to_vec(),
            method,
            crc: crc.sum(),
            compressed: stored_bytes.len() as u32,
            uncompressed: content.len() as u32,
            local_offset,
            version_made_by: (host as u16) << 8 | 20,
            external_attrs: mode << 16,
        });
    }

    /// Render the archive.
    pub fn build(self) -> Vec<u8> {
        self.render(0, b"")
    }

    /// Render the archive behind `prefix` bytes of non-ZIP stub data.
    ///
    /// All internal offsets stay archive-relative, exactly as a
    /// self-extracting installer would leave them.
    pub fn build_with_prefix(self, prefix: usize) -> Vec<u8> {
        self.render(prefix, b"")
    }

    /// Render the archive with a trailing archive comment.
    pub fn build_with_comment(self, comment: &[u8]) -> Vec<u8> {
        self.render(0, comment)
    }

    fn render(self, prefix: usize, comment: &[u8]) -> Vec<u8> {
        let mut out = vec![0x5A; prefix];
        out.extend_from_slice(&self.data);

        let cd_offset = self.data.len() as u32;
        let mut cd_size = 0u32;
        for member in &self.members {
            let start = out.len();
            out.extend_from_slice(b"PK\x01\x02");
            put_u16(&mut out, member.version_made_by);
            put_u16(&mut out, VERSION_NEEDED);
            put_u16(&mut out, 0); // flags
            put_u16(&mut out, member.method);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, member.crc);
            put_u32(&mut out, member.compressed);
            put_u32(&mut out, member.uncompressed);
            put_u16(&mut out, member.name.len() as u16);
            put_u16(&mut out, 0); // extra length
            put_u16(&mut out, 0); // comment length
            put_u16(&mut out, 0); // disk number start
            put_u16(&mut out, 0); // internal attributes
            put_u32(&mut out, member.external_attrs);
            put_u32(&mut out, member.local_offset);
            out.extend_from_slice(&member.name);
            cd_size += (out.len() - start) as u32;
        }

        // End of central directory.
        out.extend_from_slice(b"PK\x05\x06");
        put_u16(&mut out, 0); // this disk
        put_u16(&mut out, 0); // disk with central directory
        put_u16(&mut out, self.members.len() as u16);
        put_u16(&mut out, self.members.len() as u16);
        put_u32(&mut out, cd_size);
        put_u32(&mut out, cd_offset);
        put_u16(&mut out, comment.len() as u16);
        out.extend_from_slice(comment);

        out
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
