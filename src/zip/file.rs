//! Streaming read handle for one open archive member.
//!
//! A [`ZipFile`] owns everything its reads need: a shared handle on the
//! archive's byte source, the member's data offset and sizes, its current
//! position, and (for DEFLATE members) a raw-deflate decompressor with a
//! fixed compressed-input buffer. Compressed data streams through that
//! buffer in chunks and is never resident in full.
//!
//! Seeking is cheap for STORE members and honest for DEFLATE ones: a
//! forward seek decodes and discards, a backward seek resets the
//! decompressor and re-decodes from the start of the stream — the only
//! correct strategy without checkpoints.

use flate2::{Decompress, FlushDecompress, Status};
use std::sync::Arc;

use super::structures::CompressionMethod;
use crate::error::{Result, ZipError};
use crate::io::{ByteSource, read_exact_at};

/// Size of the compressed-input buffer for DEFLATE members.
const INPUT_BUFFER_SIZE: usize = 16 * 1024;

/// Scratch size for decode-and-discard seeks.
const DISCARD_BUFFER_SIZE: usize = 512;

/// Per-open decoder state.
enum Decoder {
    /// STORE: reads pass straight through to the source.
    Stored,
    /// DEFLATE: streaming raw-deflate decompression.
    Deflate(Box<Inflater>),
}

/// Streaming raw-DEFLATE state: the codec plus its input window.
struct Inflater {
    stream: Decompress,
    /// Fixed compressed-input buffer.
    input: Vec<u8>,
    /// Consumed bytes within `input`.
    input_pos: usize,
    /// Valid bytes within `input`.
    input_len: usize,
    /// Compressed bytes fetched from the source so far.
    comp_pos: u64,
}

impl Inflater {
    fn new() -> Self {
        Self {
            // `false`: ZIP members are raw RFC 1951 streams, no zlib
            // wrapper.
            stream: Decompress::new(false),
            input: vec![0u8; INPUT_BUFFER_SIZE],
            input_pos: 0,
            input_len: 0,
            comp_pos: 0,
        }
    }

    /// Rewind to the start of the compressed stream.
    fn restart(&mut self) {
        self.stream.reset(false);
        self.input_pos = 0;
        self.input_len = 0;
        self.comp_pos = 0;
    }
}

/// An archive member opened for reading.
///
/// Obtained from [`ZipArchive::open_read`](crate::ZipArchive::open_read).
/// Multiple files may be open on the same archive at once; each owns its
/// positions and decoder, so they never interfere. Dropping the handle
/// releases the decoder and its buffer.
pub struct ZipFile<S: ByteSource + ?Sized> {
    source: Arc<S>,
    /// Absolute offset of the first byte of member data.
    data_offset: u64,
    compressed_size: u32,
    uncompressed_size: u32,
    /// Current uncompressed position; this is `tell()`.
    pos: u64,
    decoder: Decoder,
}

impl<S: ByteSource + ?Sized> std::fmt::Debug for ZipFile<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFile")
            .field("data_offset", &self.data_offset)
            .field("compressed_size", &self.compressed_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .field("pos", &self.pos)
            .finish()
    }
}

impl<S: ByteSource + ?Sized> ZipFile<S> {
    /// Build a handle over already-resolved member data.
    ///
    /// # Errors
    ///
    /// [`ZipError::UnsupportedCompression`] for any method other than
    /// STORE or DEFLATE.
    pub(crate) fn new(
        source: Arc<S>,
        data_offset: u64,
        compressed_size: u32,
        uncompressed_size: u32,
        method: CompressionMethod,
    ) -> Result<Self> {
        let decoder = match method {
            CompressionMethod::Stored => Decoder::Stored,
            CompressionMethod::Deflate => Decoder::Deflate(Box::new(Inflater::new())),
            CompressionMethod::Unknown(code) => {
                return Err(ZipError::UnsupportedCompression(code));
            }
        };
        Ok(Self {
            source,
            data_offset,
            compressed_size,
            uncompressed_size,
            pos: 0,
            decoder,
        })
    }

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// The read is clamped to the member's remaining uncompressed bytes;
    /// at end of file it returns `Ok(0)`.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.uncompressed_size as u64 - self.pos;
        let want = (buf.len() as u64).min(avail) as usize;
        if want == 0 {
            return Ok(0);
        }

        let n = match &mut self.decoder {
            Decoder::Stored => {
                read_exact_at(&*self.source, self.data_offset + self.pos, &mut buf[..want])
                    .await?;
                want
            }
            Decoder::Deflate(inflater) => {
                inflate_into(
                    &*self.source,
                    self.data_offset,
                    self.compressed_size,
                    inflater,
                    &mut buf[..want],
                )
                .await?
            }
        };

        self.pos += n as u64;
        Ok(n)
    }

    /// Reposition to `target` uncompressed bytes from the start.
    ///
    /// STORE members seek in O(1). DEFLATE members decode forward and
    /// discard; seeking backward restarts the stream first and re-decodes
    /// from offset zero.
    ///
    /// # Errors
    ///
    /// [`ZipError::PastEof`] if `target` exceeds the member length.
    pub async fn seek(&mut self, target: u64) -> Result<()> {
        if target > self.uncompressed_size as u64 {
            return Err(ZipError::PastEof);
        }

        match &mut self.decoder {
            Decoder::Stored => {
                self.pos = target;
                return Ok(());
            }
            Decoder::Deflate(inflater) => {
                if target < self.pos {
                    inflater.restart();
                    self.pos = 0;
                }
            }
        }

        let mut scratch = [0u8; DISCARD_BUFFER_SIZE];
        while self.pos < target {
            let step = ((target - self.pos) as usize).min(DISCARD_BUFFER_SIZE);
            let n = self.read(&mut scratch[..step]).await?;
            if n == 0 {
                return Err(ZipError::Corrupted("deflate stream ended early"));
            }
        }
        Ok(())
    }

    /// Current uncompressed position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// True once the position has reached the member length.
    pub fn eof(&self) -> bool {
        self.pos >= self.uncompressed_size as u64
    }

    /// Uncompressed length of the member.
    pub fn len(&self) -> u64 {
        self.uncompressed_size as u64
    }

    /// True for zero-length members.
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size == 0
    }
}

/// Decode into `out` until it is full or the stream ends.
///
/// Refills the inflater's input buffer from the source whenever its
/// window is exhausted, never fetching past the member's compressed size.
async fn inflate_into<S: ByteSource + ?Sized>(
    source: &S,
    data_offset: u64,
    compressed_size: u32,
    inflater: &mut Inflater,
    out: &mut [u8],
) -> Result<usize> {
    let mut produced = 0;

    while produced < out.len() {
        if inflater.input_pos == inflater.input_len {
            let left = compressed_size as u64 - inflater.comp_pos;
            let want = left.min(INPUT_BUFFER_SIZE as u64) as usize;
            if want == 0 {
                // Declared sizes promise more output, the stream has no
                // more input.
                return Err(ZipError::Corrupted("deflate stream ended early"));
            }
            read_exact_at(
                source,
                data_offset + inflater.comp_pos,
                &mut inflater.input[..want],
            )
            .await?;
            inflater.comp_pos += want as u64;
            inflater.input_pos = 0;
            inflater.input_len = want;
        }

        let before_in = inflater.stream.total_in();
        let before_out = inflater.stream.total_out();
        let status = inflater.stream.decompress(
            &inflater.input[inflater.input_pos..inflater.input_len],
            &mut out[produced..],
            FlushDecompress::Sync,
        )?;
        let consumed = (inflater.stream.total_in() - before_in) as usize;
        let emitted = (inflater.stream.total_out() - before_out) as usize;
        inflater.input_pos += consumed;
        produced += emitted;

        match status {
            Status::StreamEnd => break,
            Status::Ok => {}
            Status::BufError => {
                // No progress possible with the bytes on hand. That is
                // fine when the top of the loop can refill; otherwise the
                // stream is short.
                let refillable = inflater.input_pos == inflater.input_len
                    && inflater.comp_pos < compressed_size as u64;
                if consumed == 0 && emitted == 0 && !refillable {
                    return Err(ZipError::Corrupted("deflate stream stalled"));
                }
            }
        }
    }

    Ok(produced)
}
