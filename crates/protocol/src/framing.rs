//! # Checksummed Block Framing
//!
//! Compressed data travels as self-describing blocks:
//!
//! ```text
//! {16 checksum}{u8 method}{u32 LE compressed size}{u32 LE decompressed size}{payload}
//! ```
//!
//! - `compressed size` counts the 9 header bytes after the checksum plus the payload
//! - `checksum` is CityHash128 (v1.0.2) of everything after it, stored as two
//!   little-endian u64 words, low word first
//!
//! [`Writer`] produces blocks; [`Reader`] turns a byte source back into the
//! decompressed stream, verifying each block before releasing any of its bytes.

use bytes::{BufMut, Bytes, BytesMut};
use chwire_core::{ErrorKind, ProtocolError, Result, ResultExt};
use std::io::{self, Read};

use super::compression::{self, Method};

pub const CHECKSUM_SIZE: usize = 16;
/// Method tag plus the two size fields
pub const COMPRESS_HEADER_SIZE: usize = 1 + 4 + 4;
pub const HEADER_SIZE: usize = CHECKSUM_SIZE + COMPRESS_HEADER_SIZE;

/// Upper bound for both size fields of a block
pub const MAX_BLOCK_SIZE: usize = 128 << 20;

/// Raw bytes per block written by [`Writer`]
///
/// Far enough below [`MAX_BLOCK_SIZE`] that no method's worst-case output plus
/// header can exceed it.
pub const CHUNK_SIZE: usize = 1 << 20;

const METHOD_OFFSET: usize = CHECKSUM_SIZE;
const COMPRESSED_SIZE_OFFSET: usize = METHOD_OFFSET + 1;
const DECOMPRESSED_SIZE_OFFSET: usize = COMPRESSED_SIZE_OFFSET + 4;

/// Block checksum over `data` (method tag through end of payload)
pub fn checksum(data: &[u8]) -> u128 {
    // cityhash-rs keeps the first word of the CityHash pair in the high half.
    cityhash_rs::cityhash_102_128(data).rotate_right(64)
}

fn read_u32_le(data: &[u8], offset: usize) -> usize {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(word) as usize
}

/// Compresses data into checksummed blocks
#[derive(Debug)]
pub struct Writer {
    method: Method,
    buf: BytesMut,
}

impl Writer {
    pub fn new(method: Method) -> Self {
        Self { method, buf: BytesMut::new() }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Compress `data` into one or more complete blocks.
    ///
    /// Inputs above [`CHUNK_SIZE`] are split across several blocks; an empty
    /// input still yields one (empty) block. The returned bytes are independent
    /// of later calls and can be concatenated with their output.
    pub fn compress(&mut self, data: &[u8]) -> Result<Bytes> {
        if data.is_empty() {
            self.put_block(data)?;
        }
        for chunk in data.chunks(CHUNK_SIZE) {
            self.put_block(chunk)?;
        }
        Ok(self.buf.split().freeze())
    }

    fn put_block(&mut self, data: &[u8]) -> Result<()> {
        let payload = compression::compress(data, self.method)?;
        let compressed_size = payload.len() + COMPRESS_HEADER_SIZE;
        if compressed_size > MAX_BLOCK_SIZE {
            return Err(ProtocolError::compression(format!(
                "compressed block of {compressed_size} bytes exceeds {MAX_BLOCK_SIZE}"
            )));
        }

        let start = self.buf.len();
        self.buf.reserve(HEADER_SIZE + payload.len());
        self.buf.put_bytes(0, CHECKSUM_SIZE);
        self.buf.put_u8(self.method.as_u8());
        self.buf.put_u32_le(compressed_size as u32);
        self.buf.put_u32_le(data.len() as u32);
        self.buf.put_slice(&payload);

        let sum = checksum(&self.buf[start + CHECKSUM_SIZE..]);
        self.buf[start..start + CHECKSUM_SIZE].copy_from_slice(&sum.to_le_bytes());

        tracing::trace!(
            method = %self.method,
            raw = data.len(),
            compressed = compressed_size,
            "wrote compressed block"
        );
        Ok(())
    }
}

/// Read until `buf` is full or the source ends; returns bytes read.
fn fill<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match src.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(read) => n += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Decompressing reader over a stream of blocks
///
/// Serves the decompressed bytes through [`std::io::Read`]. The next block is
/// fetched only once the current one is exhausted. A source that ends exactly
/// on a block boundary is a clean end of stream; ending anywhere else is a
/// short read.
///
/// Not for concurrent use: one caller at a time owns the cursor.
#[derive(Debug)]
pub struct Reader<R> {
    inner: R,
    raw: Vec<u8>,
    data: Vec<u8>,
    pos: usize,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, raw: Vec::new(), data: Vec::new(), pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Load and verify the next block.
    ///
    /// Returns `false` if the source ended cleanly before a new block.
    pub fn read_block(&mut self) -> Result<bool> {
        self.raw.clear();
        self.raw.resize(HEADER_SIZE, 0);
        let n = fill(&mut self.inner, &mut self.raw).field("header")?;
        if n == 0 {
            return Ok(false);
        }
        if n < HEADER_SIZE {
            return Err(ProtocolError::short_read(HEADER_SIZE, n).context("header"));
        }

        let compressed_size = read_u32_le(&self.raw, COMPRESSED_SIZE_OFFSET);
        let decompressed_size = read_u32_le(&self.raw, DECOMPRESSED_SIZE_OFFSET);
        if !(COMPRESS_HEADER_SIZE..=MAX_BLOCK_SIZE).contains(&compressed_size) {
            return Err(ProtocolError::malformed(format!(
                "compressed size {compressed_size} outside {COMPRESS_HEADER_SIZE}..={MAX_BLOCK_SIZE}"
            ))
            .context("header"));
        }

        let payload_size = compressed_size - COMPRESS_HEADER_SIZE;
        self.raw.resize(HEADER_SIZE + payload_size, 0);
        let n = fill(&mut self.inner, &mut self.raw[HEADER_SIZE..]).field("payload")?;
        if n < payload_size {
            return Err(ProtocolError::short_read(payload_size, n).context("payload"));
        }

        let mut stored = [0u8; CHECKSUM_SIZE];
        stored.copy_from_slice(&self.raw[..CHECKSUM_SIZE]);
        let expected = u128::from_le_bytes(stored);
        let actual = checksum(&self.raw[CHECKSUM_SIZE..]);
        if expected != actual {
            tracing::debug!(
                expected = format_args!("{expected:032x}"),
                actual = format_args!("{actual:032x}"),
                compressed_size,
                decompressed_size,
                "corrupted block"
            );
            return Err(ProtocolError::checksum_mismatch(expected, actual).context("checksum"));
        }

        if decompressed_size > MAX_BLOCK_SIZE {
            return Err(ProtocolError::malformed(format!(
                "decompressed size {decompressed_size} exceeds {MAX_BLOCK_SIZE}"
            ))
            .context("header"));
        }
        let tag = self.raw[METHOD_OFFSET];
        let method = Method::from_u8(tag)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown compression method 0x{tag:02x}")))
            .field("method")?;

        self.data = compression::decompress(&self.raw[HEADER_SIZE..], method, decompressed_size)
            .field("payload")?;
        self.pos = 0;

        tracing::trace!(%method, compressed_size, decompressed_size, "read compressed block");
        Ok(true)
    }

    /// Bytes of the current block not yet handed out
    pub fn buffered(&self) -> &[u8] {
        &self.data[self.pos..]
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Empty blocks are legal, so keep going until one has data.
        while self.pos >= self.data.len() {
            if !self.read_block().map_err(|e| io::Error::from(e.context("block")))? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Decompress a complete byte slice of blocks.
///
/// Strict: at least one block is required, and the slice must end exactly on a
/// block boundary.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::new(src);
    let mut out = Vec::new();
    let mut blocks = 0usize;
    while reader.read_block()? {
        out.extend_from_slice(reader.buffered());
        blocks += 1;
    }
    if blocks == 0 {
        return Err(ProtocolError::new(ErrorKind::ShortRead { needed: HEADER_SIZE, available: 0 })
            .context("header"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};

    fn hello() -> Vec<u8> {
        "Hello!\n".repeat(25).into_bytes()
    }

    fn read_all(src: &[u8], len: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        Reader::new(src).read_exact(&mut out)?;
        Ok(out)
    }

    fn inner_error(err: &io::Error) -> Option<&ProtocolError> {
        err.get_ref().and_then(|e| e.downcast_ref::<ProtocolError>())
    }

    #[test]
    fn test_compress_roundtrip() {
        let data = hello();
        assert_eq!(data.len(), 175);

        for method in [Method::Lz4, Method::Zstd, Method::None] {
            let mut w = Writer::new(method);
            let block = w.compress(&data).unwrap();
            assert_eq!(read_all(&block, data.len()).unwrap(), data, "{method}");
            assert_eq!(decompress(&block).unwrap(), data, "{method}");
        }
    }

    #[test]
    fn test_block_layout() {
        let data = hello();
        let block = Writer::new(Method::None).compress(&data).unwrap();

        assert_eq!(block.len(), HEADER_SIZE + data.len());
        assert_eq!(block[METHOD_OFFSET], 0x02);
        assert_eq!(read_u32_le(&block, COMPRESSED_SIZE_OFFSET), data.len() + COMPRESS_HEADER_SIZE);
        assert_eq!(read_u32_le(&block, DECOMPRESSED_SIZE_OFFSET), data.len());
        assert_eq!(&block[HEADER_SIZE..], &data[..]);

        let mut stored = [0u8; CHECKSUM_SIZE];
        stored.copy_from_slice(&block[..CHECKSUM_SIZE]);
        assert_eq!(u128::from_le_bytes(stored), checksum(&block[CHECKSUM_SIZE..]));
    }

    #[test]
    fn test_no_short_read() {
        let data = hello();
        let block = Writer::new(Method::Lz4).compress(&data).unwrap();

        for i in 0..block.len() {
            let err = read_all(&block[..i], data.len()).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof, "prefix {i}");

            let err = decompress(&block[..i]).unwrap_err();
            assert!(err.is_short_read(), "prefix {i}: {err}");
        }
    }

    #[test]
    fn test_bad_hash() {
        let data = hello();
        let block = Writer::new(Method::Lz4).compress(&data).unwrap();

        for i in 0..CHECKSUM_SIZE {
            let mut b = block.to_vec();
            b[i] = b[i].wrapping_add(1);
            let err = read_all(&b, data.len()).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
            assert!(inner_error(&err).unwrap().is_checksum_mismatch(), "offset {i}");
        }
    }

    #[test]
    fn test_bad_data() {
        let data = hello();
        let block = Writer::new(Method::Lz4).compress(&data).unwrap();

        for i in CHECKSUM_SIZE..block.len() {
            let mut b = block.to_vec();
            b[i] = b[i].wrapping_add(1);
            let err = decompress(&b).unwrap_err();
            if (COMPRESSED_SIZE_OFFSET..DECOMPRESSED_SIZE_OFFSET).contains(&i) {
                // A larger declared size runs past the end before the hash can be checked.
                assert!(err.is_short_read(), "offset {i}: {err}");
            } else {
                assert!(err.is_checksum_mismatch(), "offset {i}: {err}");
            }
        }
    }

    #[test]
    fn test_shrunk_compressed_size() {
        let data = hello();
        let mut b = Writer::new(Method::Lz4).compress(&data).unwrap().to_vec();
        assert!(b[COMPRESSED_SIZE_OFFSET] > 0);
        b[COMPRESSED_SIZE_OFFSET] -= 1;

        let err = decompress(&b).unwrap_err();
        assert!(err.is_checksum_mismatch(), "{err}");
        assert_eq!(err.path(), &["checksum"]);
    }

    fn count_blocks(src: &[u8]) -> usize {
        let mut r = Reader::new(src);
        let mut blocks = 0;
        while r.read_block().unwrap() {
            blocks += 1;
        }
        blocks
    }

    #[test]
    fn test_full_chunk_is_one_block() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut data = vec![0u8; CHUNK_SIZE];
        rng.fill_bytes(&mut data);

        for method in [Method::None, Method::Lz4, Method::Zstd] {
            let mut w = Writer::new(method);
            assert_eq!(w.method(), method);
            let stream = w.compress(&data).unwrap();
            assert_eq!(count_blocks(&stream), 1, "{method}");
            assert_eq!(decompress(&stream).unwrap(), data, "{method}");
        }
    }

    #[test]
    fn test_large_input_splits_into_blocks() {
        let data = vec![0x5a; 2 * CHUNK_SIZE + 1];
        for method in [Method::None, Method::Lz4] {
            let stream = Writer::new(method).compress(&data).unwrap();
            assert_eq!(count_blocks(&stream), 3, "{method}");
            assert_eq!(decompress(&stream).unwrap(), data, "{method}");
        }
    }

    #[test]
    fn test_block_at_size_limit() {
        let data = vec![0x5a; MAX_BLOCK_SIZE];
        let stream = Writer::new(Method::None).compress(&data).unwrap();
        assert_eq!(count_blocks(&stream), MAX_BLOCK_SIZE / CHUNK_SIZE);
        assert_eq!(decompress(&stream).unwrap().len(), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_concatenated_blocks() {
        let mut w = Writer::new(Method::Lz4);
        let mut stream = w.compress(b"first block, ").unwrap().to_vec();
        stream.extend_from_slice(&w.compress(b"").unwrap());
        stream.extend_from_slice(&w.compress(b"second block").unwrap());

        let mut out = Vec::new();
        let mut r = Reader::new(&stream[..]);
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"first block, second block");
        assert!(r.into_inner().is_empty());
        assert_eq!(decompress(&stream).unwrap(), out);
    }

    #[test]
    fn test_small_reads() {
        let data = hello();
        let block = Writer::new(Method::Zstd).compress(&data).unwrap();

        let mut r = Reader::new(&block[..]);
        let mut out = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = r.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_incompressible_data() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(10);
        let mut data = vec![0u8; 20 * 1024];
        rng.fill_bytes(&mut data);

        let block = Writer::new(Method::Lz4).compress(&data).unwrap();
        assert_eq!(read_all(&block, data.len()).unwrap(), data);
    }

    #[test]
    fn test_unknown_method_after_valid_checksum() {
        let data = hello();
        let mut b = Writer::new(Method::None).compress(&data).unwrap().to_vec();
        b[METHOD_OFFSET] = 0x01;
        let sum = checksum(&b[CHECKSUM_SIZE..]);
        b[..CHECKSUM_SIZE].copy_from_slice(&sum.to_le_bytes());

        let err = decompress(&b).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedField(_)));
        assert_eq!(err.path(), &["method"]);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut b = Writer::new(Method::None).compress(b"x").unwrap().to_vec();
        b[COMPRESSED_SIZE_OFFSET..DECOMPRESSED_SIZE_OFFSET].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = decompress(&b).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedField(_)));
        assert_eq!(err.path(), &["header"]);
    }
}
