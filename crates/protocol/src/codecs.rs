//! Native protocol primitive codecs
//!
//! Every message encoder writes through [`Buffer`] and every decoder reads
//! through [`Reader`]. The encodings are:
//! - UVarint: unsigned LEB128, 7 bits per byte, at most 10 bytes
//! - String: UVarint byte length followed by the raw bytes, no terminator
//! - Bool: one byte, 0 is false, anything else is true (1 when written)
//! - Int64/UInt64: 8 bytes little-endian

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chwire_core::{ProtocolError, Result, Revision};

/// Longest valid UVarint encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Types with a fixed wire shape
pub trait Encode {
    fn encode(&self, buf: &mut Buffer);
}

/// Types whose wire shape depends on the negotiated revision
pub trait AwareEncode {
    fn encode_aware(&self, buf: &mut Buffer, revision: Revision);
}

/// Decoding counterpart of [`AwareEncode`]
pub trait AwareDecode: Sized {
    fn decode_aware<B: Buf>(r: &mut Reader<B>, revision: Revision) -> Result<Self>;
}

/// Append-only encode buffer
#[derive(Debug, Default, Clone)]
pub struct Buffer {
    buf: BytesMut,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value into this buffer.
    pub fn put<T: Encode + ?Sized>(&mut self, value: &T) {
        value.encode(self);
    }

    /// Encode a revision-aware value into this buffer.
    pub fn put_aware<T: AwareEncode + ?Sized>(&mut self, value: &T, revision: Revision) {
        value.encode_aware(self, revision);
    }

    #[inline]
    pub fn put_uvarint(&mut self, mut val: u64) {
        while val >= 0x80 {
            self.buf.put_u8((val as u8) | 0x80);
            val >>= 7;
        }
        self.buf.put_u8(val as u8);
    }

    #[inline]
    pub fn put_string(&mut self, val: &str) {
        self.put_raw_string(val.as_bytes());
    }

    /// String encoding for byte content that is not necessarily UTF-8.
    #[inline]
    pub fn put_raw_string(&mut self, val: &[u8]) {
        self.put_uvarint(val.len() as u64);
        self.buf.put_slice(val);
    }

    #[inline]
    pub fn put_bool(&mut self, val: bool) {
        self.buf.put_u8(val as u8);
    }

    #[inline]
    pub fn put_u8(&mut self, val: u8) {
        self.buf.put_u8(val);
    }

    #[inline]
    pub fn put_i64(&mut self, val: i64) {
        self.buf.put_i64_le(val);
    }

    #[inline]
    pub fn put_u64(&mut self, val: u64) {
        self.buf.put_u64_le(val);
    }

    #[inline]
    pub fn put_raw(&mut self, val: &[u8]) {
        self.buf.put_slice(val);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take everything written so far, leaving the buffer empty.
    pub fn split(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

/// Forward-only decode cursor
///
/// Reads are not transactional: a failed read may already have consumed part
/// of its input (a length prefix, or a whole string that is not UTF-8). Once a
/// read fails, the enclosing decode is failed and the cursor is discarded.
#[derive(Debug)]
pub struct Reader<B> {
    buf: B,
}

impl<B: Buf> Reader<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Decode a revision-aware value.
    pub fn get_aware<T: AwareDecode>(&mut self, revision: Revision) -> Result<T> {
        T::decode_aware(self, revision)
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.buf.remaining();
        if available < needed {
            return Err(ProtocolError::short_read(needed, available));
        }
        Ok(())
    }

    pub fn uvarint(&mut self) -> Result<u64> {
        let mut val: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            self.ensure(1)?;
            let byte = self.buf.get_u8();
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(ProtocolError::malformed("uvarint overflows u64"));
            }
            val |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(val);
            }
        }
        Err(ProtocolError::malformed("uvarint longer than 10 bytes"))
    }

    /// UVarint that must fit a platform length.
    pub fn uvarint_len(&mut self) -> Result<usize> {
        let val = self.uvarint()?;
        usize::try_from(val).map_err(|_| ProtocolError::malformed(format!("length {val} too large")))
    }

    pub fn raw_string(&mut self) -> Result<Bytes> {
        let len = self.uvarint_len()?;
        self.ensure(len)?;
        Ok(self.buf.copy_to_bytes(len))
    }

    pub fn string(&mut self) -> Result<String> {
        let raw = self.raw_string()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ProtocolError::malformed(format!("invalid UTF-8: {e}")))
    }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    /// Fill `dst` completely from the source.
    pub fn raw(&mut self, dst: &mut [u8]) -> Result<()> {
        self.ensure(dst.len())?;
        self.buf.copy_to_slice(dst);
        Ok(())
    }
}
