//! Compression methods for framed data blocks

use chwire_core::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// zstd level used for [`Method::Zstd`]
pub const ZSTD_LEVEL: i32 = 3;

/// Compression method tag stored in each block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Method {
    None = 0x02,
    #[default]
    Lz4 = 0x82,
    Zstd = 0x90,
}

impl Method {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Method::None),
            0x82 => Some(Method::Lz4),
            0x90 => Some(Method::Zstd),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::None => "none",
            Method::Lz4 => "lz4",
            Method::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Method::None),
            "lz4" => Ok(Method::Lz4),
            "zstd" => Ok(Method::Zstd),
            other => Err(format!("unknown compression method {other:?}")),
        }
    }
}

/// Compress data using the specified method
pub fn compress(data: &[u8], method: Method) -> Result<Vec<u8>> {
    match method {
        Method::None => Ok(data.to_vec()),
        Method::Lz4 => Ok(lz4_flex::block::compress(data)),
        Method::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)
            .map_err(|e| ProtocolError::compression(format!("zstd: {e}"))),
    }
}

/// Decompress data using the specified method
///
/// The result must be exactly `expected_len` bytes long.
pub fn decompress(data: &[u8], method: Method, expected_len: usize) -> Result<Vec<u8>> {
    let out = match method {
        Method::None => data.to_vec(),
        Method::Lz4 => {
            let mut out = vec![0u8; expected_len];
            let n = lz4_flex::block::decompress_into(data, &mut out)
                .map_err(|e| ProtocolError::compression(format!("lz4: {e}")))?;
            out.truncate(n);
            out
        }
        Method::Zstd => zstd::bulk::decompress(data, expected_len)
            .map_err(|e| ProtocolError::compression(format!("zstd: {e}")))?,
    };

    if out.len() != expected_len {
        return Err(ProtocolError::malformed(format!(
            "decompressed {} bytes, header says {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chwire_core::ErrorKind;

    const ORIGINAL: &[u8] = b"Hello, World! This is a test of the compression system. Hello, World!";

    #[test]
    fn test_lz4_roundtrip() {
        let compressed = compress(ORIGINAL, Method::Lz4).unwrap();
        let decompressed = decompress(&compressed, Method::Lz4, ORIGINAL.len()).unwrap();
        assert_eq!(ORIGINAL, &decompressed[..]);
    }

    #[test]
    fn test_zstd_roundtrip() {
        let compressed = compress(ORIGINAL, Method::Zstd).unwrap();
        let decompressed = decompress(&compressed, Method::Zstd, ORIGINAL.len()).unwrap();
        assert_eq!(ORIGINAL, &decompressed[..]);
    }

    #[test]
    fn test_none_roundtrip() {
        let compressed = compress(ORIGINAL, Method::None).unwrap();
        assert_eq!(ORIGINAL, &compressed[..]);

        let decompressed = decompress(&compressed, Method::None, ORIGINAL.len()).unwrap();
        assert_eq!(ORIGINAL, &decompressed[..]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = decompress(ORIGINAL, Method::None, ORIGINAL.len() + 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedField(_)));
    }

    #[test]
    fn test_method_tags() {
        for m in [Method::None, Method::Lz4, Method::Zstd] {
            assert_eq!(Method::from_u8(m.as_u8()), Some(m));
            assert_eq!(m.as_str().parse::<Method>(), Ok(m));
        }
        assert_eq!(Method::from_u8(0x00), None);
        assert!("gzip".parse::<Method>().is_err());
    }
}
