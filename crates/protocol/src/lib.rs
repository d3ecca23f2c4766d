//! # chwire Protocol Library
//!
//! Wire-level core of a native-protocol database client: revision-aware
//! message codecs and checksummed compression framing.
//!
//! ## Architecture
//!
//! ### 1. Codecs Layer ([`codecs`])
//! Primitive encoders and decoders every message is built from:
//! - UVarint: unsigned LEB128
//! - String: UVarint length followed by raw bytes
//! - Bool: single byte
//! - Int64/UInt64: 8 bytes little-endian
//!
//! ### 2. Feature Gate ([`feature`])
//! The table of protocol features and the revision each appeared at. Codecs
//! ask a [`Feature`] whether it is active instead of comparing revisions.
//!
//! ### 3. Messages ([`packets`], [`setting`], [`client_info`], [`query`])
//! The client query packet with its settings list and client info block.
//!
//! ### 4. Compression ([`compression`], [`framing`])
//! LZ4/ZSTD transforms and the checksummed block format wrapped around them.
//!
//! ## Usage Example
//!
//! ```rust
//! use chwire_protocol::{Query, Setting, Revision, Writer, Method, framing};
//!
//! let mut query = Query::new("q-1", "SELECT 1");
//! query.settings.push(Setting::new("max_threads", "4"));
//!
//! let packet = query.to_bytes(Revision::LATEST);
//! let block = Writer::new(Method::Lz4).compress(&packet).unwrap();
//! assert_eq!(framing::decompress(&block).unwrap(), &packet[..]);
//! ```

pub mod codecs;
pub mod feature;
pub mod packets;
pub mod setting;
pub mod client_info;
pub mod query;
pub mod compression;
pub mod framing;

// Re-export commonly used items
pub use chwire_core::{ErrorKind, ProtocolError, Result, Revision};
pub use codecs::{AwareDecode, AwareEncode, Buffer, Encode, Reader};
pub use feature::Feature;
pub use packets::*;
pub use setting::Setting;
pub use client_info::*;
pub use query::Query;
pub use compression::Method;
pub use framing::Writer;
