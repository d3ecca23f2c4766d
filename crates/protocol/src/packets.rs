//! # Native Protocol Enumerations
//!
//! Closed sets of codes that travel as UVarints: the message-kind tag a
//! client puts in front of every packet, the query processing stage, and the
//! query compression flag. Decoding any of them rejects values outside the set.
//!
//! ## Naming
//!
//! - `ClientCode` = packet kind sent by the client
//! - `Stage` = how far the server should take a query before replying
//! - `Compression` = whether data blocks of a query are framed compressed

use bytes::Buf;
use chwire_core::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

use super::codecs::{Buffer, Encode, Reader};

/// Message-kind tag of a client-to-server packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClientCode {
    /// Handshake: client name, version, default database, credentials
    Hello = 0,

    /// Query request (see [`crate::Query`])
    Query = 1,

    /// Data block, e.g. rows for INSERT or external tables
    Data = 2,

    /// Cancel the running query
    Cancel = 3,

    /// Liveness check, answered with Pong
    Ping = 4,

    /// Replica status request
    TablesStatusRequest = 5,
}

impl ClientCode {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(ClientCode::Hello),
            1 => Some(ClientCode::Query),
            2 => Some(ClientCode::Data),
            3 => Some(ClientCode::Cancel),
            4 => Some(ClientCode::Ping),
            5 => Some(ClientCode::TablesStatusRequest),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    pub fn decode<B: Buf>(r: &mut Reader<B>) -> Result<Self> {
        let v = r.uvarint()?;
        Self::from_u64(v).ok_or_else(|| ProtocolError::malformed(format!("unknown client code {v}")))
    }
}

impl Encode for ClientCode {
    fn encode(&self, buf: &mut Buffer) {
        buf.put_uvarint(self.as_u64());
    }
}

/// Query processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    /// Only read the requested columns
    FetchColumns = 0,

    /// Stop at an intermediate state that can be merged
    WithMergeableState = 1,

    /// Run to the final result
    #[default]
    Complete = 2,

    WithMergeableStateAfterAggregation = 3,

    WithMergeableStateAfterAggregationAndLimit = 4,
}

impl Stage {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Stage::FetchColumns),
            1 => Some(Stage::WithMergeableState),
            2 => Some(Stage::Complete),
            3 => Some(Stage::WithMergeableStateAfterAggregation),
            4 => Some(Stage::WithMergeableStateAfterAggregationAndLimit),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    pub fn decode<B: Buf>(r: &mut Reader<B>) -> Result<Self> {
        let v = r.uvarint()?;
        Self::from_u64(v).ok_or_else(|| ProtocolError::malformed(format!("unknown stage {v}")))
    }
}

impl Encode for Stage {
    fn encode(&self, buf: &mut Buffer) {
        buf.put_uvarint(self.as_u64());
    }
}

/// Whether the data blocks of a query are sent compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Compression {
    #[default]
    Disabled = 0,
    Enabled = 1,
}

impl Compression {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Compression::Disabled),
            1 => Some(Compression::Enabled),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    pub fn decode<B: Buf>(r: &mut Reader<B>) -> Result<Self> {
        let v = r.uvarint()?;
        Self::from_u64(v)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown compression {v}")))
    }
}

impl Encode for Compression {
    fn encode(&self, buf: &mut Buffer) {
        buf.put_uvarint(self.as_u64());
    }
}
