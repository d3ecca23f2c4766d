//! # Query Packet
//!
//! The client's query request, encoded revision-aware.
//!
//! # Packet Format
//! ```text
//! {UVARINT ClientCode::Query}
//! {STRING id}
//! [{CLIENT_INFO}]                               -- ClientWriteInfo
//! {SETTING}*{STRING ""}                          -- settings, then sentinel
//! [{STRING secret}]                             -- InterServerSecret
//! {UVARINT stage}{UVARINT compression}
//! {STRING body}
//! ```
//!
//! The leading code is written by [`Query::encode_aware`] but not read by
//! [`Query::decode_aware`]: the receiver reads it to pick the decoder.
//!
//! Encoding always sends [`Stage::Complete`], whatever `stage` holds. A client
//! asks for the final result; decoding still accepts any known stage.

use bytes::Buf;
use chwire_core::{Result, ResultExt, Revision};
use serde::{Deserialize, Serialize};

use super::client_info::ClientInfo;
use super::codecs::{AwareDecode, AwareEncode, Buffer, Reader};
use super::feature::Feature;
use super::packets::{ClientCode, Compression, Stage};
use super::setting::{decode_settings, encode_settings, Setting};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub body: String,
    /// Inter-server secret; empty for ordinary clients
    pub secret: String,
    pub stage: Stage,
    pub compression: Compression,
    pub info: ClientInfo,
    pub settings: Vec<Setting>,
}

impl Query {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self { id: id.into(), body: body.into(), ..Default::default() }
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self, revision: Revision) -> bytes::Bytes {
        let mut buf = Buffer::new();
        self.encode_aware(&mut buf, revision);
        buf.into_bytes()
    }
}

impl AwareEncode for Query {
    fn encode_aware(&self, b: &mut Buffer, revision: Revision) {
        b.put(&ClientCode::Query);
        b.put_string(&self.id);
        if Feature::CLIENT_WRITE_INFO.active(revision) {
            b.put_aware(&self.info, revision);
        }
        if Feature::SETTINGS_SERIALIZED_AS_STRINGS.active(revision) {
            encode_settings(b, &self.settings);
        } else {
            Setting::encode_terminator(b);
        }
        if Feature::INTER_SERVER_SECRET.active(revision) {
            b.put_string(&self.secret);
        }
        b.put(&Stage::Complete);
        b.put(&self.compression);
        b.put_string(&self.body);
    }
}

impl AwareDecode for Query {
    fn decode_aware<B: Buf>(r: &mut Reader<B>, revision: Revision) -> Result<Self> {
        tracing::trace!(%revision, "decoding query");

        let id = r.string().field("query id")?;
        let info = if Feature::CLIENT_WRITE_INFO.active(revision) {
            r.get_aware::<ClientInfo>(revision).field("client info")?
        } else {
            ClientInfo::default()
        };

        if let Err(e) = Feature::SETTINGS_SERIALIZED_AS_STRINGS.require(revision) {
            tracing::trace!(%revision, "query settings format not supported");
            return Err(e.context("settings"));
        }
        let settings = decode_settings(r).field("settings")?;

        let secret = if Feature::INTER_SERVER_SECRET.active(revision) {
            r.string().field("secret")?
        } else {
            String::new()
        };

        let stage = Stage::decode(r).field("stage")?;
        let compression = Compression::decode(r).field("compression")?;
        let body = r.string().field("query body")?;

        Ok(Query { id, body, secret, stage, compression, info, settings })
    }
}
