//! # Client Info
//!
//! Describes who issued a query and through which interface. Sent inside the
//! query packet once `ClientWriteInfo` is active; its own layout grows with
//! the revision.
//!
//! # Wire Format
//! ```text
//! {u8 kind}                                   -- kind None ends the structure
//! {STRING initial_user}{STRING initial_query_id}{STRING initial_address}
//! [{INT64 initial_time_us}]                   -- QueryStartTime
//! {u8 interface}
//!   TCP:  {STRING os_user}{STRING hostname}{STRING client_name}
//!         {UVARINT major}{UVARINT minor}{UVARINT protocol_revision}
//!   HTTP: {u8 http_method}{STRING user_agent}
//!         [{STRING forwarded_for}]            -- XForwardedForInClientInfo
//!         [{STRING referer}]                  -- RefererInClientInfo
//! [{STRING quota_key}]                        -- QuotaKeyInClientInfo
//! [{UVARINT distributed_depth}]               -- DistributedDepth
//! [{UVARINT patch}]                           -- VersionPatch, TCP only
//! [{u8 0} | {u8 1}{16 trace_id}{u64 span_id}{STRING state}{u8 flags}]  -- OpenTelemetry
//! [{UVARINT collaborate}{UVARINT replicas}{UVARINT replica}]           -- ParallelReplicas
//! ```

use bytes::Buf;
use chwire_core::{ProtocolError, Result, ResultExt, Revision};
use serde::{Deserialize, Serialize};

use super::codecs::{AwareDecode, AwareEncode, Buffer, Reader};
use super::feature::Feature;

/// Whether the query was started by a user or fanned out by another server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QueryKind {
    None = 0,
    #[default]
    Initial = 1,
    Secondary = 2,
}

impl QueryKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(QueryKind::None),
            1 => Some(QueryKind::Initial),
            2 => Some(QueryKind::Secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Interface {
    #[default]
    Tcp = 1,
    Http = 2,
}

impl Interface {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Interface::Tcp),
            2 => Some(Interface::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum HttpMethod {
    #[default]
    Unknown = 0,
    Get = 1,
    Post = 2,
}

impl HttpMethod {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(HttpMethod::Unknown),
            1 => Some(HttpMethod::Get),
            2 => Some(HttpMethod::Post),
            _ => None,
        }
    }
}

/// OpenTelemetry span the query runs under
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: [u8; 16],
    pub span_id: u64,
    pub trace_state: String,
    pub trace_flags: u8,
}

/// HTTP-only part of [`ClientInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpInfo {
    pub method: HttpMethod,
    pub user_agent: String,
    pub forwarded_for: String,
    pub referer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub kind: QueryKind,
    pub initial_user: String,
    pub initial_query_id: String,
    pub initial_address: String,
    /// Start of the initial query, microseconds since the Unix epoch
    pub initial_time: i64,
    pub interface: Interface,

    pub os_user: String,
    pub hostname: String,
    pub client_name: String,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub protocol_revision: u64,

    pub http: HttpInfo,

    pub quota_key: String,
    pub distributed_depth: u64,
    pub trace: Option<TraceContext>,

    pub collaborate_with_initiator: bool,
    pub count_participating_replicas: u64,
    pub number_of_current_replica: u64,
}

impl AwareEncode for ClientInfo {
    fn encode_aware(&self, b: &mut Buffer, revision: Revision) {
        b.put_u8(self.kind as u8);
        if self.kind == QueryKind::None {
            return;
        }
        b.put_string(&self.initial_user);
        b.put_string(&self.initial_query_id);
        b.put_string(&self.initial_address);
        if Feature::QUERY_START_TIME.active(revision) {
            b.put_i64(self.initial_time);
        }

        b.put_u8(self.interface as u8);
        match self.interface {
            Interface::Tcp => {
                b.put_string(&self.os_user);
                b.put_string(&self.hostname);
                b.put_string(&self.client_name);
                b.put_uvarint(self.major);
                b.put_uvarint(self.minor);
                b.put_uvarint(self.protocol_revision);
            }
            Interface::Http => {
                b.put_u8(self.http.method as u8);
                b.put_string(&self.http.user_agent);
                if Feature::X_FORWARDED_FOR_IN_CLIENT_INFO.active(revision) {
                    b.put_string(&self.http.forwarded_for);
                }
                if Feature::REFERER_IN_CLIENT_INFO.active(revision) {
                    b.put_string(&self.http.referer);
                }
            }
        }

        if Feature::QUOTA_KEY_IN_CLIENT_INFO.active(revision) {
            b.put_string(&self.quota_key);
        }
        if Feature::DISTRIBUTED_DEPTH.active(revision) {
            b.put_uvarint(self.distributed_depth);
        }
        if Feature::VERSION_PATCH.active(revision) && self.interface == Interface::Tcp {
            b.put_uvarint(self.patch);
        }
        if Feature::OPEN_TELEMETRY.active(revision) {
            match &self.trace {
                Some(t) => {
                    b.put_u8(1);
                    b.put_raw(&t.trace_id);
                    b.put_u64(t.span_id);
                    b.put_string(&t.trace_state);
                    b.put_u8(t.trace_flags);
                }
                None => b.put_u8(0),
            }
        }
        if Feature::PARALLEL_REPLICAS.active(revision) {
            b.put_uvarint(self.collaborate_with_initiator as u64);
            b.put_uvarint(self.count_participating_replicas);
            b.put_uvarint(self.number_of_current_replica);
        }
    }
}

impl AwareDecode for ClientInfo {
    fn decode_aware<B: Buf>(r: &mut Reader<B>, revision: Revision) -> Result<Self> {
        let mut info = ClientInfo::default();

        let kind = r.u8().field("query kind")?;
        info.kind = QueryKind::from_u8(kind)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown query kind {kind}")))
            .field("query kind")?;
        if info.kind == QueryKind::None {
            return Ok(info);
        }

        info.initial_user = r.string().field("initial user")?;
        info.initial_query_id = r.string().field("initial query id")?;
        info.initial_address = r.string().field("initial address")?;
        if Feature::QUERY_START_TIME.active(revision) {
            info.initial_time = r.i64().field("initial time")?;
        }

        let iface = r.u8().field("interface")?;
        info.interface = Interface::from_u8(iface)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown interface {iface}")))
            .field("interface")?;
        match info.interface {
            Interface::Tcp => {
                info.os_user = r.string().field("os user")?;
                info.hostname = r.string().field("hostname")?;
                info.client_name = r.string().field("client name")?;
                info.major = r.uvarint().field("major version")?;
                info.minor = r.uvarint().field("minor version")?;
                info.protocol_revision = r.uvarint().field("protocol revision")?;
            }
            Interface::Http => {
                let method = r.u8().field("http method")?;
                info.http.method = HttpMethod::from_u8(method)
                    .ok_or_else(|| ProtocolError::malformed(format!("unknown http method {method}")))
                    .field("http method")?;
                info.http.user_agent = r.string().field("user agent")?;
                if Feature::X_FORWARDED_FOR_IN_CLIENT_INFO.active(revision) {
                    info.http.forwarded_for = r.string().field("forwarded for")?;
                }
                if Feature::REFERER_IN_CLIENT_INFO.active(revision) {
                    info.http.referer = r.string().field("referer")?;
                }
            }
        }

        if Feature::QUOTA_KEY_IN_CLIENT_INFO.active(revision) {
            info.quota_key = r.string().field("quota key")?;
        }
        if Feature::DISTRIBUTED_DEPTH.active(revision) {
            info.distributed_depth = r.uvarint().field("distributed depth")?;
        }
        if Feature::VERSION_PATCH.active(revision) && info.interface == Interface::Tcp {
            info.patch = r.uvarint().field("patch version")?;
        }
        if Feature::OPEN_TELEMETRY.active(revision) && r.bool().field("trace present")? {
            let mut t = TraceContext::default();
            r.raw(&mut t.trace_id).field("trace id")?;
            t.span_id = r.u64().field("span id")?;
            t.trace_state = r.string().field("trace state")?;
            t.trace_flags = r.u8().field("trace flags")?;
            info.trace = Some(t);
        }
        if Feature::PARALLEL_REPLICAS.active(revision) {
            info.collaborate_with_initiator = r.uvarint().field("collaborate with initiator")? != 0;
            info.count_participating_replicas = r.uvarint().field("participating replicas")?;
            info.number_of_current_replica = r.uvarint().field("current replica")?;
        }

        Ok(info)
    }
}
