//! TLS flow table.
//!
//! A flow is (client, server, service). Roles come from well-known service
//! ports since a single segment says nothing about who opened the
//! connection. Payloads are decoded with `tls-parser`; when that fails on a
//! fragmented ServerHello, [`tls_raw`](super::tls_raw) recovers the cipher
//! suite and TLS 1.3 signal for the flow already known.

use std::net::IpAddr;

use tls_parser::{parse_tls_plaintext, TlsMessage, TlsMessageHandshake, TlsPlaintext};

use super::record::{format_time, Record, RecordTable, Seen};
use super::tls_raw;
use crate::frame::Segment;
use crate::lookup::{self, OTHER_SERVICE, TLS13};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlsKey {
    pub client: IpAddr,
    pub server: IpAddr,
    pub service: &'static str,
}

impl TlsKey {
    /// Assign client/server roles to a segment by service port.
    ///
    /// Both ports known: the lower one is the server. One port known: that
    /// side is the server. Neither: service is `OTHER` and the higher port is
    /// the client.
    pub fn infer(seg: &Segment<'_>) -> Self {
        let src_service = lookup::tls_service(seg.src_port);
        let dst_service = lookup::tls_service(seg.dst_port);
        let server_is_src = match (src_service, dst_service) {
            (Some(_), Some(_)) => seg.src_port <= seg.dst_port,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => seg.src_port <= seg.dst_port,
        };
        let (client, server, service) = if server_is_src {
            (seg.dst, seg.src, src_service)
        } else {
            (seg.src, seg.dst, dst_service)
        };
        TlsKey {
            client,
            server,
            service: service.unwrap_or(OTHER_SERVICE),
        }
    }

    /// Key of the flow a server-sent segment belongs to.
    pub fn from_server(seg: &Segment<'_>) -> Self {
        TlsKey {
            client: seg.dst,
            server: seg.src,
            service: lookup::tls_service(seg.src_port).unwrap_or(OTHER_SERVICE),
        }
    }
}

/// What the strict decoder found in one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsObservation {
    /// ServerHello versions and ApplicationData record versions.
    pub versions: Vec<u16>,
    pub handshake: bool,
    pub alert: bool,
    pub server_hello_cipher: Option<u16>,
}

impl TlsObservation {
    fn absorb(&mut self, record: &TlsPlaintext<'_>) {
        for msg in &record.msg {
            match msg {
                TlsMessage::Handshake(hs) => {
                    self.handshake = true;
                    if let TlsMessageHandshake::ServerHello(sh) = hs {
                        self.versions.push(sh.version.0);
                        self.server_hello_cipher.get_or_insert(sh.cipher.0);
                    }
                }
                TlsMessage::Alert(_) => self.alert = true,
                _ => {}
            }
        }
    }
}

const RECORD_HEADER_LEN: usize = 5;

const CONTENT_CHANGE_CIPHER_SPEC: u8 = 20;
const CONTENT_ALERT: u8 = 21;
const CONTENT_HANDSHAKE: u8 = 22;
const CONTENT_APPLICATION_DATA: u8 = 23;
const CONTENT_HEARTBEAT: u8 = 24;

/// Cheap check that `b` starts with a TLS record header (content type 20..=24, major 3).
fn looks_like_record(b: &[u8]) -> bool {
    b.len() >= RECORD_HEADER_LEN
        && (CONTENT_CHANGE_CIPHER_SPEC..=CONTENT_HEARTBEAT).contains(&b[0])
        && b[1] == 3
}

/// Decode the TLS records at the start of `payload`.
///
/// Record headers are read directly; only plaintext control records go
/// through `tls-parser`. ApplicationData contributes its record version and
/// its body is skipped. Records are consumed until the first incomplete or
/// undecodable one. Returns `None` when not even the first record decodes.
pub fn decode_records(payload: &[u8]) -> Option<TlsObservation> {
    let mut obs = TlsObservation::default();
    let mut parsed = false;
    let mut rest = payload;
    while looks_like_record(rest) {
        let version = u16::from_be_bytes([rest[1], rest[2]]);
        let length = u16::from_be_bytes([rest[3], rest[4]]) as usize;
        let Some(record) = rest.get(..RECORD_HEADER_LEN + length) else {
            break;
        };
        match record[0] {
            CONTENT_APPLICATION_DATA => obs.versions.push(version),
            CONTENT_CHANGE_CIPHER_SPEC | CONTENT_ALERT | CONTENT_HANDSHAKE => {
                match parse_tls_plaintext(record) {
                    Ok((_, plaintext)) => obs.absorb(&plaintext),
                    Err(_) => break,
                }
            }
            _ => {}
        }
        parsed = true;
        rest = &rest[record.len()..];
    }
    parsed.then_some(obs)
}

/// Version range and handshake counters of one TLS flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFlowRecord {
    pub key: TlsKey,
    pub min_version: Option<u16>,
    pub max_version: Option<u16>,
    /// First cipher suite seen from the server; never replaced.
    pub cipher: Option<u16>,
    pub handshake: u64,
    pub alert: u64,
    pub seen: Seen,
}

impl TlsFlowRecord {
    fn new(key: TlsKey, now: i64) -> Self {
        Self {
            key,
            min_version: None,
            max_version: None,
            cipher: None,
            handshake: 0,
            alert: 0,
            seen: Seen::new(now),
        }
    }

    fn widen(&mut self, version: u16) {
        self.min_version = Some(self.min_version.map_or(version, |v| v.min(version)));
        self.max_version = Some(self.max_version.map_or(version, |v| v.max(version)));
    }

    /// Apply TLS 1.3 and cipher suite hints from server-sent handshake bytes.
    fn apply_server_hints(&mut self, payload: &[u8], parsed_cipher: Option<u16>) {
        if tls_raw::has_tls13_supported_versions(payload) {
            self.max_version = Some(TLS13);
        }
        if self.cipher.is_none() {
            self.cipher = parsed_cipher.or_else(|| tls_raw::server_hello_cipher(payload));
        }
    }

    fn apply(&mut self, obs: &TlsObservation, from_server: bool, payload: &[u8]) {
        for &v in &obs.versions {
            self.widen(v);
        }
        if obs.alert {
            self.alert += 1;
        }
        if obs.handshake {
            self.handshake += 1;
            if from_server {
                self.apply_server_hints(payload, obs.server_hello_cipher);
            }
        }
    }
}

impl Record for TlsFlowRecord {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=TLSFlow,cl={},sv={},serv={},count={},handshake={},alert={},minver={},maxver={},cipher={},ft={},lt={}",
            self.key.client,
            self.key.server,
            self.key.service,
            self.seen.count,
            self.handshake,
            self.alert,
            lookup::tls_version_name(self.min_version.unwrap_or(0)),
            lookup::tls_version_name(self.max_version.unwrap_or(0)),
            self.cipher.map_or("Unknown", lookup::cipher_suite_name),
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }

    /// Flows are held back until a version has been observed.
    fn reportable(&self) -> bool {
        self.min_version.is_some()
    }
}

/// Thread-safe TLS flow table.
#[derive(Default)]
pub struct TlsTable {
    records: RecordTable<TlsKey, TlsFlowRecord>,
}

impl TlsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one TCP segment with a non-empty payload.
    pub fn observe_segment(&self, seg: &Segment<'_>, now: i64) {
        match decode_records(seg.payload) {
            Some(obs) => self.observe(seg, &obs, now),
            None => {
                if tls_raw::looks_like_server_hello(seg.payload) {
                    self.apply_fallback(seg);
                }
            }
        }
    }

    /// Merge a decoded observation into its flow.
    pub fn observe(&self, seg: &Segment<'_>, obs: &TlsObservation, now: i64) {
        let key = TlsKey::infer(seg);
        let from_server = seg.src == key.server;
        self.records.observe(
            key,
            now,
            || {
                let mut rec = TlsFlowRecord::new(key, now);
                rec.apply(obs, from_server, seg.payload);
                rec
            },
            |rec| rec.apply(obs, from_server, seg.payload),
        );
    }

    /// Update an existing flow from an undecodable server segment.
    ///
    /// Does not count as an observation and never creates a flow.
    pub fn apply_fallback(&self, seg: &Segment<'_>) -> bool {
        let updated = self
            .records
            .update_existing(&TlsKey::from_server(seg), |rec| {
                rec.apply_server_hints(seg.payload, None)
            });
        if updated {
            tracing::debug!(server = %seg.src, "TLS fallback applied to fragmented ServerHello");
        }
        updated
    }

    pub fn get(&self, key: &TlsKey) -> Option<TlsFlowRecord> {
        self.records.with(key, TlsFlowRecord::clone)
    }

    pub fn records(&self) -> &RecordTable<TlsKey, TlsFlowRecord> {
        &self.records
    }
}
