//! RADIUS flow table, keyed by (server, client).
//!
//! RADIUS has no explicit role field, so direction is inferred from the code:
//! Access-Request and Accounting-Request travel client → server, everything
//! else is treated as a reply travelling server → client.

use std::net::IpAddr;

use super::record::{format_time, Record, RecordTable, Seen};
use crate::dissect::radius::code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RadiusKey {
    pub server: IpAddr,
    pub client: IpAddr,
}

impl RadiusKey {
    /// Assign server/client roles for a packet `src` → `dst` carrying `code`.
    pub fn infer(code: u8, src: IpAddr, dst: IpAddr) -> Self {
        match code {
            code::ACCESS_REQUEST | code::ACCOUNTING_REQUEST => RadiusKey {
                server: dst,
                client: src,
            },
            _ => RadiusKey {
                server: src,
                client: dst,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusFlowRecord {
    pub key: RadiusKey,
    pub access_request: u64,
    pub access_accept: u64,
    pub access_reject: u64,
    pub access_challenge: u64,
    pub seen: Seen,
}

impl RadiusFlowRecord {
    fn bump(&mut self, c: u8) {
        match c {
            code::ACCESS_REQUEST => self.access_request += 1,
            code::ACCESS_ACCEPT => self.access_accept += 1,
            code::ACCESS_REJECT => self.access_reject += 1,
            code::ACCESS_CHALLENGE => self.access_challenge += 1,
            // Accounting and unknown codes only count as observations.
            _ => {}
        }
    }
}

impl Record for RadiusFlowRecord {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=RADIUS,cl={},sv={},count={},req={},accept={},reject={},challenge={},ft={},lt={}",
            self.key.client,
            self.key.server,
            self.seen.count,
            self.access_request,
            self.access_accept,
            self.access_reject,
            self.access_challenge,
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }
}

/// Thread-safe RADIUS flow table.
#[derive(Default)]
pub struct RadiusTable {
    records: RecordTable<RadiusKey, RadiusFlowRecord>,
}

impl RadiusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one RADIUS packet `src` → `dst` with the given code.
    pub fn observe_packet(&self, c: u8, src: IpAddr, dst: IpAddr, now: i64) {
        let key = RadiusKey::infer(c, src, dst);
        self.records.observe(
            key,
            now,
            || {
                let mut rec = RadiusFlowRecord {
                    key,
                    access_request: 0,
                    access_accept: 0,
                    access_reject: 0,
                    access_challenge: 0,
                    seen: Seen::new(now),
                };
                rec.bump(c);
                rec
            },
            |rec| rec.bump(c),
        );
    }

    pub fn get(&self, key: &RadiusKey) -> Option<RadiusFlowRecord> {
        self.records.with(key, RadiusFlowRecord::clone)
    }

    pub fn records(&self) -> &RecordTable<RadiusKey, RadiusFlowRecord> {
        &self.records
    }
}
