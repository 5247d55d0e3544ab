//! NTP server table, keyed by the server address.

use std::net::IpAddr;

use super::record::{format_time, Record, RecordTable, Seen};
use crate::dissect::ntp::NtpPacket;

/// Behaviour of one NTP server. Version, stratum and reference id are taken
/// from the first reply seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtpServerRecord {
    pub server: IpAddr,
    pub last_client: IpAddr,
    pub version: u8,
    pub stratum: u8,
    pub reference_id: u32,
    pub change: u64,
    pub seen: Seen,
}

impl Record for NtpServerRecord {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=NTP,ip={},count={},change={},client={},version={},stratum={},refid=0x{:x},ft={},lt={}",
            self.server,
            self.seen.count,
            self.change,
            self.last_client,
            self.version,
            self.stratum,
            self.reference_id,
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }
}

/// Thread-safe NTP server table.
#[derive(Default)]
pub struct NtpTable {
    records: RecordTable<IpAddr, NtpServerRecord>,
}

impl NtpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a server-mode reply from `server` to `client`.
    pub fn observe_reply(&self, server: IpAddr, client: IpAddr, pkt: &NtpPacket, now: i64) {
        self.records.observe(
            server,
            now,
            || NtpServerRecord {
                server,
                last_client: client,
                version: pkt.version,
                stratum: pkt.stratum,
                reference_id: pkt.reference_id,
                change: 0,
                seen: Seen::new(now),
            },
            |rec| {
                if rec.last_client != client {
                    rec.change += 1;
                    rec.last_client = client;
                }
            },
        );
    }

    pub fn get(&self, server: &IpAddr) -> Option<NtpServerRecord> {
        self.records.with(server, NtpServerRecord::clone)
    }

    pub fn records(&self) -> &RecordTable<IpAddr, NtpServerRecord> {
        &self.records
    }
}
