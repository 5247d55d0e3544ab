//! DNS query table.
//!
//! Keyed by (resolver, query type, query name); the resolver is the
//! destination of the query. Responses and non-QUERY opcodes are ignored.

use std::net::IpAddr;

use super::record::{escape_value, format_time, Record, RecordTable, Seen};
use crate::frame::MacAddr;
use crate::lookup;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsKey {
    pub resolver: IpAddr,
    pub qtype: u16,
    pub name: String,
}

/// Aggregated queries for one (resolver, type, name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQueryRecord {
    pub resolver: IpAddr,
    pub type_name: &'static str,
    pub name: String,
    pub last_client: IpAddr,
    pub last_mac: MacAddr,
    /// Number of times the querying client (IP or MAC) differed from the stored one.
    pub change: u64,
    pub seen: Seen,
}

impl Record for DnsQueryRecord {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=DNS,sv={},DNSType={},Name={},count={},change={},lcl={},lMAC={},ft={},lt={}",
            self.resolver,
            self.type_name,
            escape_value(&self.name),
            self.seen.count,
            self.change,
            self.last_client,
            self.last_mac,
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }
}

/// Thread-safe DNS query table.
#[derive(Default)]
pub struct DnsTable {
    records: RecordTable<DnsKey, DnsQueryRecord>,
}

impl DnsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one question of a query sent by `client`/`mac` to `resolver`.
    pub fn observe_query(
        &self,
        resolver: IpAddr,
        client: IpAddr,
        mac: MacAddr,
        qtype: u16,
        name: &str,
        now: i64,
    ) {
        let key = DnsKey {
            resolver,
            qtype,
            name: name.to_string(),
        };
        self.records.observe(
            key,
            now,
            || DnsQueryRecord {
                resolver,
                type_name: lookup::dns_type_name(qtype),
                name: name.to_string(),
                last_client: client,
                last_mac: mac,
                change: 0,
                seen: Seen::new(now),
            },
            |rec| {
                if rec.last_client != client || rec.last_mac != mac {
                    rec.change += 1;
                    rec.last_client = client;
                    rec.last_mac = mac;
                }
            },
        );
    }

    pub fn get(&self, key: &DnsKey) -> Option<DnsQueryRecord> {
        self.records.with(key, DnsQueryRecord::clone)
    }

    pub fn records(&self) -> &RecordTable<DnsKey, DnsQueryRecord> {
        &self.records
    }
}
