//! IP → MAC address bindings.
//!
//! Fed by ARP replies/requests, IPv6 neighbor/router advertisements and DHCP
//! acknowledgements. A DHCP-confirmed binding bumps a separate `dhcp` counter.

use std::net::IpAddr;

use super::record::{format_time, Record, RecordTable, Seen};
use crate::frame::MacAddr;

/// Binding state for one IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBinding {
    pub ip: IpAddr,
    pub mac: MacAddr,
    /// Number of times the observed MAC differed from the stored one.
    pub change: u64,
    /// Number of DHCP-confirmed observations.
    pub dhcp: u64,
    pub seen: Seen,
}

impl Record for AddressBinding {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=IPToMAC,ip={},mac={},count={},change={},dhcp={},ft={},lt={}",
            self.ip,
            self.mac,
            self.seen.count,
            self.change,
            self.dhcp,
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }
}

/// How a binding was learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// ARP or IPv6 neighbor discovery.
    Observed,
    /// DHCP acknowledgement.
    Dhcp,
}

/// Thread-safe address binding table. Keyed by IP.
#[derive(Default)]
pub struct AddressTable {
    records: RecordTable<IpAddr, AddressBinding>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `ip` was seen bound to `mac`.
    pub fn observe(&self, ip: IpAddr, mac: MacAddr, source: BindingSource, now: i64) {
        let dhcp = u64::from(source == BindingSource::Dhcp);
        self.records.observe(
            ip,
            now,
            || AddressBinding {
                ip,
                mac,
                change: 0,
                dhcp,
                seen: Seen::new(now),
            },
            |rec| {
                if rec.mac != mac {
                    rec.change += 1;
                    rec.mac = mac;
                }
                rec.dhcp += dhcp;
            },
        );
    }

    pub fn get(&self, ip: &IpAddr) -> Option<AddressBinding> {
        self.records.with(ip, AddressBinding::clone)
    }

    pub fn records(&self) -> &RecordTable<IpAddr, AddressBinding> {
        &self.records
    }
}
