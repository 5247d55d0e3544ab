//! Core logic: observation tables, frame classification and reporting.
//!
//! - [`Engine`]: the context object holding every table and the packet counter
//! - [`classifier`]: per-frame dispatch into the tables
//! - [`report`]: sweep, stats line and the single-flight report scheduler
//! - [`record`]: bookkeeping shared by all tables
//! - [`tls_raw`]: byte-offset ServerHello parser used when strict decoding fails

use std::sync::atomic::{AtomicU64, Ordering};

pub mod address;
pub mod classifier;
pub mod dhcp;
pub mod dns;
pub mod ether;
pub mod ntp;
pub mod radius;
pub mod record;
pub mod report;
pub mod tls;
pub mod tls_raw;

pub use address::{AddressTable, BindingSource};
pub use dhcp::DhcpTable;
pub use dns::DnsTable;
pub use ether::EtherTypeHistogram;
pub use ntp::NtpTable;
pub use radius::RadiusTable;
pub use record::ReportPolicy;
pub use report::ReportScheduler;
pub use tls::TlsTable;

/// All observation state of one sensor. Built once at startup and shared via `Arc`.
#[derive(Default)]
pub struct Engine {
    pub addresses: AddressTable,
    pub ether_types: EtherTypeHistogram,
    pub dns: DnsTable,
    pub ntp: NtpTable,
    pub dhcp: DhcpTable,
    pub radius: RadiusTable,
    pub tls: TlsTable,
    packets: AtomicU64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one captured frame.
    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames seen since startup.
    pub fn packet_count(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Decode and classify one raw Ethernet frame captured at `now`.
    pub fn process_frame(&self, data: &[u8], now: i64) {
        self.record_packet();
        if let Some(frame) = crate::frame::decode_frame(data) {
            classifier::classify(self, &frame, now);
        }
    }
}
