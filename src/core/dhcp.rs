//! DHCP server table, keyed by the replying server address.

use std::net::IpAddr;

use super::record::{format_time, Record, RecordTable, Seen};

/// Reply subtype counted by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpReply {
    Offer,
    Ack,
    Nak,
}

impl DhcpReply {
    /// Map a DHCP message type (option 53) to a counted reply.
    pub fn from_message_type(mt: u8) -> Option<Self> {
        use crate::dissect::dhcp::msg_type;
        match mt {
            msg_type::OFFER => Some(DhcpReply::Offer),
            msg_type::ACK => Some(DhcpReply::Ack),
            msg_type::NAK => Some(DhcpReply::Nak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpServerRecord {
    pub server: IpAddr,
    pub offer: u64,
    pub ack: u64,
    pub nak: u64,
    pub seen: Seen,
}

impl DhcpServerRecord {
    fn bump(&mut self, reply: DhcpReply) {
        match reply {
            DhcpReply::Offer => self.offer += 1,
            DhcpReply::Ack => self.ack += 1,
            DhcpReply::Nak => self.nak += 1,
        }
    }
}

impl Record for DhcpServerRecord {
    fn seen(&self) -> &Seen {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut Seen {
        &mut self.seen
    }

    fn render(&self) -> String {
        format!(
            "type=DHCP,sv={},count={},offer={},ack={},nak={},ft={},lt={}",
            self.server,
            self.seen.count,
            self.offer,
            self.ack,
            self.nak,
            format_time(self.seen.first_time),
            format_time(self.seen.last_time),
        )
    }
}

/// Thread-safe DHCP server table.
#[derive(Default)]
pub struct DhcpTable {
    records: RecordTable<IpAddr, DhcpServerRecord>,
}

impl DhcpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_reply(&self, server: IpAddr, reply: DhcpReply, now: i64) {
        self.records.observe(
            server,
            now,
            || {
                let mut rec = DhcpServerRecord {
                    server,
                    offer: 0,
                    ack: 0,
                    nak: 0,
                    seen: Seen::new(now),
                };
                rec.bump(reply);
                rec
            },
            |rec| rec.bump(reply),
        );
    }

    pub fn get(&self, server: &IpAddr) -> Option<DhcpServerRecord> {
        self.records.with(server, DhcpServerRecord::clone)
    }

    pub fn records(&self) -> &RecordTable<IpAddr, DhcpServerRecord> {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_counters() {
        let table = DhcpTable::new();
        let server: IpAddr = "10.0.0.1".parse().unwrap();
        table.observe_reply(server, DhcpReply::Offer, 1);
        table.observe_reply(server, DhcpReply::Ack, 2);
        table.observe_reply(server, DhcpReply::Ack, 3);
        table.observe_reply(server, DhcpReply::Nak, 4);
        let rec = table.get(&server).unwrap();
        assert_eq!(rec.seen.count, 4);
        assert_eq!((rec.offer, rec.ack, rec.nak), (1, 2, 1));
    }

    #[test]
    fn test_message_type_mapping() {
        assert_eq!(DhcpReply::from_message_type(2), Some(DhcpReply::Offer));
        assert_eq!(DhcpReply::from_message_type(5), Some(DhcpReply::Ack));
        assert_eq!(DhcpReply::from_message_type(6), Some(DhcpReply::Nak));
        assert_eq!(DhcpReply::from_message_type(1), None);
        assert_eq!(DhcpReply::from_message_type(8), None);
    }

    #[test]
    fn test_render_line() {
        let table = DhcpTable::new();
        let server: IpAddr = "10.0.0.1".parse().unwrap();
        table.observe_reply(server, DhcpReply::Offer, 0);
        assert!(table
            .get(&server)
            .unwrap()
            .render()
            .starts_with("type=DHCP,sv=10.0.0.1,count=1,offer=1,ack=0,nak=0,ft="));
    }
}
