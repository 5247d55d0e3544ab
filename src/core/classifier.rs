//! Per-frame dispatch into the observation tables.
//!
//! Stateless: everything it learns goes into the [`Engine`] tables.

use crate::dissect::{dhcp, dns, ntp, radius};
use crate::frame::{
    Frame, Layer, MacAddr, Segment, ICMPV6_NEIGHBOR_ADVERTISEMENT, ICMPV6_ROUTER_ADVERTISEMENT,
};

use super::address::BindingSource;
use super::dhcp::DhcpReply;
use super::Engine;

/// Apply one decoded frame to the engine tables.
pub fn classify(engine: &Engine, frame: &Frame<'_>, now: i64) {
    engine.ether_types.observe(frame.ether_type);

    match frame.layer {
        Layer::Arp(arp) => {
            if let Some((ip, mac)) = arp.ipv4_binding() {
                engine
                    .addresses
                    .observe(ip, mac, BindingSource::Observed, now);
            }
        }
        Layer::Icmpv6 { src, icmp_type } => {
            if icmp_type == ICMPV6_NEIGHBOR_ADVERTISEMENT
                || icmp_type == ICMPV6_ROUTER_ADVERTISEMENT
            {
                engine
                    .addresses
                    .observe(src, frame.src_mac, BindingSource::Observed, now);
            }
        }
        Layer::Udp(seg) => classify_udp(engine, frame.src_mac, &seg, now),
        Layer::Tcp(seg) => {
            if !seg.payload.is_empty() {
                engine.tls.observe_segment(&seg, now);
            }
        }
        Layer::Other => {}
    }
}

/// Each UDP protocol is tried on its own ports; a datagram may feed several.
fn classify_udp(engine: &Engine, src_mac: MacAddr, seg: &Segment<'_>, now: i64) {
    if seg.uses_port(dns::DNS_PORTS) {
        if let Some(msg) = dns::parse(seg.payload) {
            if msg.is_query() {
                for q in &msg.questions {
                    engine
                        .dns
                        .observe_query(seg.dst, seg.src, src_mac, q.qtype, &q.name, now);
                }
            }
        }
    }

    if seg.uses_port(&[ntp::NTP_PORT]) {
        if let Some(pkt) = ntp::parse(seg.payload) {
            if pkt.mode == ntp::MODE_SERVER {
                engine.ntp.observe_reply(seg.src, seg.dst, &pkt, now);
            }
        }
    }

    if seg.uses_port(&[dhcp::DHCP_SERVER_PORT, dhcp::DHCP_CLIENT_PORT]) {
        if let Some(msg) = dhcp::parse(seg.payload) {
            observe_dhcp(engine, seg, &msg, now);
        }
    }

    if seg.uses_port(radius::RADIUS_PORTS) {
        if let Some(pkt) = radius::parse(seg.payload) {
            engine.radius.observe_packet(pkt.code, seg.src, seg.dst, now);
        }
    }
}

fn observe_dhcp(engine: &Engine, seg: &Segment<'_>, msg: &dhcp::DhcpMessage, now: i64) {
    if msg.op != dhcp::OP_REPLY {
        return;
    }
    let Some(reply) = msg.message_type.and_then(DhcpReply::from_message_type) else {
        return;
    };
    engine.dhcp.observe_reply(seg.src, reply, now);

    if reply == DhcpReply::Ack && !msg.your_ip.is_unspecified() && msg.hw_len == 6 {
        if let Some(mac) = MacAddr::from_slice(&msg.client_hw) {
            engine
                .addresses
                .observe(msg.your_ip.into(), mac, BindingSource::Dhcp, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::*;
    use crate::core::dns::DnsKey;
    use crate::core::radius::RadiusKey;
    use crate::core::tls::TlsKey;
    use crate::core::tls_raw::{build_server_hello, TLS13_EXT};
    use crate::dissect::dhcp::{build_reply, msg_type};
    use crate::dissect::dns::build_query;
    use crate::dissect::ntp::build_packet as build_ntp;
    use crate::dissect::radius::{build_packet as build_radius, code};
    use crate::frame::test_frames::{self, CLIENT_MAC, SERVER_MAC};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_arp_reply_binds_address() {
        let engine = Engine::new();
        let frame = test_frames::arp_reply(CLIENT_MAC, [10, 0, 0, 2]);
        engine.process_frame(&frame, 100);

        let rec = engine.addresses.get(&ip("10.0.0.2")).unwrap();
        assert_eq!(rec.mac, MacAddr(CLIENT_MAC));
        assert_eq!(rec.seen.count, 1);
        assert_eq!(rec.change, 0);
        assert_eq!(engine.ether_types.get(0x0806), 1);

        let moved = test_frames::arp_reply(SERVER_MAC, [10, 0, 0, 2]);
        engine.process_frame(&moved, 101);
        let rec = engine.addresses.get(&ip("10.0.0.2")).unwrap();
        assert_eq!(rec.mac, MacAddr(SERVER_MAC));
        assert_eq!((rec.seen.count, rec.change), (2, 1));
    }

    #[test]
    fn test_vlan_tagged_arp_binds_address() {
        let engine = Engine::new();
        let frame = test_frames::vlan_tagged(&test_frames::arp_reply(CLIENT_MAC, [10, 0, 0, 7]), 100);
        engine.process_frame(&frame, 100);

        let rec = engine.addresses.get(&ip("10.0.0.7")).unwrap();
        assert_eq!(rec.mac, MacAddr(CLIENT_MAC));
        assert_eq!(rec.seen.count, 1);
        assert_eq!(engine.ether_types.get(0x8100), 1);
    }

    #[test]
    fn test_dns_queries_from_same_then_new_client() {
        let engine = Engine::new();
        let query = build_query(7, "example.com", 1);
        for t in 0..3 {
            let f = test_frames::udp4(CLIENT_MAC, [10, 0, 0, 2], [10, 0, 0, 53], 40000, 53, &query);
            engine.process_frame(&f, t);
        }
        let key = DnsKey {
            resolver: ip("10.0.0.53"),
            qtype: 1,
            name: "example.com".into(),
        };
        let rec = engine.dns.get(&key).unwrap();
        assert_eq!((rec.seen.count, rec.change), (3, 0));

        let f = test_frames::udp4(CLIENT_MAC, [10, 0, 0, 3], [10, 0, 0, 53], 40000, 53, &query);
        engine.process_frame(&f, 4);
        let rec = engine.dns.get(&key).unwrap();
        assert_eq!((rec.seen.count, rec.change), (4, 1));
        assert_eq!(rec.last_client, ip("10.0.0.3"));
    }

    #[test]
    fn test_dns_response_is_ignored() {
        let engine = Engine::new();
        let mut resp = build_query(7, "example.com", 1);
        resp[2] |= 0x80;
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 53], [10, 0, 0, 2], 53, 40000, &resp);
        engine.process_frame(&f, 1);
        assert!(engine.dns.records().is_empty());
        assert_eq!(engine.ether_types.get(0x0800), 1);
    }

    #[test]
    fn test_ntp_server_mode_only() {
        let engine = Engine::new();
        let client = build_ntp(4, 3, 0, 0);
        let f = test_frames::udp4(CLIENT_MAC, [10, 0, 0, 2], [10, 0, 0, 123], 123, 123, &client);
        engine.process_frame(&f, 1);
        assert!(engine.ntp.records().is_empty());

        let reply = build_ntp(4, 4, 2, 0x0a00_0001);
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 123], [10, 0, 0, 2], 123, 123, &reply);
        engine.process_frame(&f, 2);
        let rec = engine.ntp.get(&ip("10.0.0.123")).unwrap();
        assert_eq!(rec.stratum, 2);
        assert_eq!(rec.last_client, ip("10.0.0.2"));
    }

    #[test]
    fn test_dhcp_ack_feeds_server_and_binding() {
        let engine = Engine::new();
        let ack = build_reply(msg_type::ACK, [10, 0, 0, 50], CLIENT_MAC);
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 1], [255, 255, 255, 255], 67, 68, &ack);
        engine.process_frame(&f, 10);

        let server = engine.dhcp.get(&ip("10.0.0.1")).unwrap();
        assert_eq!((server.offer, server.ack, server.nak), (0, 1, 0));
        let binding = engine.addresses.get(&ip("10.0.0.50")).unwrap();
        assert_eq!(binding.mac, MacAddr(CLIENT_MAC));
        assert_eq!(binding.dhcp, 1);
    }

    #[test]
    fn test_dhcp_offer_does_not_bind() {
        let engine = Engine::new();
        let offer = build_reply(msg_type::OFFER, [10, 0, 0, 50], CLIENT_MAC);
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 1], [255, 255, 255, 255], 67, 68, &offer);
        engine.process_frame(&f, 10);
        assert_eq!(engine.dhcp.get(&ip("10.0.0.1")).unwrap().offer, 1);
        assert!(engine.addresses.records().is_empty());
    }

    #[test]
    fn test_dhcp_ack_without_address_does_not_bind() {
        let engine = Engine::new();
        let ack = build_reply(msg_type::ACK, [0, 0, 0, 0], CLIENT_MAC);
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 1], [255, 255, 255, 255], 67, 68, &ack);
        engine.process_frame(&f, 10);
        assert_eq!(engine.dhcp.get(&ip("10.0.0.1")).unwrap().ack, 1);
        assert!(engine.addresses.records().is_empty());
    }

    #[test]
    fn test_radius_exchange() {
        let engine = Engine::new();
        let req = build_radius(code::ACCESS_REQUEST);
        let accept = build_radius(code::ACCESS_ACCEPT);
        let f = test_frames::udp4(CLIENT_MAC, [10, 0, 0, 20], [10, 0, 0, 10], 40000, 1812, &req);
        engine.process_frame(&f, 1);
        let f = test_frames::udp4(SERVER_MAC, [10, 0, 0, 10], [10, 0, 0, 20], 1812, 40000, &accept);
        engine.process_frame(&f, 2);
        let rec = engine
            .radius
            .get(&RadiusKey {
                server: ip("10.0.0.10"),
                client: ip("10.0.0.20"),
            })
            .unwrap();
        assert_eq!((rec.seen.count, rec.access_request, rec.access_accept), (2, 1, 1));
    }

    #[test]
    fn test_tls_server_hello_over_tcp() {
        let engine = Engine::new();
        let hello = build_server_hello(&[0x11; 32], 0x1302, &TLS13_EXT);
        let f = test_frames::tcp4([10, 0, 0, 9], [10, 0, 0, 2], 443, 51000, &hello);
        engine.process_frame(&f, 5);
        let key = TlsKey {
            client: ip("10.0.0.2"),
            server: ip("10.0.0.9"),
            service: "HTTPS",
        };
        let rec = engine.tls.get(&key).unwrap();
        assert_eq!(rec.cipher, Some(0x1302));
        assert_eq!(rec.max_version, Some(crate::lookup::TLS13));
    }

    #[test]
    fn test_tcp_without_payload_is_ignored() {
        let engine = Engine::new();
        let f = test_frames::tcp4([10, 0, 0, 2], [10, 0, 0, 9], 51000, 443, &[]);
        engine.process_frame(&f, 5);
        assert!(engine.tls.records().is_empty());
        assert_eq!(engine.ether_types.get(0x0800), 1);
    }

    #[test]
    fn test_icmpv6_advertisements_bind_addresses() {
        let engine = Engine::new();
        let mut src = [0u8; 16];
        src[0] = 0xfe;
        src[1] = 0x80;
        src[15] = 0x02;
        let f = test_frames::icmpv6(CLIENT_MAC, src, ICMPV6_NEIGHBOR_ADVERTISEMENT);
        engine.process_frame(&f, 1);
        let rec = engine.addresses.get(&ip("fe80::2")).unwrap();
        assert_eq!(rec.mac, MacAddr(CLIENT_MAC));

        // Echo request: counted in the histogram only.
        src[15] = 0x03;
        let f = test_frames::icmpv6(CLIENT_MAC, src, 128);
        engine.process_frame(&f, 2);
        assert!(engine.addresses.get(&ip("fe80::3")).is_none());
        assert_eq!(engine.ether_types.get(0x86dd), 2);
    }
}
