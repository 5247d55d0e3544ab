//! Frame-level dissection.
//!
//! Turns one captured Ethernet frame into a [`Frame`]: the outer EtherType,
//! the source MAC and a closed [`Layer`] enum describing the innermost layer
//! the classifier cares about. Link/network/transport headers are sliced with
//! `etherparse`; ARP is decoded by hand, also behind up to two VLAN tags.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use etherparse::{
    Ethernet2HeaderSlice, NetSlice, SingleVlanHeaderSlice, SlicedPacket, TransportSlice,
};

/// EtherType of ARP frames.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// 802.1Q, 802.1ad and legacy QinQ tag protocol identifiers.
const VLAN_ETHER_TYPES: [u16; 3] = [0x8100, 0x88a8, 0x9100];

const MAX_VLAN_TAGS: usize = 2;

/// ICMPv6 Router Advertisement.
pub const ICMPV6_ROUTER_ADVERTISEMENT: u8 = 134;

/// ICMPv6 Neighbor Advertisement.
pub const ICMPV6_NEIGHBOR_ADVERTISEMENT: u8 = 136;

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_FIXED_LEN: usize = 8;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Build from a slice; `None` unless it is exactly six bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(bytes).ok().map(MacAddr)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// An ARP packet, sizes as announced in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket<'a> {
    pub hw_size: u8,
    pub proto_size: u8,
    pub sender_hw: &'a [u8],
    pub sender_proto: &'a [u8],
}

impl ArpPacket<'_> {
    /// Sender binding for Ethernet/IPv4 ARP, `None` for any other size combination.
    pub fn ipv4_binding(&self) -> Option<(IpAddr, MacAddr)> {
        if self.hw_size != 6 || self.proto_size != 4 {
            return None;
        }
        let ip: [u8; 4] = self.sender_proto.try_into().ok()?;
        let mac = MacAddr::from_slice(self.sender_hw)?;
        Some((IpAddr::V4(Ipv4Addr::from(ip)), mac))
    }
}

/// A transport segment with its L3 endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

impl Segment<'_> {
    /// True when either port equals one of `ports`.
    pub fn uses_port(&self, ports: &[u16]) -> bool {
        ports.contains(&self.src_port) || ports.contains(&self.dst_port)
    }
}

/// Innermost layer of interest in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer<'a> {
    Arp(ArpPacket<'a>),
    Icmpv6 { src: IpAddr, icmp_type: u8 },
    Udp(Segment<'a>),
    Tcp(Segment<'a>),
    /// Anything else, including frames whose inner layers failed to decode.
    Other,
}

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub ether_type: u16,
    pub src_mac: MacAddr,
    pub layer: Layer<'a>,
}

/// Decode a raw Ethernet frame. Returns `None` only if the Ethernet header itself is invalid.
pub fn decode_frame(data: &[u8]) -> Option<Frame<'_>> {
    let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
    let ether_type = eth.ether_type().0;
    let src_mac = MacAddr(eth.source());

    let layer = match skip_vlan_tags(ether_type, &data[ETHERNET_HEADER_LEN..]) {
        Some((ETHERTYPE_ARP, body)) => decode_arp(body).map_or(Layer::Other, Layer::Arp),
        Some(_) => decode_ip(data),
        None => Layer::Other,
    };

    Some(Frame {
        ether_type,
        src_mac,
        layer,
    })
}

/// Inner EtherType and payload behind any VLAN tags. `None` on a truncated tag.
fn skip_vlan_tags(mut ether_type: u16, mut rest: &[u8]) -> Option<(u16, &[u8])> {
    for _ in 0..MAX_VLAN_TAGS {
        if !VLAN_ETHER_TYPES.contains(&ether_type) {
            break;
        }
        let tag = SingleVlanHeaderSlice::from_slice(rest).ok()?;
        ether_type = tag.ether_type().0;
        rest = &rest[tag.slice().len()..];
    }
    Some((ether_type, rest))
}

/// Decode an ARP body (everything after the Ethernet and VLAN headers).
pub fn decode_arp(data: &[u8]) -> Option<ArpPacket<'_>> {
    if data.len() < ARP_FIXED_LEN {
        return None;
    }
    let hw_size = data[4];
    let proto_size = data[5];

    let sha_end = ARP_FIXED_LEN + hw_size as usize;
    let spa_end = sha_end + proto_size as usize;
    // Target addresses follow the sender addresses and must be present too.
    let total = spa_end + hw_size as usize + proto_size as usize;
    if data.len() < total {
        return None;
    }

    Some(ArpPacket {
        hw_size,
        proto_size,
        sender_hw: &data[ARP_FIXED_LEN..sha_end],
        sender_proto: &data[sha_end..spa_end],
    })
}

fn decode_ip(data: &[u8]) -> Layer<'_> {
    let Ok(sliced) = SlicedPacket::from_ethernet(data) else {
        return Layer::Other;
    };

    let (src, dst) = match &sliced.net {
        Some(NetSlice::Ipv4(v4)) => (
            IpAddr::V4(v4.header().source_addr()),
            IpAddr::V4(v4.header().destination_addr()),
        ),
        Some(NetSlice::Ipv6(v6)) => (
            IpAddr::V6(v6.header().source_addr()),
            IpAddr::V6(v6.header().destination_addr()),
        ),
        _ => return Layer::Other,
    };

    match &sliced.transport {
        Some(TransportSlice::Udp(udp)) => Layer::Udp(Segment {
            src,
            dst,
            src_port: udp.source_port(),
            dst_port: udp.destination_port(),
            payload: udp.payload(),
        }),
        Some(TransportSlice::Tcp(tcp)) => Layer::Tcp(Segment {
            src,
            dst,
            src_port: tcp.source_port(),
            dst_port: tcp.destination_port(),
            payload: tcp.payload(),
        }),
        Some(TransportSlice::Icmpv6(icmp)) => Layer::Icmpv6 {
            src,
            icmp_type: icmp.type_u8(),
        },
        _ => Layer::Other,
    }
}


#[cfg(test)]
mod tests {
    use super::test_frames::*;
    use super::*;

    #[test]
    fn test_mac_display_is_lowercase_colon_separated() {
        let mac = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_decode_empty_frame() {
        assert!(decode_frame(&[]).is_none());
    }

    #[test]
    fn test_decode_arp_reply() {
        let pkt = arp_reply([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], [10, 0, 0, 5]);
        let frame = decode_frame(&pkt).unwrap();
        assert_eq!(frame.ether_type, ETHERTYPE_ARP);
        let Layer::Arp(arp) = frame.layer else {
            panic!("expected ARP layer, got {:?}", frame.layer);
        };
        let (ip, mac) = arp.ipv4_binding().unwrap();
        assert_eq!(ip.to_string(), "10.0.0.5");
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_truncated_arp_is_other() {
        let pkt = arp_reply(CLIENT_MAC, [10, 0, 0, 5]);
        let frame = decode_frame(&pkt[..20]).unwrap();
        assert_eq!(frame.layer, Layer::Other);
    }

    #[test]
    fn test_decode_vlan_tagged_arp() {
        let pkt = vlan_tagged(&arp_reply([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], [10, 0, 0, 5]), 42);
        let frame = decode_frame(&pkt).unwrap();
        assert_eq!(frame.ether_type, 0x8100);
        let Layer::Arp(arp) = frame.layer else {
            panic!("expected ARP layer, got {:?}", frame.layer);
        };
        let (ip, mac) = arp.ipv4_binding().unwrap();
        assert_eq!(ip.to_string(), "10.0.0.5");
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");

        let double = vlan_tagged(&pkt, 7);
        assert!(matches!(decode_frame(&double).unwrap().layer, Layer::Arp(_)));
    }

    #[test]
    fn test_decode_vlan_tagged_udp4() {
        let pkt = vlan_tagged(
            &udp4(CLIENT_MAC, [10, 0, 0, 2], [10, 0, 0, 53], 40000, 53, b"abc"),
            42,
        );
        let Layer::Udp(seg) = decode_frame(&pkt).unwrap().layer else {
            panic!("expected UDP layer");
        };
        assert_eq!(seg.dst_port, 53);
        assert_eq!(seg.payload, b"abc");
    }

    #[test]
    fn test_truncated_vlan_tag_is_other() {
        let pkt = vlan_tagged(&arp_reply(CLIENT_MAC, [10, 0, 0, 5]), 42);
        assert_eq!(decode_frame(&pkt[..16]).unwrap().layer, Layer::Other);
    }

    #[test]
    fn test_arp_with_other_sizes_has_no_binding() {
        let arp = ArpPacket {
            hw_size: 8,
            proto_size: 4,
            sender_hw: &[0; 8],
            sender_proto: &[10, 0, 0, 1],
        };
        assert!(arp.ipv4_binding().is_none());
    }

    #[test]
    fn test_decode_udp4() {
        let pkt = udp4(CLIENT_MAC, [10, 0, 0, 2], [10, 0, 0, 53], 40000, 53, b"abc");
        let frame = decode_frame(&pkt).unwrap();
        assert_eq!(frame.ether_type, 0x0800);
        assert_eq!(frame.src_mac, MacAddr(CLIENT_MAC));
        let Layer::Udp(seg) = frame.layer else {
            panic!("expected UDP layer");
        };
        assert_eq!(seg.src.to_string(), "10.0.0.2");
        assert_eq!(seg.dst.to_string(), "10.0.0.53");
        assert_eq!(seg.src_port, 40000);
        assert_eq!(seg.dst_port, 53);
        assert_eq!(seg.payload, b"abc");
        assert!(seg.uses_port(&[53]));
        assert!(!seg.uses_port(&[123]));
    }

    #[test]
    fn test_decode_tcp4() {
        let pkt = tcp4([10, 0, 0, 2], [10, 0, 0, 3], 50000, 443, &[0x16, 0x03]);
        let frame = decode_frame(&pkt).unwrap();
        let Layer::Tcp(seg) = frame.layer else {
            panic!("expected TCP layer");
        };
        assert_eq!(seg.dst_port, 443);
        assert_eq!(seg.payload, &[0x16, 0x03]);
    }

    #[test]
    fn test_decode_icmpv6_neighbor_advertisement() {
        let mut src = [0u8; 16];
        src[0] = 0xfe;
        src[1] = 0x80;
        src[15] = 0x05;
        let pkt = icmpv6(CLIENT_MAC, src, ICMPV6_NEIGHBOR_ADVERTISEMENT);
        let frame = decode_frame(&pkt).unwrap();
        assert_eq!(frame.ether_type, 0x86dd);
        match frame.layer {
            Layer::Icmpv6 { src, icmp_type } => {
                assert_eq!(src.to_string(), "fe80::5");
                assert_eq!(icmp_type, ICMPV6_NEIGHBOR_ADVERTISEMENT);
            }
            other => panic!("expected ICMPv6 layer, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_ip_header_is_other() {
        let pkt = udp4(CLIENT_MAC, [10, 0, 0, 2], [10, 0, 0, 53], 40000, 53, b"abc");
        let frame = decode_frame(&pkt[..20]).unwrap();
        assert_eq!(frame.layer, Layer::Other);
    }
}
