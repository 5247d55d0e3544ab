//! DHCPv4 decoder.
//!
//! Reads the fixed BOOTP header, checks the magic cookie and walks the options
//! looking for the message type (option 53).

use std::net::Ipv4Addr;

/// DHCP server port.
pub const DHCP_SERVER_PORT: u16 = 67;

/// DHCP client port.
pub const DHCP_CLIENT_PORT: u16 = 68;

/// BOOTREPLY op code.
pub const OP_REPLY: u8 = 2;

/// Message types carried in option 53.
pub mod msg_type {
    pub const OFFER: u8 = 2;
    pub const ACK: u8 = 5;
    pub const NAK: u8 = 6;
}

const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];
const FIXED_LEN: usize = 236;
const OPT_PAD: u8 = 0;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_END: u8 = 255;

/// The parts of a DHCP message the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: u8,
    pub hw_len: u8,
    pub your_ip: Ipv4Addr,
    /// `chaddr` truncated to `hw_len` (at most 16 bytes).
    pub client_hw: Vec<u8>,
    pub message_type: Option<u8>,
}

/// Decode a DHCP message; `None` without the magic cookie.
pub fn parse(data: &[u8]) -> Option<DhcpMessage> {
    if data.len() < FIXED_LEN + MAGIC_COOKIE.len() {
        return None;
    }
    if data[FIXED_LEN..FIXED_LEN + 4] != MAGIC_COOKIE {
        return None;
    }

    let op = data[0];
    let hw_len = data[2];
    let your_ip = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
    let chaddr_len = usize::from(hw_len).min(16);
    let client_hw = data[28..28 + chaddr_len].to_vec();

    Some(DhcpMessage {
        op,
        hw_len,
        your_ip,
        client_hw,
        message_type: find_message_type(&data[FIXED_LEN + 4..]),
    })
}

fn find_message_type(options: &[u8]) -> Option<u8> {
    let mut pos = 0;
    while pos < options.len() {
        match options[pos] {
            OPT_PAD => pos += 1,
            OPT_END => return None,
            code => {
                let len = usize::from(*options.get(pos + 1)?);
                let value = options.get(pos + 2..pos + 2 + len)?;
                if code == OPT_MESSAGE_TYPE {
                    return value.first().copied();
                }
                pos += 2 + len;
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) fn build_reply(message_type: u8, your_ip: [u8; 4], client_mac: [u8; 6]) -> Vec<u8> {
    let mut out = vec![0u8; FIXED_LEN];
    out[0] = OP_REPLY;
    out[1] = 1;
    out[2] = 6;
    out[16..20].copy_from_slice(&your_ip);
    out[28..34].copy_from_slice(&client_mac);
    out.extend_from_slice(&MAGIC_COOKIE);
    out.extend_from_slice(&[OPT_PAD, 54, 4, 10, 0, 0, 1]);
    out.extend_from_slice(&[OPT_MESSAGE_TYPE, 1, message_type]);
    out.push(OPT_END);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ack() {
        let raw = build_reply(msg_type::ACK, [10, 0, 0, 9], [1, 2, 3, 4, 5, 6]);
        let msg = parse(&raw).unwrap();
        assert_eq!(msg.op, OP_REPLY);
        assert_eq!(msg.hw_len, 6);
        assert_eq!(msg.your_ip, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(msg.client_hw, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(msg.message_type, Some(msg_type::ACK));
    }

    #[test]
    fn test_missing_cookie_rejected() {
        let mut raw = build_reply(msg_type::OFFER, [10, 0, 0, 9], [0; 6]);
        raw[FIXED_LEN] = 0;
        assert!(parse(&raw).is_none());
    }

    #[test]
    fn test_short_message_rejected() {
        assert!(parse(&[0u8; 239]).is_none());
    }

    #[test]
    fn test_missing_message_type_option() {
        let mut raw = build_reply(msg_type::NAK, [0; 4], [0; 6]);
        raw.truncate(FIXED_LEN + 4);
        raw.push(OPT_END);
        assert_eq!(parse(&raw).unwrap().message_type, None);
    }

    #[test]
    fn test_truncated_option_stops_scan() {
        let mut raw = build_reply(msg_type::NAK, [0; 4], [0; 6]);
        raw.truncate(FIXED_LEN + 4);
        raw.extend_from_slice(&[12, 10, b'h']);
        assert_eq!(parse(&raw).unwrap().message_type, None);
    }
}
