//! RADIUS header decoder.

/// Authentication and accounting ports.
pub const RADIUS_PORTS: &[u16] = &[1812, 1813];

/// Packet codes (RFC 2865 / RFC 2866).
pub mod code {
    pub const ACCESS_REQUEST: u8 = 1;
    pub const ACCESS_ACCEPT: u8 = 2;
    pub const ACCESS_REJECT: u8 = 3;
    pub const ACCOUNTING_REQUEST: u8 = 4;
    pub const ACCOUNTING_RESPONSE: u8 = 5;
    pub const ACCESS_CHALLENGE: u8 = 11;
}

const MIN_LEN: usize = 20;
const MAX_LEN: usize = 4096;

/// The parts of a RADIUS packet the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadiusPacket {
    pub code: u8,
}

/// Decode the header; the length field must fit in 20..=4096 and in the buffer.
pub fn parse(data: &[u8]) -> Option<RadiusPacket> {
    if data.len() < MIN_LEN {
        return None;
    }
    let len = usize::from(u16::from_be_bytes([data[2], data[3]]));
    if !(MIN_LEN..=MAX_LEN).contains(&len) || len > data.len() {
        return None;
    }
    Some(RadiusPacket { code: data[0] })
}

#[cfg(test)]
pub(crate) fn build_packet(code: u8) -> Vec<u8> {
    let mut out = vec![0u8; MIN_LEN];
    out[0] = code;
    out[1] = 1;
    out[2..4].copy_from_slice(&(MIN_LEN as u16).to_be_bytes());
    out
}
