//! NTP header decoder.

/// NTP port.
pub const NTP_PORT: u16 = 123;

/// Server mode.
pub const MODE_SERVER: u8 = 4;

const NTP_HEADER_LEN: usize = 48;

/// The parts of an NTP header the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpPacket {
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub reference_id: u32,
}

/// Decode the fixed 48-byte header.
pub fn parse(data: &[u8]) -> Option<NtpPacket> {
    if data.len() < NTP_HEADER_LEN {
        return None;
    }
    let first = data[0];
    Some(NtpPacket {
        version: (first >> 3) & 0x07,
        mode: first & 0x07,
        stratum: data[1],
        reference_id: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
    })
}

#[cfg(test)]
pub(crate) fn build_packet(version: u8, mode: u8, stratum: u8, reference_id: u32) -> Vec<u8> {
    let mut out = vec![0u8; NTP_HEADER_LEN];
    out[0] = (version << 3) | mode;
    out[1] = stratum;
    out[12..16].copy_from_slice(&reference_id.to_be_bytes());
    out
}
