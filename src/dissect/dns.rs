//! DNS message decoder (header + question section).

/// Ports carrying DNS (unicast DNS and mDNS).
pub const DNS_PORTS: &[u16] = &[53, 5353];

/// Standard query opcode.
pub const OPCODE_QUERY: u8 = 0;

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 16;

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: u16,
}

/// The parts of a DNS message the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub is_response: bool,
    pub opcode: u8,
    pub questions: Vec<DnsQuestion>,
}

impl DnsMessage {
    /// True for standard queries (QR=0, opcode QUERY).
    pub fn is_query(&self) -> bool {
        !self.is_response && self.opcode == OPCODE_QUERY
    }
}

/// Decode the header and every question. Any malformed question rejects the message.
pub fn parse(data: &[u8]) -> Option<DnsMessage> {
    if data.len() < HEADER_LEN {
        return None;
    }

    let flags = u16::from_be_bytes([data[2], data[3]]);
    let qdcount = u16::from_be_bytes([data[4], data[5]]);

    let mut questions = Vec::with_capacity(usize::from(qdcount).min(8));
    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        let (name, next) = read_name(data, pos)?;
        let fixed = data.get(next..next + 4)?;
        questions.push(DnsQuestion {
            name,
            qtype: u16::from_be_bytes([fixed[0], fixed[1]]),
        });
        pos = next + 4;
    }

    Some(DnsMessage {
        is_response: flags & 0x8000 != 0,
        opcode: ((flags >> 11) & 0x0f) as u8,
        questions,
    })
}

/// Read a (possibly compressed) domain name at `start`.
///
/// Returns the dotted name without a trailing dot and the offset just past the
/// name in the original position.
fn read_name(data: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<&[u8]> = Vec::new();
    let mut total = 0usize;
    let mut pos = start;
    let mut resume: Option<usize> = None;
    let mut jumps = 0usize;

    loop {
        let len = *data.get(pos)?;
        match len & 0xc0 {
            0x00 => {
                if len == 0 {
                    pos += 1;
                    break;
                }
                let label = data.get(pos + 1..pos + 1 + len as usize)?;
                total += label.len() + 1;
                if total > MAX_NAME_LEN {
                    return None;
                }
                labels.push(label);
                pos += 1 + len as usize;
            }
            0xc0 => {
                let lo = *data.get(pos + 1)?;
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                if resume.is_none() {
                    resume = Some(pos + 2);
                }
                pos = (usize::from(len & 0x3f) << 8) | usize::from(lo);
            }
            _ => return None,
        }
    }

    let name = labels
        .iter()
        .map(|l| String::from_utf8_lossy(l))
        .collect::<Vec<_>>()
        .join(".");
    Some((name, resume.unwrap_or(pos)))
}

#[cfg(test)]
pub(crate) fn build_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x00]); // RD
    out.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.') {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out.extend_from_slice(&qtype.to_be_bytes());
    out.extend_from_slice(&[0, 1]);
    out
}
