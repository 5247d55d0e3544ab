//! Raw ServerHello scanning for records the strict decoder rejects.
//!
//! Works on the first bytes of a TCP payload, usually a ServerHello that was
//! split across segments. Only fixed offsets are read and every read is
//! bounds-checked.

/// Record header (5) + handshake header (4) + server version (2) + random (32).
const SESSION_ID_LEN_OFFSET: usize = 5 + 4 + 2 + 32;

/// Smallest payload that still carries the session id length byte.
pub const MIN_SERVER_HELLO_LEN: usize = SESSION_ID_LEN_OFFSET + 1;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

/// supported_versions extension selecting TLS 1.3 (type 0x002b, len 2, 0x0304).
const TLS13_SUPPORTED_VERSIONS: [u8; 6] = [0x00, 0x2b, 0x00, 0x02, 0x03, 0x04];

/// True when `b` starts with a Handshake record carrying a ServerHello.
pub fn looks_like_server_hello(b: &[u8]) -> bool {
    b.len() >= MIN_SERVER_HELLO_LEN
        && b[0] == CONTENT_TYPE_HANDSHAKE
        && b[5] == HANDSHAKE_SERVER_HELLO
}

/// Cipher suite chosen by the server, or `None` when it can't be located.
pub fn server_hello_cipher(b: &[u8]) -> Option<u16> {
    if !looks_like_server_hello(b) {
        return None;
    }
    let sid_len = b[SESSION_ID_LEN_OFFSET] as usize;
    let pos = MIN_SERVER_HELLO_LEN + sid_len;
    let id = b.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([id[0], id[1]]))
}

/// True when the server's supported_versions extension selects TLS 1.3.
pub fn has_tls13_supported_versions(b: &[u8]) -> bool {
    b.windows(TLS13_SUPPORTED_VERSIONS.len())
        .any(|w| w == TLS13_SUPPORTED_VERSIONS)
}

/// Complete ServerHello record for tests.
#[cfg(test)]
pub(crate) fn build_server_hello(session_id: &[u8], cipher: u16, ext: &[u8]) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x5a; 32]);
    body.push(session_id.len() as u8);
    body.extend_from_slice(session_id);
    body.extend_from_slice(&cipher.to_be_bytes());
    body.push(0x00);
    if !ext.is_empty() {
        body.extend_from_slice(&(ext.len() as u16).to_be_bytes());
        body.extend_from_slice(ext);
    }

    let mut hs = vec![HANDSHAKE_SERVER_HELLO];
    hs.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    hs.extend_from_slice(&body);

    let mut rec = vec![CONTENT_TYPE_HANDSHAKE, 0x03, 0x03];
    rec.extend_from_slice(&(hs.len() as u16).to_be_bytes());
    rec.extend_from_slice(&hs);
    rec
}

#[cfg(test)]
pub(crate) const TLS13_EXT: [u8; 6] = TLS13_SUPPORTED_VERSIONS;
