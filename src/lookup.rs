//! Static number → name tables used when rendering telemetry lines.
//!
//! - DNS resource record types (IANA registry)
//! - TLS protocol versions
//! - Well-known TLS service ports
//! - Cipher suite names (delegated to `tls-parser`'s IANA table)

/// DNS resource record type names, sorted by type number.
const DNS_TYPES: &[(u16, &str)] = &[
    (1, "A"),
    (2, "NS"),
    (3, "MD"),
    (4, "MF"),
    (5, "CNAME"),
    (6, "SOA"),
    (7, "MB"),
    (8, "MG"),
    (9, "MR"),
    (10, "NULL"),
    (11, "WKS"),
    (12, "PTR"),
    (13, "HINFO"),
    (14, "MINFO"),
    (15, "MX"),
    (16, "TXT"),
    (17, "RP"),
    (18, "AFSDB"),
    (19, "X25"),
    (20, "ISDN"),
    (21, "RT"),
    (22, "NSAP"),
    (23, "NSAP-PTR"),
    (24, "SIG"),
    (25, "KEY"),
    (26, "PX"),
    (27, "GPOS"),
    (28, "AAAA"),
    (29, "LOC"),
    (30, "NXT"),
    (31, "EID"),
    (32, "NIMLOC"),
    (33, "SRV"),
    (34, "ATMA"),
    (35, "NAPTR"),
    (36, "KX"),
    (37, "CERT"),
    (38, "A6"),
    (39, "DNAME"),
    (40, "SINK"),
    (41, "OPT"),
    (42, "APL"),
    (43, "DS"),
    (44, "SSHFP"),
    (45, "IPSECKEY"),
    (46, "RRSIG"),
    (47, "NSEC"),
    (48, "DNSKEY"),
    (49, "DHCID"),
    (50, "NSEC3"),
    (51, "NSEC3PARAM"),
    (52, "TLSA"),
    (53, "SMIMEA"),
    (55, "HIP"),
    (56, "NINFO"),
    (57, "RKEY"),
    (58, "TALINK"),
    (59, "CDS"),
    (60, "CDNSKEY"),
    (61, "OPENPGPKEY"),
    (62, "CSYNC"),
    (63, "ZONEMD"),
    (64, "SVCB"),
    (65, "HTTPS"),
    (66, "DSYNC"),
    (99, "SPF"),
    (100, "UINFO"),
    (101, "UID"),
    (102, "GID"),
    (103, "UNSPEC"),
    (104, "NID"),
    (105, "L32"),
    (106, "L64"),
    (107, "LP"),
    (108, "EUI48"),
    (109, "EUI64"),
    (249, "TKEY"),
    (250, "TSIG"),
    (251, "IXFR"),
    (252, "AXFR"),
    (253, "MAILB"),
    (254, "MAILA"),
    (255, "*"),
    (256, "URI"),
    (257, "CAA"),
    (258, "AVC"),
    (259, "DOA"),
    (260, "AMTRELAY"),
    (261, "RESINFO"),
    (262, "WALLET"),
    (263, "CLA"),
    (264, "IPN"),
    (32768, "TA"),
    (32769, "DLV"),
];

/// Name of a DNS query type, `"Unknown"` for unregistered numbers.
pub fn dns_type_name(qtype: u16) -> &'static str {
    match DNS_TYPES.binary_search_by_key(&qtype, |&(t, _)| t) {
        Ok(idx) => DNS_TYPES[idx].1,
        Err(_) => {
            tracing::debug!("Unknown DNS type {qtype}");
            "Unknown"
        }
    }
}

/// TLS 1.3 wire version.
pub const TLS13: u16 = 0x0304;

/// Display name of a TLS record/handshake version.
pub fn tls_version_name(version: u16) -> &'static str {
    match version {
        0x0200 => "SSL 2.0",
        0x0300 => "SSL 3.0",
        0x0301 => "TLS 1.0",
        0x0302 => "TLS 1.1",
        0x0303 => "TLS 1.2",
        TLS13 => "TLS 1.3",
        _ => "Unknown",
    }
}

/// Service name used when neither port is well known.
pub const OTHER_SERVICE: &str = "OTHER";

/// Well-known TLS service ports.
const TLS_SERVICES: &[(u16, &str)] = &[
    (20, "FTP-DATA"),
    (21, "FTP"),
    (25, "SMTP"),
    (110, "POP3"),
    (143, "IMAP4"),
    (389, "LDAP"),
    (443, "HTTPS"),
    (465, "SMTPS"),
    (587, "SMTP"),
    (636, "LDAPS"),
    (990, "FTPS"),
    (991, "FTPS-DATA"),
    (993, "IMAP4S"),
    (995, "POP3S"),
    (5001, "UPnPMSv2"),
];

/// Service name for a well-known TLS port.
pub fn tls_service(port: u16) -> Option<&'static str> {
    TLS_SERVICES
        .binary_search_by_key(&port, |&(p, _)| p)
        .ok()
        .map(|idx| TLS_SERVICES[idx].1)
}

/// IANA cipher suite name, `"Unknown"` when not registered.
pub fn cipher_suite_name(id: u16) -> &'static str {
    tls_parser::TlsCipherSuite::from_id(id)
        .map(|cs| cs.name)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_sorted_for_binary_search() {
        assert!(DNS_TYPES.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(TLS_SERVICES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_dns_type_names() {
        assert_eq!(dns_type_name(1), "A");
        assert_eq!(dns_type_name(28), "AAAA");
        assert_eq!(dns_type_name(65), "HTTPS");
        assert_eq!(dns_type_name(255), "*");
        assert_eq!(dns_type_name(32769), "DLV");
        assert_eq!(dns_type_name(54), "Unknown");
        assert_eq!(dns_type_name(65000), "Unknown");
    }

    #[test]
    fn test_tls_version_names() {
        assert_eq!(tls_version_name(0x0301), "TLS 1.0");
        assert_eq!(tls_version_name(0x0303), "TLS 1.2");
        assert_eq!(tls_version_name(TLS13), "TLS 1.3");
        assert_eq!(tls_version_name(0), "Unknown");
    }

    #[test]
    fn test_tls_services() {
        assert_eq!(tls_service(443), Some("HTTPS"));
        assert_eq!(tls_service(587), Some("SMTP"));
        assert_eq!(tls_service(5001), Some("UPnPMSv2"));
        assert_eq!(tls_service(8443), None);
    }

    #[test]
    fn test_cipher_suite_names() {
        assert_eq!(cipher_suite_name(0x1301), "TLS_AES_128_GCM_SHA256");
        assert_eq!(cipher_suite_name(0xc02f), "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256");
        assert_eq!(cipher_suite_name(0xeeee), "Unknown");
    }
}
