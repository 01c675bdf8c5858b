//! SOCKS5-style target address header.
//!
//! The first plaintext chunk a client sends starts with this header, telling
//! the server where to relay the connection:
//!
//! ```text
//! [ atyp (1) | address (4 / 1+len / 16) | port (2, big-endian) ]
//! ```
//!
//! `atyp` 0x01 is IPv4, 0x03 a length-prefixed domain name, 0x04 IPv6.
//! Malformed or truncated input decodes to `None`; the connection layer
//! treats that as a fatal protocol error.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Largest possible encoded header: domain form with a 255-byte name.
pub const MAX_ENCODED_LEN: usize = 1 + 1 + 255 + 2;

/// A relay target carried at the start of the first chunk payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// Literal IP endpoint.
    Ip(IpAddr, u16),
    /// Domain name endpoint, resolved by the remote end.
    Domain(String, u16),
}

impl Address {
    /// Encode the header for the wire.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(MAX_ENCODED_LEN);
        match self {
            Address::Ip(IpAddr::V4(v4), port) => {
                buf.put_u8(ATYP_IPV4);
                buf.put_slice(&v4.octets());
                buf.put_u16(*port);
            }
            Address::Ip(IpAddr::V6(v6), port) => {
                buf.put_u8(ATYP_IPV6);
                buf.put_slice(&v6.octets());
                buf.put_u16(*port);
            }
            Address::Domain(name, port) => {
                debug_assert!(name.len() <= 255, "domain name too long for the header");
                buf.put_u8(ATYP_DOMAIN);
                buf.put_u8(name.len() as u8);
                buf.put_slice(name.as_bytes());
                buf.put_u16(*port);
            }
        }
        buf.to_vec()
    }

    /// Decode a header from the front of `buf`.
    ///
    /// Returns the address and the number of bytes consumed, or `None` when
    /// the input is malformed or not yet complete.
    pub fn decode(buf: &[u8]) -> Option<(Self, usize)> {
        match *buf.first()? {
            ATYP_IPV4 => {
                if buf.len() < 7 {
                    return None;
                }
                let ip = Ipv4Addr::new(buf[1], buf[2], buf[3], buf[4]);
                let port = u16::from_be_bytes([buf[5], buf[6]]);
                Some((Address::Ip(IpAddr::V4(ip), port), 7))
            }
            ATYP_DOMAIN => {
                let len = *buf.get(1)? as usize;
                if len == 0 {
                    return None;
                }
                let end = 2 + len + 2;
                if buf.len() < end {
                    return None;
                }
                let name = std::str::from_utf8(&buf[2..2 + len]).ok()?;
                let port = u16::from_be_bytes([buf[2 + len], buf[3 + len]]);
                Some((Address::Domain(name.to_string(), port), end))
            }
            ATYP_IPV6 => {
                if buf.len() < 19 {
                    return None;
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[1..17]);
                let port = u16::from_be_bytes([buf[17], buf[18]]);
                Some((Address::Ip(IpAddr::V6(Ipv6Addr::from(octets)), port), 19))
            }
            _ => None,
        }
    }

    /// Host component, suitable for dialing.
    pub fn host(&self) -> String {
        match self {
            Address::Ip(ip, _) => ip.to_string(),
            Address::Domain(name, _) => name.clone(),
        }
    }

    /// Port component.
    pub fn port(&self) -> u16 {
        match self {
            Address::Ip(_, port) | Address::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(IpAddr::V6(ip), port) => write!(f, "[{ip}]:{port}"),
            Address::Ip(IpAddr::V4(ip), port) => write!(f, "{ip}:{port}"),
            Address::Domain(name, port) => write!(f, "{name}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_roundtrip() {
        let addr = Address::Ip(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), 443);
        let wire = addr.encode();
        assert_eq!(wire, [0x01, 93, 184, 216, 34, 0x01, 0xbb]);

        let (decoded, consumed) = Address::decode(&wire).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_domain_roundtrip() {
        let addr = Address::Domain("example.com".into(), 80);
        let wire = addr.encode();
        assert_eq!(wire[0], 0x03);
        assert_eq!(wire[1], 11);

        let (decoded, consumed) = Address::decode(&wire).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_ipv6_roundtrip() {
        let addr = Address::Ip("2001:db8::1".parse().unwrap(), 8388);
        let wire = addr.encode();
        assert_eq!(wire.len(), 19);

        let (decoded, consumed) = Address::decode(&wire).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(consumed, 19);
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let mut wire = Address::Domain("example.com".into(), 80).encode();
        let header_len = wire.len();
        wire.extend_from_slice(b"GET / HTTP/1.1\r\n");

        let (_, consumed) = Address::decode(&wire).unwrap();
        assert_eq!(consumed, header_len);
    }

    #[test]
    fn test_malformed_input_is_none() {
        // Empty, unknown atyp, zero-length domain, bad UTF-8.
        assert!(Address::decode(&[]).is_none());
        assert!(Address::decode(&[0x02, 1, 2, 3, 4, 0, 80]).is_none());
        assert!(Address::decode(&[0x03, 0, 0, 80]).is_none());
        assert!(Address::decode(&[0x03, 2, 0xFF, 0xFE, 0, 80]).is_none());
    }

    #[test]
    fn test_truncated_input_is_none() {
        let wire = Address::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 1080).encode();
        for cut in 0..wire.len() {
            assert!(Address::decode(&wire[..cut]).is_none());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Address::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 1080).to_string(),
            "127.0.0.1:1080"
        );
        assert_eq!(
            Address::Ip("::1".parse().unwrap(), 443).to_string(),
            "[::1]:443"
        );
        assert_eq!(
            Address::Domain("example.com".into(), 80).to_string(),
            "example.com:80"
        );
    }
}
