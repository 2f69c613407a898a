//! Checksum calculations for network packets
//!
//! The Internet Checksum (RFC 1071) and the transport pseudo-header variants
//! used by UDP over IPv4 and by UDP/ICMPv6 over IPv6 (RFC 8200 section 8.1).

use std::net::{Ipv4Addr, Ipv6Addr};

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// ```
/// use netspoof_packet::checksum::internet_checksum;
///
/// let header = [0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11,
///               0x00, 0x00, 0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02];
/// let sum = internet_checksum(&header);
/// assert_ne!(sum, 0);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(sum_words(data, 0)) as u16
}

fn sum_words(data: &[u8], initial: u32) -> u32 {
    let mut sum = initial;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum = sum.wrapping_add((byte as u32) << 8);
    }

    sum
}

fn fold(mut sum: u32) -> u32 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum
}

/// Checksum of a transport segment carried in IPv4, pseudo-header included.
pub fn transport_checksum(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, protocol: u8, data: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(12);
    pseudo.extend_from_slice(&src_ip.octets());
    pseudo.extend_from_slice(&dst_ip.octets());
    pseudo.push(0);
    pseudo.push(protocol);
    pseudo.extend_from_slice(&(data.len() as u16).to_be_bytes());

    !fold(sum_words(data, sum_words(&pseudo, 0))) as u16
}

/// Checksum of an upper-layer packet carried in IPv6, pseudo-header included.
pub fn transport_checksum_v6(
    src_ip: Ipv6Addr,
    dst_ip: Ipv6Addr,
    next_header: u8,
    data: &[u8],
) -> u16 {
    let mut pseudo = Vec::with_capacity(40);
    pseudo.extend_from_slice(&src_ip.octets());
    pseudo.extend_from_slice(&dst_ip.octets());
    pseudo.extend_from_slice(&(data.len() as u32).to_be_bytes());
    pseudo.extend_from_slice(&[0, 0, 0, next_header]);

    !fold(sum_words(data, sum_words(&pseudo, 0))) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ipv4_header() {
        // Example header from RFC 1071 discussions, checksum field zeroed.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(internet_checksum(&header), 0xb861);
    }

    #[test]
    fn test_checksum_verifies_to_zero() {
        let mut data = vec![0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x9a, 0xbc];
        let sum = internet_checksum(&data);
        data[4..6].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(internet_checksum(&data), 0);
    }

    #[test]
    fn test_v6_pseudo_header_changes_result() {
        let data = [0x86, 0x00, 0x00, 0x00];
        let a = transport_checksum_v6("fe80::1".parse().unwrap(), "fe80::2".parse().unwrap(), 58, &data);
        let b = transport_checksum_v6("fe80::1".parse().unwrap(), "fe80::3".parse().unwrap(), 58, &data);
        assert_ne!(a, b);
    }
}
