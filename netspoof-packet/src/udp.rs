//! UDP datagram construction and parsing

use crate::checksum::{transport_checksum, transport_checksum_v6};
use bytes::{BufMut, BytesMut};
use std::net::IpAddr;

/// DNS server port
pub const DNS_PORT: u16 = 53;

/// UDP protocol number
const UDP_PROTOCOL: u8 = 17;

/// UDP datagram
#[derive(Debug, Clone)]
pub struct UdpDatagram {
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: Vec<u8>,
}

impl UdpDatagram {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    pub fn new(source_port: u16, destination_port: u16, payload: Vec<u8>) -> Self {
        UdpDatagram {
            source_port,
            destination_port,
            payload,
        }
    }

    fn length(&self) -> u16 {
        (Self::HEADER_SIZE + self.payload.len()) as u16
    }

    fn build(&self, checksum: u16) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(self.length() as usize);
        buffer.put_u16(self.source_port);
        buffer.put_u16(self.destination_port);
        buffer.put_u16(self.length());
        buffer.put_u16(checksum);
        buffer.put_slice(&self.payload);
        buffer.to_vec()
    }

    /// Serialize with the pseudo-header checksum for the given endpoints.
    ///
    /// Both addresses must be of the same family; a mixed pair yields a
    /// datagram with checksum 0, which IPv4 receivers accept as "none".
    pub fn to_bytes_with_checksum(&self, src_ip: IpAddr, dst_ip: IpAddr) -> Vec<u8> {
        let unsummed = self.build(0);
        let checksum = match (src_ip, dst_ip) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => {
                transport_checksum(src, dst, UDP_PROTOCOL, &unsummed)
            }
            (IpAddr::V6(src), IpAddr::V6(dst)) => {
                transport_checksum_v6(src, dst, UDP_PROTOCOL, &unsummed)
            }
            _ => return unsummed,
        };

        // A computed 0 is transmitted as all ones (RFC 768).
        self.build(if checksum == 0 { 0xFFFF } else { checksum })
    }

    /// Parse a datagram, cutting the payload to the length field
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let length = u16::from_be_bytes([data[4], data[5]]) as usize;
        if length < Self::HEADER_SIZE || data.len() < length {
            return None;
        }

        Some(UdpDatagram {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            payload: data[Self::HEADER_SIZE..length].to_vec(),
        })
    }
}
