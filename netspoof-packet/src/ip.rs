//! IPv4 and IPv6 packet construction and parsing

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// IP protocol / IPv6 next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            val => IpProtocol::Custom(val),
        }
    }
}

/// IPv4 packet (options are skipped on parse, never emitted)
#[derive(Debug, Clone)]
pub struct Ipv4Packet {
    pub tos: u8,
    pub identification: u16,
    pub dont_fragment: bool,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// IPv4 header size without options
    pub const HEADER_SIZE: usize = 20;

    /// New packet with TTL 64 and DF set
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: IpProtocol, payload: Vec<u8>) -> Self {
        Ipv4Packet {
            tos: 0,
            identification: 0,
            dont_fragment: true,
            ttl: 64,
            protocol,
            source,
            destination,
            payload,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    fn header(&self, checksum: u16) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        buffer.put_u8(0x45); // version 4, IHL 5
        buffer.put_u8(self.tos);
        buffer.put_u16((Self::HEADER_SIZE + self.payload.len()) as u16);
        buffer.put_u16(self.identification);
        buffer.put_u16(if self.dont_fragment { 0x4000 } else { 0 });
        buffer.put_u8(self.ttl);
        buffer.put_u8(self.protocol.to_u8());
        buffer.put_u16(checksum);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());

        buffer
    }

    /// Serialize with a freshly computed header checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let checksum = internet_checksum(&self.header(0));
        let mut buffer = self.header(checksum);
        buffer.put_slice(&self.payload);
        buffer.to_vec()
    }

    /// Parse an IPv4 packet. The payload is cut to the total-length field so
    /// Ethernet padding never leaks into upper layers.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE || data[0] >> 4 != 4 {
            return None;
        }

        let header_len = ((data[0] & 0x0F) as usize) * 4;
        let total_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if header_len < Self::HEADER_SIZE || total_length < header_len || data.len() < total_length {
            return None;
        }

        let flags = u16::from_be_bytes([data[6], data[7]]);

        Some(Ipv4Packet {
            tos: data[1],
            identification: u16::from_be_bytes([data[4], data[5]]),
            dont_fragment: flags & 0x4000 != 0,
            ttl: data[8],
            protocol: IpProtocol::from_u8(data[9]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            payload: data[header_len..total_length].to_vec(),
        })
    }
}

/// IPv6 packet without extension headers
#[derive(Debug, Clone)]
pub struct Ipv6Packet {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub next_header: IpProtocol,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub payload: Vec<u8>,
}

impl Ipv6Packet {
    pub const HEADER_SIZE: usize = 40;

    /// New packet with hop limit 64
    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, next_header: IpProtocol, payload: Vec<u8>) -> Self {
        Ipv6Packet {
            traffic_class: 0,
            flow_label: 0,
            next_header,
            hop_limit: 64,
            source,
            destination,
            payload,
        }
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        let first_word =
            (6u32 << 28) | ((self.traffic_class as u32) << 20) | (self.flow_label & 0x000F_FFFF);
        buffer.put_u32(first_word);
        buffer.put_u16(self.payload.len() as u16);
        buffer.put_u8(self.next_header.to_u8());
        buffer.put_u8(self.hop_limit);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());
        buffer.put_slice(&self.payload);

        buffer.to_vec()
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE || data[0] >> 4 != 6 {
            return None;
        }

        let first_word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let payload_len = u16::from_be_bytes([data[4], data[5]]) as usize;
        let end = Self::HEADER_SIZE + payload_len;
        if data.len() < end {
            return None;
        }

        let source: [u8; 16] = data[8..24].try_into().ok()?;
        let destination: [u8; 16] = data[24..40].try_into().ok()?;

        Some(Ipv6Packet {
            traffic_class: ((first_word >> 20) & 0xFF) as u8,
            flow_label: first_word & 0x000F_FFFF,
            next_header: IpProtocol::from_u8(data[6]),
            hop_limit: data[7],
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
            payload: data[Self::HEADER_SIZE..end].to_vec(),
        })
    }
}
