//! ARP packet structure and parsing (RFC 826, Ethernet/IPv4 only)

use crate::ethernet::{EtherType, EthernetFrame};
use bytes::{BufMut, BytesMut};
use netspoof_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

/// Hardware type for Ethernet
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol type for IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// Size of an Ethernet/IPv4 ARP packet
pub const ARP_PACKET_LEN: usize = 28;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOpcode {
    Request = 1,
    Reply = 2,
}

impl ArpOpcode {
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// ARP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOpcode,
    /// Sender hardware address (MAC)
    pub sender_hw_addr: MacAddr,
    /// Sender protocol address (IP)
    pub sender_proto_addr: Ipv4Addr,
    /// Target hardware address (MAC)
    pub target_hw_addr: MacAddr,
    /// Target protocol address (IP)
    pub target_proto_addr: Ipv4Addr,
}

impl ArpPacket {
    /// "Who has `target_ip`? Tell `sender_ip`"
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOpcode::Request,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: target_ip,
        }
    }

    /// "`sender_ip` is at `sender_mac`", addressed to `target_ip`/`target_mac`
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ArpOpcode::Reply,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: target_mac,
            target_proto_addr: target_ip,
        }
    }

    /// Parse an ARP packet from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ARP_PACKET_LEN {
            return Err(Error::PacketParsing("ARP packet too short".to_string()));
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || data[4] != 6 || data[5] != 4 {
            return Err(Error::PacketParsing(
                "Unsupported ARP hardware/protocol type".to_string(),
            ));
        }

        let operation = ArpOpcode::from_u16(u16::from_be_bytes([data[6], data[7]]))
            .ok_or_else(|| Error::PacketParsing("Invalid ARP opcode".to_string()))?;

        Ok(Self {
            operation,
            sender_hw_addr: MacAddr::from_slice(&data[8..14])
                .ok_or_else(|| Error::PacketParsing("Bad sender MAC".to_string()))?,
            sender_proto_addr: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_hw_addr: MacAddr::from_slice(&data[18..24])
                .ok_or_else(|| Error::PacketParsing("Bad target MAC".to_string()))?,
            target_proto_addr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    /// Serialize the ARP packet (28 bytes)
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(ARP_PACKET_LEN);

        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation as u16);
        buf.put_slice(self.sender_hw_addr.as_bytes());
        buf.put_slice(&self.sender_proto_addr.octets());
        buf.put_slice(self.target_hw_addr.as_bytes());
        buf.put_slice(&self.target_proto_addr.octets());

        buf.to_vec()
    }

    /// Wrap in an Ethernet frame from `src_mac` to `dst_mac`
    pub fn to_frame(&self, src_mac: MacAddr, dst_mac: MacAddr) -> Vec<u8> {
        EthernetFrame::new(dst_mac, src_mac, EtherType::ARP, self.serialize()).to_bytes()
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ArpOpcode::Reply
    }
}

/// Forged-or-genuine ARP reply telling `target` that `sender_ip` is at
/// `sender_mac`. The Ethernet source is `sender_mac` as well, so the frame is
/// consistent at both layers.
pub fn arp_reply_frame(
    sender_ip: Ipv4Addr,
    sender_mac: MacAddr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
) -> Vec<u8> {
    ArpPacket::new_reply(sender_mac, sender_ip, target_mac, target_ip).to_frame(sender_mac, target_mac)
}
