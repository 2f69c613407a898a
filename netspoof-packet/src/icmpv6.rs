//! ICMPv6 Neighbor Discovery: Router Advertisements (RFC 4861)

use crate::checksum::transport_checksum_v6;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::ip::{IpProtocol, Ipv6Packet};
use bytes::{BufMut, BytesMut};
use netspoof_core::MacAddr;
use std::net::Ipv6Addr;

/// ICMPv6 type of a Router Advertisement
pub const ICMPV6_ROUTER_ADVERTISEMENT: u8 = 134;

/// Hop limit mandated for ND messages
pub const ND_HOP_LIMIT: u8 = 255;

/// Traffic class used on forged advertisements (CS7)
pub const ND_TRAFFIC_CLASS: u8 = 224;

/// Prefix option flags put on forged advertisements
pub const PREFIX_FLAGS: u8 = 0x0c;

/// Valid lifetime of the advertised prefix, 30 days
pub const PREFIX_VALID_LIFETIME: u32 = 2_592_000;

/// Preferred lifetime of the advertised prefix, 7 days
pub const PREFIX_PREFERRED_LIFETIME: u32 = 604_800;

/// ND option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdOptionType {
    SourceLinkLayerAddress = 1,
    TargetLinkLayerAddress = 2,
    PrefixInformation = 3,
    Mtu = 5,
}

/// Neighbor Discovery option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdOption {
    pub option_type: NdOptionType,
    pub data: Vec<u8>,
}

impl NdOption {
    pub fn source_ll_addr(mac: MacAddr) -> Self {
        Self {
            option_type: NdOptionType::SourceLinkLayerAddress,
            data: mac.as_bytes().to_vec(),
        }
    }

    pub fn mtu(mtu: u32) -> Self {
        let mut data = vec![0u8; 2]; // reserved
        data.extend_from_slice(&mtu.to_be_bytes());
        Self {
            option_type: NdOptionType::Mtu,
            data,
        }
    }

    pub fn prefix_information(
        prefix: Ipv6Addr,
        prefix_len: u8,
        flags: u8,
        valid_lifetime: u32,
        preferred_lifetime: u32,
    ) -> Self {
        let mut data = Vec::with_capacity(30);
        data.push(prefix_len);
        data.push(flags);
        data.extend_from_slice(&valid_lifetime.to_be_bytes());
        data.extend_from_slice(&preferred_lifetime.to_be_bytes());
        data.extend_from_slice(&[0u8; 4]); // reserved
        data.extend_from_slice(&prefix.octets());
        Self {
            option_type: NdOptionType::PrefixInformation,
            data,
        }
    }

    /// Type + length (8-octet units) + data, zero padded to a multiple of 8
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = 2 + self.data.len();
        let units = total_len.div_ceil(8);

        let mut bytes = Vec::with_capacity(units * 8);
        bytes.push(self.option_type as u8);
        bytes.push(units as u8);
        bytes.extend_from_slice(&self.data);
        bytes.resize(units * 8, 0);
        bytes
    }
}

/// Default router preference carried in the RA flags (RFC 4191)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPreference {
    Medium,
    High,
    Low,
}

impl RouterPreference {
    fn bits(self) -> u8 {
        match self {
            RouterPreference::Medium => 0b00 << 3,
            RouterPreference::High => 0b01 << 3,
            RouterPreference::Low => 0b11 << 3,
        }
    }
}

/// Router Advertisement message
#[derive(Debug, Clone)]
pub struct RouterAdvertisement {
    pub cur_hop_limit: u8,
    pub managed_flag: bool,
    pub other_config_flag: bool,
    pub preference: RouterPreference,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
    pub options: Vec<NdOption>,
}

impl Default for RouterAdvertisement {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterAdvertisement {
    pub fn new() -> Self {
        Self {
            cur_hop_limit: 64,
            managed_flag: false,
            other_config_flag: false,
            preference: RouterPreference::Medium,
            router_lifetime: 1800,
            reachable_time: 0,
            retrans_timer: 0,
            options: vec![],
        }
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.cur_hop_limit = hop_limit;
        self
    }

    pub fn with_preference(mut self, preference: RouterPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_source_ll(mut self, mac: MacAddr) -> Self {
        self.options.push(NdOption::source_ll_addr(mac));
        self
    }

    pub fn with_mtu(mut self, mtu: u32) -> Self {
        self.options.push(NdOption::mtu(mtu));
        self
    }

    pub fn with_prefix(mut self, prefix: Ipv6Addr, prefix_len: u8) -> Self {
        self.options.push(NdOption::prefix_information(
            prefix,
            prefix_len,
            PREFIX_FLAGS,
            PREFIX_VALID_LIFETIME,
            PREFIX_PREFERRED_LIFETIME,
        ));
        self
    }

    fn flags(&self) -> u8 {
        let mut flags = self.preference.bits();
        if self.managed_flag {
            flags |= 0x80;
        }
        if self.other_config_flag {
            flags |= 0x40;
        }
        flags
    }

    /// Full ICMPv6 message (type, code, checksum, body, options) with the
    /// checksum computed over the IPv6 pseudo-header.
    pub fn to_icmpv6(&self, src: Ipv6Addr, dst: Ipv6Addr) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(16 + self.options.len() * 32);

        buf.put_u8(ICMPV6_ROUTER_ADVERTISEMENT);
        buf.put_u8(0); // code
        buf.put_u16(0); // checksum placeholder
        buf.put_u8(self.cur_hop_limit);
        buf.put_u8(self.flags());
        buf.put_u16(self.router_lifetime);
        buf.put_u32(self.reachable_time);
        buf.put_u32(self.retrans_timer);
        for option in &self.options {
            buf.put_slice(&option.to_bytes());
        }

        let checksum = transport_checksum_v6(src, dst, IpProtocol::ICMPv6.to_u8(), &buf);
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf.to_vec()
    }
}

/// Complete Ethernet/IPv6/ICMPv6 frame advertising `src_ip` as a router.
pub fn router_advertisement_frame(
    src_mac: MacAddr,
    src_ip: Ipv6Addr,
    dst_mac: MacAddr,
    dst_ip: Ipv6Addr,
    ra: &RouterAdvertisement,
) -> Vec<u8> {
    let ip = Ipv6Packet::new(src_ip, dst_ip, IpProtocol::ICMPv6, ra.to_icmpv6(src_ip, dst_ip))
        .with_traffic_class(ND_TRAFFIC_CLASS)
        .with_hop_limit(ND_HOP_LIMIT);

    EthernetFrame::new(dst_mac, src_mac, EtherType::IPv6, ip.to_bytes()).to_bytes()
}
