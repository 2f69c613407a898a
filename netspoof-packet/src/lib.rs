//! Packet construction and parsing for netspoof
//!
//! Byte-exact encoders (and the decoders needed to react to sniffed traffic)
//! for every frame the spoofing modules handle:
//!
//! - [`ethernet`] - Ethernet II frames
//! - [`arp`] - ARP requests and replies
//! - [`ip`] - IPv4 and IPv6 headers
//! - [`udp`] - UDP datagrams with pseudo-header checksum
//! - [`icmpv6`] - ICMPv6 Router Advertisements and ND options
//! - [`dns`] - DNS messages with name compression support
//! - [`checksum`] - Internet checksum helpers
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use netspoof_core::MacAddr;
//! use netspoof_packet::arp::arp_reply_frame;
//!
//! let frame = arp_reply_frame(
//!     Ipv4Addr::new(192, 168, 1, 1),
//!     MacAddr([0xaa; 6]),
//!     Ipv4Addr::new(192, 168, 1, 20),
//!     MacAddr([0x20; 6]),
//! );
//! assert_eq!(frame.len(), 60);
//! ```

pub mod arp;
pub mod checksum;
pub mod dns;
pub mod ethernet;
pub mod icmpv6;
pub mod ip;
pub mod udp;

pub use arp::{arp_reply_frame, ArpOpcode, ArpPacket};
pub use checksum::{internet_checksum, transport_checksum, transport_checksum_v6};
pub use dns::{DnsMessage, DnsQuestion, DnsRecord};
pub use ethernet::{EtherType, EthernetFrame};
pub use icmpv6::{router_advertisement_frame, NdOption, RouterAdvertisement, RouterPreference};
pub use ip::{IpProtocol, Ipv4Packet, Ipv6Packet};
pub use udp::UdpDatagram;
