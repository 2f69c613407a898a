//! Forged DNS answers
//!
//! Pure frame-in, frame-out: everything needed to decide on and build a reply
//! lives in [`Responder`], so it can be exercised without a capture handle.

use netspoof_core::MacAddr;
use netspoof_packet::dns::{TYPE_A, TYPE_AAAA};
use netspoof_packet::{
    DnsMessage, DnsQuestion, DnsRecord, EtherType, EthernetFrame, IpProtocol, Ipv4Packet,
    Ipv6Packet, UdpDatagram,
};
use std::net::IpAddr;
use tracing::{debug, error, info};

use super::hosts::Hosts;

const REPLY_TTL: u8 = 64;

const DNS_PORT: u16 = 53;

/// IP layer of a captured query
enum Envelope {
    V4(Ipv4Packet),
    V6(Ipv6Packet),
}

impl Envelope {
    fn parse(frame: &EthernetFrame) -> Option<Self> {
        match frame.ethertype {
            EtherType::IPv4 => Ipv4Packet::from_bytes(&frame.payload)
                .filter(|ip| ip.protocol == IpProtocol::UDP)
                .map(Envelope::V4),
            EtherType::IPv6 => Ipv6Packet::from_bytes(&frame.payload)
                .filter(|ip| ip.next_header == IpProtocol::UDP)
                .map(Envelope::V6),
            _ => None,
        }
    }

    fn source(&self) -> IpAddr {
        match self {
            Envelope::V4(ip) => IpAddr::V4(ip.source),
            Envelope::V6(ip) => IpAddr::V6(ip.source),
        }
    }

    fn destination(&self) -> IpAddr {
        match self {
            Envelope::V4(ip) => IpAddr::V4(ip.destination),
            Envelope::V6(ip) => IpAddr::V6(ip.destination),
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Envelope::V4(ip) => &ip.payload,
            Envelope::V6(ip) => &ip.payload,
        }
    }

    /// Swap the endpoints and wrap `udp` in a fresh IP header
    fn reply(&self, udp: Vec<u8>) -> (EtherType, Vec<u8>) {
        match self {
            Envelope::V4(ip) => (
                EtherType::IPv4,
                Ipv4Packet::new(ip.destination, ip.source, IpProtocol::UDP, udp)
                    .with_ttl(REPLY_TTL)
                    .to_bytes(),
            ),
            Envelope::V6(ip) => (
                EtherType::IPv6,
                Ipv6Packet::new(ip.destination, ip.source, IpProtocol::UDP, udp)
                    .with_hop_limit(REPLY_TTL)
                    .to_bytes(),
            ),
        }
    }
}

/// Address to put in an answer for `qtype`, mapping between families
fn answer_address(qtype: u16, address: IpAddr) -> Option<IpAddr> {
    match (qtype, address) {
        (TYPE_A, IpAddr::V4(_)) | (TYPE_AAAA, IpAddr::V6(_)) => Some(address),
        (TYPE_AAAA, IpAddr::V4(v4)) => Some(IpAddr::V6(v4.to_ipv6_mapped())),
        (TYPE_A, IpAddr::V6(v6)) => v6.to_ipv4_mapped().map(IpAddr::V4),
        _ => None,
    }
}

/// Decides which captured queries get an answer and forges it
#[derive(Debug, Clone)]
pub struct Responder {
    own_mac: MacAddr,
    hosts: Hosts,
    all: bool,
    ttl: u32,
}

impl Responder {
    pub fn new(own_mac: MacAddr, hosts: Hosts, all: bool, ttl: u32) -> Self {
        Self {
            own_mac,
            hosts,
            all,
            ttl,
        }
    }

    pub fn hosts(&self) -> &Hosts {
        &self.hosts
    }

    /// Forged reply frame for `raw`, or `None` when the frame is left alone
    pub fn respond(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let eth = EthernetFrame::from_bytes(raw)?;
        if !self.all && eth.destination != self.own_mac {
            return None;
        }

        let ip = Envelope::parse(&eth)?;
        let udp = UdpDatagram::from_bytes(ip.payload())?;
        if udp.destination_port != DNS_PORT {
            return None;
        }
        let query = DnsMessage::parse(&udp.payload).ok()?;
        if !query.is_unanswered_query() {
            return None;
        }

        let (question, address) = query
            .questions
            .iter()
            .find_map(|q| self.hosts.resolve(&q.name).map(|address| (q, address)))?;

        info!(
            name = %question.name,
            address = %address,
            client = %ip.source(),
            "Sending spoofed DNS reply"
        );

        let response = self.response(&query, address);
        let payload = match response.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, name = %question.name, "Error serializing DNS reply");
                return None;
            }
        };

        let udp = UdpDatagram::new(udp.destination_port, udp.source_port, payload)
            .to_bytes_with_checksum(ip.destination(), ip.source());
        let (ethertype, ip) = ip.reply(udp);
        Some(EthernetFrame::new(eth.source, eth.destination, ethertype, ip).to_bytes())
    }

    fn response(&self, query: &DnsMessage, address: IpAddr) -> DnsMessage {
        let mut response = DnsMessage::response_to(query);
        response.answers = query
            .questions
            .iter()
            .filter_map(|q| self.answer(q, address))
            .collect();
        response
    }

    fn answer(&self, question: &DnsQuestion, address: IpAddr) -> Option<DnsRecord> {
        match answer_address(question.qtype, address) {
            Some(ip) => Some(DnsRecord::address(&question.name, question.qclass, self.ttl, ip)),
            None => {
                debug!(name = %question.name, qtype = question.qtype, "Unsupported query type");
                None
            }
        }
    }
}
