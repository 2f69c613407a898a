//! DNS message codec (RFC 1035)
//!
//! Enough of the format to read queries off the wire (including compressed
//! names) and to write responses. Authority and additional sections are
//! counted on parse but not decoded.

use bytes::{BufMut, BytesMut};
use netspoof_core::{Error, Result};
use std::net::IpAddr;

pub const TYPE_A: u16 = 1;
pub const TYPE_AAAA: u16 = 28;
pub const CLASS_IN: u16 = 1;

/// Standard query opcode
pub const OPCODE_QUERY: u8 = 0;

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_JUMPS: usize = 16;

/// Question section entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Dotted name without the trailing dot
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// Resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub data: Vec<u8>,
}

impl DnsRecord {
    /// `A` or `AAAA` record for `ip`, depending on its family
    pub fn address(name: &str, class: u16, ttl: u32, ip: IpAddr) -> Self {
        let (rtype, data) = match ip {
            IpAddr::V4(v4) => (TYPE_A, v4.octets().to_vec()),
            IpAddr::V6(v6) => (TYPE_AAAA, v6.octets().to_vec()),
        };
        Self {
            name: name.to_string(),
            rtype,
            class,
            ttl,
            data,
        }
    }

    /// Address carried by an `A`/`AAAA` record
    pub fn ip(&self) -> Option<IpAddr> {
        match (self.rtype, self.data.len()) {
            (TYPE_A, 4) => <[u8; 4]>::try_from(self.data.as_slice()).ok().map(IpAddr::from),
            (TYPE_AAAA, 16) => <[u8; 16]>::try_from(self.data.as_slice()).ok().map(IpAddr::from),
            _ => None,
        }
    }
}

/// A DNS message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    /// true for responses
    pub qr: bool,
    pub opcode: u8,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: u8,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl DnsMessage {
    /// A standard query for one name
    pub fn query(id: u16, name: &str, qtype: u16) -> Self {
        Self {
            id,
            recursion_desired: true,
            questions: vec![DnsQuestion {
                name: name.trim_end_matches('.').to_string(),
                qtype,
                qclass: CLASS_IN,
            }],
            ..Default::default()
        }
    }

    /// Empty response skeleton for `query`: same id, same questions
    pub fn response_to(query: &DnsMessage) -> Self {
        Self {
            id: query.id,
            qr: true,
            opcode: OPCODE_QUERY,
            recursion_desired: query.recursion_desired,
            recursion_available: true,
            questions: query.questions.clone(),
            ..Default::default()
        }
    }

    /// A query that still needs an answer
    pub fn is_unanswered_query(&self) -> bool {
        !self.qr && self.opcode == OPCODE_QUERY && !self.questions.is_empty() && self.answers.is_empty()
    }

    fn flags(&self) -> u16 {
        let mut flags = ((self.opcode as u16) & 0x0F) << 11 | (self.rcode as u16 & 0x0F);
        if self.qr {
            flags |= 0x8000;
        }
        if self.authoritative {
            flags |= 0x0400;
        }
        if self.truncated {
            flags |= 0x0200;
        }
        if self.recursion_desired {
            flags |= 0x0100;
        }
        if self.recursion_available {
            flags |= 0x0080;
        }
        flags
    }

    /// Serialize. Names are written uncompressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(512);

        buf.put_u16(self.id);
        buf.put_u16(self.flags());
        buf.put_u16(self.questions.len() as u16);
        buf.put_u16(self.answers.len() as u16);
        buf.put_u16(0);
        buf.put_u16(0);

        for q in &self.questions {
            put_name(&mut buf, &q.name)?;
            buf.put_u16(q.qtype);
            buf.put_u16(q.qclass);
        }

        for rr in &self.answers {
            put_name(&mut buf, &rr.name)?;
            buf.put_u16(rr.rtype);
            buf.put_u16(rr.class);
            buf.put_u32(rr.ttl);
            let rdlen = u16::try_from(rr.data.len())
                .map_err(|_| Error::PacketConstruction("DNS rdata too long".to_string()))?;
            buf.put_u16(rdlen);
            buf.put_slice(&rr.data);
        }

        Ok(buf.to_vec())
    }

    /// Parse a DNS message
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::PacketParsing("DNS header too short".to_string()));
        }

        let read_u16 = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);
        let flags = read_u16(2);
        let qdcount = read_u16(4);
        let ancount = read_u16(6);

        let mut msg = DnsMessage {
            id: read_u16(0),
            qr: flags & 0x8000 != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            authoritative: flags & 0x0400 != 0,
            truncated: flags & 0x0200 != 0,
            recursion_desired: flags & 0x0100 != 0,
            recursion_available: flags & 0x0080 != 0,
            rcode: (flags & 0x0F) as u8,
            questions: Vec::with_capacity(qdcount as usize),
            answers: Vec::with_capacity(ancount as usize),
            authority_count: read_u16(8),
            additional_count: read_u16(10),
        };

        let mut pos = HEADER_LEN;
        for _ in 0..qdcount {
            let (name, next) = read_name(data, pos)?;
            let fixed = take(data, next, 4)?;
            msg.questions.push(DnsQuestion {
                name,
                qtype: u16::from_be_bytes([fixed[0], fixed[1]]),
                qclass: u16::from_be_bytes([fixed[2], fixed[3]]),
            });
            pos = next + 4;
        }

        for _ in 0..ancount {
            let (name, next) = read_name(data, pos)?;
            let fixed = take(data, next, 10)?;
            let rdlen = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;
            let rdata = take(data, next + 10, rdlen)?;
            msg.answers.push(DnsRecord {
                name,
                rtype: u16::from_be_bytes([fixed[0], fixed[1]]),
                class: u16::from_be_bytes([fixed[2], fixed[3]]),
                ttl: u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]),
                data: rdata.to_vec(),
            });
            pos = next + 10 + rdlen;
        }

        Ok(msg)
    }
}

fn take(data: &[u8], at: usize, len: usize) -> Result<&[u8]> {
    data.get(at..at + len)
        .ok_or_else(|| Error::PacketParsing("DNS message truncated".to_string()))
}

fn put_name(buf: &mut BytesMut, name: &str) -> Result<()> {
    let name = name.trim_end_matches('.');
    if name.len() > MAX_NAME_LEN - 2 {
        return Err(Error::PacketConstruction(format!("DNS name too long: {}", name)));
    }

    if !name.is_empty() {
        for label in name.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(Error::PacketConstruction(format!(
                    "Invalid DNS label in {}",
                    name
                )));
            }
            buf.put_u8(label.len() as u8);
            buf.put_slice(label.as_bytes());
        }
    }
    buf.put_u8(0);
    Ok(())
}

/// Read a possibly compressed name starting at `pos`. Returns the dotted
/// name and the offset right after it in the original (uncompressed) stream.
fn read_name(data: &[u8], mut pos: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut total_len = 0usize;
    let mut jumps = 0usize;
    let mut resume_at = None;

    loop {
        let len = *data
            .get(pos)
            .ok_or_else(|| Error::PacketParsing("DNS name truncated".to_string()))?;

        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = take(data, pos + 1, len as usize)?;
                total_len += label.len() + 1;
                if total_len > MAX_NAME_LEN {
                    return Err(Error::PacketParsing("DNS name too long".to_string()));
                }
                // a label must re-encode to the same wire bytes
                let label = std::str::from_utf8(label)
                    .ok()
                    .filter(|label| !label.contains('.'))
                    .ok_or_else(|| Error::PacketParsing("Unrepresentable DNS label".to_string()))?;
                labels.push(label.to_string());
                pos += 1 + len as usize;
            }
            0xC0 => {
                let low = *data
                    .get(pos + 1)
                    .ok_or_else(|| Error::PacketParsing("DNS pointer truncated".to_string()))?;
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(Error::PacketParsing("DNS pointer loop".to_string()));
                }
                if resume_at.is_none() {
                    resume_at = Some(pos + 2);
                }
                pos = (((len & 0x3F) as usize) << 8) | low as usize;
            }
            _ => {
                return Err(Error::PacketParsing("Unsupported DNS label type".to_string()));
            }
        }
    }

    Ok((labels.join("."), resume_at.unwrap_or(pos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_query_wire_format() {
        let bytes = DnsMessage::query(0x1234, "evil.test", TYPE_A).to_bytes().unwrap();

        assert_eq!(&bytes[0..2], &[0x12, 0x34]);
        assert_eq!(&bytes[2..4], &[0x01, 0x00]); // RD
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
        assert_eq!(
            &bytes[12..],
            &[4, b'e', b'v', b'i', b'l', 4, b't', b'e', b's', b't', 0, 0, 1, 0, 1]
        );
    }

    #[test]
    fn test_response_parse() {
        let query = DnsMessage::query(7, "a.com", TYPE_A);
        let mut response = DnsMessage::response_to(&query);
        response.answers.push(DnsRecord::address(
            "a.com",
            CLASS_IN,
            1024,
            IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
        ));

        let parsed = DnsMessage::parse(&response.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.id, 7);
        assert!(parsed.qr);
        assert!(!parsed.is_unanswered_query());
        assert_eq!(parsed.questions, query.questions);
        assert_eq!(parsed.answers[0].ttl, 1024);
        assert_eq!(parsed.answers[0].ip(), Some(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))));
    }

    #[test]
    fn test_compressed_answer_name() {
        // Response for a.com with the answer name as a pointer to offset 12.
        let mut bytes = vec![
            0x00, 0x01, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
            1, b'a', 3, b'c', b'o', b'm', 0, 0x00, 0x01, 0x00, 0x01,
        ];
        bytes.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01, 0, 0, 0, 60, 0, 4, 1, 2, 3, 4]);

        let msg = DnsMessage::parse(&bytes).unwrap();
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].name, "a.com");
        assert_eq!(msg.answers[0].ip(), Some(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))));
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let mut bytes = vec![0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        assert!(DnsMessage::parse(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(DnsMessage::parse(&[0u8; 5]).is_err());
        // claims one question but carries none
        assert!(DnsMessage::parse(&[0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_bad_label_refused() {
        let long = "x".repeat(64);
        assert!(DnsMessage::query(1, &format!("{}.com", long), TYPE_A)
            .to_bytes()
            .is_err());
        assert!(DnsMessage::query(1, "a..com", TYPE_A).to_bytes().is_err());
    }

    #[test]
    fn test_unrepresentable_label_rejected() {
        let header = [0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

        // one label "a.b" would be re-encoded as two labels
        let mut dotted = header.to_vec();
        dotted.extend_from_slice(&[3, b'a', b'.', b'b', 3, b'c', b'o', b'm', 0, 0, 1, 0, 1]);
        assert!(DnsMessage::parse(&dotted).is_err());

        let mut binary = header.to_vec();
        binary.extend_from_slice(&[2, 0xff, 0xfe, 3, b'c', b'o', b'm', 0, 0, 1, 0, 1]);
        assert!(DnsMessage::parse(&binary).is_err());

        let mut plain = header.to_vec();
        plain.extend_from_slice(&[3, b'a', b'-', b'b', 3, b'c', b'o', b'm', 0, 0, 1, 0, 1]);
        assert_eq!(DnsMessage::parse(&plain).unwrap().questions[0].name, "a-b.com");
    }
}
