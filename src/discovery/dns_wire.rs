// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A minimal DNS message codec covering only what mDNS-SD service
//! advertisement needs: PTR and TXT resource records, with name
//! compression on decode (mDNS responders reuse the service-type name
//! constantly) and uncompressed names on encode.

use thiserror::Error;

/// DNS wire-format errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DnsWireError {
    #[error("truncated DNS message")]
    Truncated,
    #[error("a domain name label exceeded 63 bytes")]
    LabelTooLong,
    #[error("name compression pointer was out of bounds or looped")]
    BadPointer,
}

const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;
const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;

/// A decoded answer relevant to service discovery. Other record types
/// are skipped on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Ptr { name: String, target: String },
    Txt { name: String, strings: Vec<String> },
    Srv { name: String, port: u16, target: String },
    A { name: String, addr: std::net::Ipv4Addr },
    Aaaa { name: String, addr: std::net::Ipv6Addr },
}

fn push_name(buf: &mut Vec<u8>, name: &str) -> Result<(), DnsWireError> {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        if label.len() > 63 {
            return Err(DnsWireError::LabelTooLong);
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    Ok(())
}

fn push_txt_strings(buf: &mut Vec<u8>, strings: &[String]) -> Result<(), DnsWireError> {
    let mut rdata = Vec::new();
    for s in strings {
        if s.len() > 255 {
            return Err(DnsWireError::LabelTooLong);
        }
        rdata.push(s.len() as u8);
        rdata.extend_from_slice(s.as_bytes());
    }
    buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    buf.extend_from_slice(&rdata);
    Ok(())
}

/// Build a response packet (QR=1, AA=1) carrying one PTR answer pointing
/// `service_type` at `instance_name`, and one TXT answer on
/// `instance_name` carrying `dnsaddr=<addr>` strings (and any other
/// caller-supplied attribute strings), both with a one-second TTL as is
/// conventional for mDNS one-shot announcements.
pub fn build_announcement(
    service_type: &str,
    instance_name: &str,
    txt_strings: &[String],
) -> Result<Vec<u8>, DnsWireError> {
    let mut out = Vec::new();
    out.extend_from_slice(&0u16.to_be_bytes()); // transaction id, unused for mDNS
    out.extend_from_slice(&0x8400u16.to_be_bytes()); // QR=1, AA=1
    out.extend_from_slice(&0u16.to_be_bytes()); // qdcount
    out.extend_from_slice(&2u16.to_be_bytes()); // ancount
    out.extend_from_slice(&0u16.to_be_bytes()); // nscount
    out.extend_from_slice(&0u16.to_be_bytes()); // arcount

    push_name(&mut out, service_type)?;
    out.extend_from_slice(&TYPE_PTR.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes()); // ttl
    let mut rdata = Vec::new();
    push_name(&mut rdata, instance_name)?;
    out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(&rdata);

    push_name(&mut out, instance_name)?;
    out.extend_from_slice(&TYPE_TXT.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());
    push_txt_strings(&mut out, txt_strings)?;

    Ok(out)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8, DnsWireError> {
        let b = *self.bytes.get(self.pos).ok_or(DnsWireError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, DnsWireError> {
        let hi = self.u8()? as u16;
        let lo = self.u8()? as u16;
        Ok((hi << 8) | lo)
    }

    fn u32(&mut self) -> Result<u32, DnsWireError> {
        let hi = self.u16()? as u32;
        let lo = self.u16()? as u32;
        Ok((hi << 16) | lo)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DnsWireError> {
        let end = self.pos.checked_add(n).ok_or(DnsWireError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DnsWireError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    /// Read a (possibly compressed) domain name starting at the current
    /// position, following at most one level of compression-pointer
    /// chasing beyond the initial label sequence.
    fn name(&mut self) -> Result<String, DnsWireError> {
        let mut labels = Vec::new();
        let mut pos = self.pos;
        let mut jumped = false;
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > 128 {
                return Err(DnsWireError::BadPointer);
            }
            let len = *self.bytes.get(pos).ok_or(DnsWireError::Truncated)?;
            if len == 0 {
                if !jumped {
                    self.pos = pos + 1;
                }
                break;
            }
            if len & 0xc0 == 0xc0 {
                let lo = *self.bytes.get(pos + 1).ok_or(DnsWireError::Truncated)?;
                let target = (((len & 0x3f) as usize) << 8) | lo as usize;
                if target >= pos {
                    return Err(DnsWireError::BadPointer);
                }
                if !jumped {
                    self.pos = pos + 2;
                    jumped = true;
                }
                pos = target;
                continue;
            }
            let label_start = pos + 1;
            let label_end = label_start + len as usize;
            let label = self.bytes.get(label_start..label_end).ok_or(DnsWireError::Truncated)?;
            labels.push(String::from_utf8_lossy(label).into_owned());
            pos = label_end;
        }
        Ok(labels.join("."))
    }
}

/// Parse the answer section of a DNS/mDNS message, skipping questions and
/// returning only the PTR/TXT answers (additional/authority records are
/// treated the same as answers since mDNS responders commonly place the
/// TXT record there instead).
pub fn parse_answers(bytes: &[u8]) -> Result<Vec<Answer>, DnsWireError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let _id = cursor.u16()?;
    let _flags = cursor.u16()?;
    let qdcount = cursor.u16()?;
    let ancount = cursor.u16()?;
    let nscount = cursor.u16()?;
    let arcount = cursor.u16()?;

    for _ in 0..qdcount {
        let _name = cursor.name()?;
        let _qtype = cursor.u16()?;
        let _qclass = cursor.u16()?;
    }

    let mut answers = Vec::new();
    let record_count = ancount as u32 + nscount as u32 + arcount as u32;
    for _ in 0..record_count {
        let name = cursor.name()?;
        let rtype = cursor.u16()?;
        let _rclass = cursor.u16()?;
        let _ttl = cursor.u32()?;
        let rdlength = cursor.u16()? as usize;
        let rdata_start = cursor.pos;
        match rtype {
            TYPE_PTR => {
                let target = cursor.name()?;
                answers.push(Answer::Ptr { name, target });
            }
            TYPE_TXT => {
                let rdata = cursor.take(rdlength)?;
                let mut strings = Vec::new();
                let mut i = 0;
                while i < rdata.len() {
                    let len = rdata[i] as usize;
                    i += 1;
                    let end = i.checked_add(len).ok_or(DnsWireError::Truncated)?;
                    let s = rdata.get(i..end).ok_or(DnsWireError::Truncated)?;
                    strings.push(String::from_utf8_lossy(s).into_owned());
                    i = end;
                }
                answers.push(Answer::Txt { name, strings });
            }
            TYPE_SRV => {
                let _priority = cursor.u16()?;
                let _weight = cursor.u16()?;
                let port = cursor.u16()?;
                let target = cursor.name()?;
                answers.push(Answer::Srv { name, port, target });
            }
            TYPE_A => {
                let bytes4 = cursor.take(4)?;
                let addr = std::net::Ipv4Addr::new(bytes4[0], bytes4[1], bytes4[2], bytes4[3]);
                answers.push(Answer::A { name, addr });
            }
            TYPE_AAAA => {
                let bytes16 = cursor.take(16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes16);
                answers.push(Answer::Aaaa { name, addr: std::net::Ipv6Addr::from(octets) });
            }
            _ => {
                cursor.take(rdlength)?;
            }
        }
        // Name/PTR-target parsing may consume more or less than rdlength
        // when compression pointers are involved; resynchronize to the
        // record boundary the length field declared.
        cursor.pos = rdata_start + rdlength;
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_round_trips_through_parse_answers() {
        let strings = vec!["dnsaddr=/ip4/127.0.0.1/tcp/4001/p2p/QmTest".to_string()];
        let packet = build_announcement("_p2p._udp.local", "node1._p2p._udp.local", &strings).unwrap();
        let answers = parse_answers(&packet).unwrap();

        assert_eq!(answers.len(), 2);
        assert_eq!(
            answers[0],
            Answer::Ptr {
                name: "_p2p._udp.local".to_string(),
                target: "node1._p2p._udp.local".to_string(),
            }
        );
        assert_eq!(
            answers[1],
            Answer::Txt { name: "node1._p2p._udp.local".to_string(), strings }
        );
    }

    #[test]
    fn multiple_txt_strings_round_trip() {
        let strings = vec!["dnsaddr=/ip4/10.0.0.1/tcp/1".to_string(), "dnsaddr=/ip4/10.0.0.1/udp/1/quic-v1".to_string()];
        let packet = build_announcement("_p2p._udp.local", "n._p2p._udp.local", &strings).unwrap();
        let answers = parse_answers(&packet).unwrap();
        match &answers[1] {
            Answer::Txt { strings: got, .. } => assert_eq!(got, &strings),
            other => panic!("expected TXT, got {other:?}"),
        }
    }

    #[test]
    fn truncated_message_is_rejected() {
        let err = parse_answers(&[0, 1, 2]).unwrap_err();
        assert_eq!(err, DnsWireError::Truncated);
    }
}
