//! Hand-rolled BER/DER encoder and decoder for SNMPv1/v2c messages.
//!
//! No external `snmp`/`ber`/`der-parser` crate is pulled in for this --
//! the wire format is small and fixed, and a dependency buys nothing a
//! few hundred lines of push/pull code doesn't already give us directly.
//! The builder pushes child TLVs bottom-up into owned `Vec<u8>`s and lets
//! parents wrap them, mirroring the push-style BER builders found
//! throughout the Rust SNMP ecosystem; the reader is a simple cursor over
//! a borrowed byte slice.

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::TypedValue;

// ASN.1 universal tags.
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OBJECT_IDENTIFIER: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;

// SNMP application-wide type tags.
pub const TAG_IP_ADDRESS: u8 = 0x40;
pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIMETICKS: u8 = 0x43;
pub const TAG_OPAQUE: u8 = 0x44;
pub const TAG_COUNTER64: u8 = 0x46;

// SNMP context-specific PDU tags.
pub const PDU_GET_REQUEST: u8 = 0xA0;
pub const PDU_GET_NEXT_REQUEST: u8 = 0xA1;
pub const PDU_RESPONSE: u8 = 0xA2;
pub const PDU_SET_REQUEST: u8 = 0xA3;
pub const PDU_GET_BULK_REQUEST: u8 = 0xA5;

// SNMP context-specific exception value tags (used in place of a real
// value inside a varbind).
pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

pub const VERSION_V1: i64 = 0;
pub const VERSION_V2C: i64 = 1;

/// A decoded PDU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    GetNextRequest,
    GetBulkRequest,
    SetRequest,
    Response,
}

impl PduKind {
    fn tag(self) -> u8 {
        match self {
            PduKind::GetRequest => PDU_GET_REQUEST,
            PduKind::GetNextRequest => PDU_GET_NEXT_REQUEST,
            PduKind::GetBulkRequest => PDU_GET_BULK_REQUEST,
            PduKind::SetRequest => PDU_SET_REQUEST,
            PduKind::Response => PDU_RESPONSE,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            PDU_GET_REQUEST => PduKind::GetRequest,
            PDU_GET_NEXT_REQUEST => PduKind::GetNextRequest,
            PDU_GET_BULK_REQUEST => PduKind::GetBulkRequest,
            PDU_SET_REQUEST => PduKind::SetRequest,
            PDU_RESPONSE => PduKind::Response,
            other => return Err(Error::decode_failed(format!("unknown PDU tag 0x{other:02x}"))),
        })
    }
}

/// A single OID/value pair as it appears in a varbind list.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: TypedValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: TypedValue) -> Self {
        Self { oid, value }
    }
}

/// A fully decoded SNMP message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub kind: PduKind,
    pub request_id: i32,
    /// GET-BULK: non-repeaters. Everywhere else: error-status.
    pub error_status: i32,
    /// GET-BULK: max-repetitions. Everywhere else: error-index.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

// ---------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 128 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        let significant = &bytes[first_nonzero..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn encode_sequence(tag: u8, children: &[Vec<u8>]) -> Vec<u8> {
    let content: Vec<u8> = children.iter().flatten().copied().collect();
    encode_tlv(tag, &content)
}

/// Minimal two's-complement big-endian encoding (BER INTEGER content).
fn encode_integer_content(mut n: i64) -> Vec<u8> {
    if n == 0 {
        return vec![0];
    }
    let mut bytes = Vec::new();
    let negative = n < 0;
    loop {
        bytes.push((n & 0xff) as u8);
        n >>= 8;
        if (negative && n == -1 && (bytes.last().unwrap() & 0x80 != 0))
            || (!negative && n == 0 && (bytes.last().unwrap() & 0x80 == 0))
        {
            break;
        }
    }
    bytes.reverse();
    bytes
}

pub fn encode_integer(n: i64) -> Vec<u8> {
    encode_tlv(TAG_INTEGER, &encode_integer_content(n))
}

/// Minimal big-endian encoding for an always-non-negative value (Counter32,
/// Gauge32, TimeTicks, Counter64). A leading 0x00 is inserted when the
/// high bit of the most significant byte would otherwise be set, so the
/// content never gets misread as a negative INTEGER.
fn encode_unsigned_content(n: u64) -> Vec<u8> {
    if n == 0 {
        return vec![0];
    }
    let mut bytes = n.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

fn decode_unsigned_content(bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() {
        return Err(Error::decode_failed("empty unsigned INTEGER content"));
    }
    if bytes.len() > 9 {
        return Err(Error::decode_failed("unsigned INTEGER too wide"));
    }
    let mut buf = [0u8; 8];
    let trimmed = if bytes.len() == 9 { &bytes[1..] } else { bytes };
    let start = 8 - trimmed.len();
    buf[start..].copy_from_slice(trimmed);
    Ok(u64::from_be_bytes(buf))
}

pub fn encode_octet_string(bytes: &[u8]) -> Vec<u8> {
    encode_tlv(TAG_OCTET_STRING, bytes)
}

pub fn encode_null() -> Vec<u8> {
    encode_tlv(TAG_NULL, &[])
}

pub fn encode_oid(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    if arcs.len() < 2 {
        return encode_tlv(TAG_OBJECT_IDENTIFIER, &[]);
    }
    let mut content = Vec::new();
    content.push((arcs[0] * 40 + arcs[1]) as u8);
    for &arc in &arcs[2..] {
        content.extend(encode_base128(arc));
    }
    encode_tlv(TAG_OBJECT_IDENTIFIER, &content)
}

fn encode_base128(mut n: u32) -> Vec<u8> {
    let mut groups = vec![(n & 0x7f) as u8];
    n >>= 7;
    while n > 0 {
        groups.push((n & 0x7f) as u8 | 0x80);
        n >>= 7;
    }
    groups.reverse();
    groups
}

pub fn encode_value(value: &TypedValue) -> Vec<u8> {
    match value {
        TypedValue::Integer(i) => encode_integer(*i),
        TypedValue::OctetString(bytes) => encode_octet_string(bytes),
        TypedValue::ObjectIdentifier(oid) => encode_oid(oid),
        TypedValue::Null => encode_null(),
        TypedValue::IpAddress(ip) => encode_tlv(TAG_IP_ADDRESS, ip),
        TypedValue::Counter32(n) => encode_tlv(TAG_COUNTER32, &encode_unsigned_content(*n as u64)),
        TypedValue::Gauge32(n) => encode_tlv(TAG_GAUGE32, &encode_unsigned_content(*n as u64)),
        TypedValue::TimeTicks(n) => encode_tlv(TAG_TIMETICKS, &encode_unsigned_content(*n as u64)),
        TypedValue::Opaque(bytes) => encode_tlv(TAG_OPAQUE, bytes),
        TypedValue::Counter64(n) => encode_tlv(TAG_COUNTER64, &encode_unsigned_content(*n)),
        TypedValue::NoSuchObject => encode_tlv(TAG_NO_SUCH_OBJECT, &[]),
        TypedValue::NoSuchInstance => encode_tlv(TAG_NO_SUCH_INSTANCE, &[]),
        TypedValue::EndOfMibView => encode_tlv(TAG_END_OF_MIB_VIEW, &[]),
    }
}

fn encode_varbind(vb: &VarBind) -> Vec<u8> {
    encode_sequence(TAG_SEQUENCE, &[encode_oid(&vb.oid), encode_value(&vb.value)])
}

fn encode_varbind_list(varbinds: &[VarBind]) -> Vec<u8> {
    let children: Vec<Vec<u8>> = varbinds.iter().map(encode_varbind).collect();
    encode_sequence(TAG_SEQUENCE, &children)
}

/// Encode a full SNMP message: version + community + PDU.
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let pdu_body = encode_sequence(
        msg.kind.tag(),
        &[
            encode_integer(msg.request_id as i64),
            encode_integer(msg.error_status as i64),
            encode_integer(msg.error_index as i64),
            encode_varbind_list(&msg.varbinds),
        ],
    );
    encode_sequence(
        TAG_SEQUENCE,
        &[
            encode_integer(msg.version),
            encode_octet_string(&msg.community),
            pdu_body,
        ],
    )
}

// ---------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::decode_failed("unexpected end of message"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let n_bytes = (first & 0x7f) as usize;
        if n_bytes == 0 || n_bytes > 8 {
            return Err(Error::decode_failed("unsupported BER length form"));
        }
        if self.remaining() < n_bytes {
            return Err(Error::decode_failed("truncated length"));
        }
        let mut len: usize = 0;
        for _ in 0..n_bytes {
            len = (len << 8) | self.read_byte()? as usize;
        }
        Ok(len)
    }

    /// Read a tag/length/content TLV, returning the tag and the content
    /// slice.
    fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.read_byte()?;
        let len = self.read_length()?;
        if self.remaining() < len {
            return Err(Error::decode_failed("truncated TLV content"));
        }
        let content = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok((tag, content))
    }

    fn read_tlv_expect(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(Error::decode_failed(format!(
                "expected tag 0x{expected:02x}, got 0x{tag:02x}"
            )));
        }
        Ok(content)
    }
}

fn decode_integer_content(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() {
        return Err(Error::decode_failed("empty INTEGER content"));
    }
    if bytes.len() > 8 {
        return Err(Error::decode_failed("INTEGER too wide"));
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xffu8 } else { 0u8 }; 8];
    let start = 8 - bytes.len();
    buf[start..].copy_from_slice(bytes);
    Ok(i64::from_be_bytes(buf))
}

fn decode_oid_content(bytes: &[u8]) -> Result<Oid> {
    if bytes.is_empty() {
        return Ok(Oid::new(Vec::new()));
    }
    let first = bytes[0] as u32;
    let mut arcs = vec![first / 40, first % 40];
    let mut acc: u32 = 0;
    for &b in &bytes[1..] {
        acc = (acc << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
        }
    }
    Ok(Oid::new(arcs))
}

pub fn decode_value(tag: u8, content: &[u8]) -> Result<TypedValue> {
    Ok(match tag {
        TAG_INTEGER => TypedValue::Integer(decode_integer_content(content)?),
        TAG_OCTET_STRING => TypedValue::OctetString(content.to_vec()),
        TAG_OBJECT_IDENTIFIER => TypedValue::ObjectIdentifier(decode_oid_content(content)?),
        TAG_NULL => TypedValue::Null,
        TAG_IP_ADDRESS => {
            if content.len() != 4 {
                return Err(Error::decode_failed("IpAddress must be 4 bytes"));
            }
            let mut ip = [0u8; 4];
            ip.copy_from_slice(content);
            TypedValue::IpAddress(ip)
        }
        TAG_COUNTER32 => TypedValue::Counter32(decode_unsigned_content(content)? as u32),
        TAG_GAUGE32 => TypedValue::Gauge32(decode_unsigned_content(content)? as u32),
        TAG_TIMETICKS => TypedValue::TimeTicks(decode_unsigned_content(content)? as u32),
        TAG_OPAQUE => TypedValue::Opaque(content.to_vec()),
        TAG_COUNTER64 => TypedValue::Counter64(decode_unsigned_content(content)?),
        TAG_NO_SUCH_OBJECT => TypedValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => TypedValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => TypedValue::EndOfMibView,
        other => return Err(Error::decode_failed(format!("unknown value tag 0x{other:02x}"))),
    })
}

fn decode_varbind_list(content: &[u8]) -> Result<Vec<VarBind>> {
    let mut reader = Reader::new(content);
    let mut varbinds = Vec::new();
    while reader.remaining() > 0 {
        let seq = reader.read_tlv_expect(TAG_SEQUENCE)?;
        let mut inner = Reader::new(seq);
        let (oid_tag, oid_content) = inner.read_tlv()?;
        if oid_tag != TAG_OBJECT_IDENTIFIER {
            return Err(Error::decode_failed("varbind missing OID"));
        }
        let oid = decode_oid_content(oid_content)?;
        let (value_tag, value_content) = inner.read_tlv()?;
        let value = decode_value(value_tag, value_content)?;
        varbinds.push(VarBind::new(oid, value));
    }
    Ok(varbinds)
}

/// Decode a full SNMP message off the wire.
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    let mut top = Reader::new(bytes);
    let envelope = top.read_tlv_expect(TAG_SEQUENCE)?;
    let mut reader = Reader::new(envelope);

    let version_bytes = reader.read_tlv_expect(TAG_INTEGER)?;
    let version = decode_integer_content(version_bytes)?;
    if version != VERSION_V1 && version != VERSION_V2C {
        return Err(Error::UnsupportedVersion);
    }

    let community = reader.read_tlv_expect(TAG_OCTET_STRING)?.to_vec();

    let (pdu_tag, pdu_content) = reader.read_tlv()?;
    let kind = PduKind::from_tag(pdu_tag)?;

    let mut pdu_reader = Reader::new(pdu_content);
    let request_id = decode_integer_content(pdu_reader.read_tlv_expect(TAG_INTEGER)?)? as i32;
    let error_status = decode_integer_content(pdu_reader.read_tlv_expect(TAG_INTEGER)?)? as i32;
    let error_index = decode_integer_content(pdu_reader.read_tlv_expect(TAG_INTEGER)?)? as i32;
    let varbind_list_content = pdu_reader.read_tlv_expect(TAG_SEQUENCE)?;
    let varbinds = decode_varbind_list(varbind_list_content)?;

    Ok(Message {
        version,
        community,
        kind,
        request_id,
        error_status,
        error_index,
        varbinds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_roundtrip() {
        let oid: Oid = "1.3.6.1.2.1.1.1.0".parse().unwrap();
        let encoded = encode_oid(&oid);
        let mut reader = Reader::new(&encoded);
        let content = reader.read_tlv_expect(TAG_OBJECT_IDENTIFIER).unwrap();
        let decoded = decode_oid_content(content).unwrap();
        assert_eq!(decoded, oid);
    }

    #[test]
    fn oid_roundtrip_large_arc() {
        let oid: Oid = "1.3.6.1.4.1.9999.123456.7".parse().unwrap();
        let encoded = encode_oid(&oid);
        let mut reader = Reader::new(&encoded);
        let content = reader.read_tlv_expect(TAG_OBJECT_IDENTIFIER).unwrap();
        let decoded = decode_oid_content(content).unwrap();
        assert_eq!(decoded, oid);
    }

    #[test]
    fn integer_roundtrip_including_negative() {
        for n in [0i64, 1, -1, 127, 128, -128, -129, i32::MAX as i64, i32::MIN as i64] {
            let encoded = encode_integer(n);
            let mut reader = Reader::new(&encoded);
            let content = reader.read_tlv_expect(TAG_INTEGER).unwrap();
            assert_eq!(decode_integer_content(content).unwrap(), n);
        }
    }

    #[test]
    fn object_identifier_value_survives_roundtrip() {
        let value = TypedValue::ObjectIdentifier("1.3.6.1.2.1.1.2.0".parse().unwrap());
        let encoded = encode_value(&value);
        let mut reader = Reader::new(&encoded);
        let (tag, content) = reader.read_tlv().unwrap();
        let decoded = decode_value(tag, content).unwrap();
        assert_eq!(decoded, value);
        assert_ne!(decoded, TypedValue::Null);
    }

    #[test]
    fn sentinel_tags_roundtrip() {
        for value in [
            TypedValue::NoSuchObject,
            TypedValue::NoSuchInstance,
            TypedValue::EndOfMibView,
        ] {
            let encoded = encode_value(&value);
            let mut reader = Reader::new(&encoded);
            let (tag, content) = reader.read_tlv().unwrap();
            assert_eq!(decode_value(tag, content).unwrap(), value);
        }
    }

    #[test]
    fn message_roundtrip_get_request() {
        let msg = Message {
            version: VERSION_V2C,
            community: b"public".to_vec(),
            kind: PduKind::GetRequest,
            request_id: 42,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(
                "1.3.6.1.2.1.1.1.0".parse().unwrap(),
                TypedValue::Null,
            )],
        };
        let encoded = encode_message(&msg);
        let decoded = decode_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn message_roundtrip_get_bulk_request() {
        let msg = Message {
            version: VERSION_V2C,
            community: b"public".to_vec(),
            kind: PduKind::GetBulkRequest,
            request_id: 7,
            error_status: 0,  // non-repeaters
            error_index: 10,  // max-repetitions
            varbinds: vec![VarBind::new(
                "1.3.6.1.2.1.2.2.1".parse().unwrap(),
                TypedValue::Null,
            )],
        };
        let encoded = encode_message(&msg);
        let decoded = decode_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_unsupported_version() {
        let msg = Message {
            version: 3, // v3, explicitly out of scope
            community: b"public".to_vec(),
            kind: PduKind::GetRequest,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![],
        };
        let encoded = encode_message(&msg);
        let err = decode_message(&encoded).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion));
    }

    #[test]
    fn counter_and_gauge_values_survive_roundtrip() {
        for value in [
            TypedValue::Counter32(u32::MAX),
            TypedValue::Gauge32(123456),
            TypedValue::TimeTicks(987654),
            TypedValue::Counter64(u64::MAX / 2),
            TypedValue::IpAddress([192, 0, 2, 1]),
            TypedValue::Opaque(vec![0xde, 0xad, 0xbe, 0xef]),
        ] {
            let encoded = encode_value(&value);
            let mut reader = Reader::new(&encoded);
            let (tag, content) = reader.read_tlv().unwrap();
            assert_eq!(decode_value(tag, content).unwrap(), value);
        }
    }
}
