//! Parser for `snmpwalk`-style walk-file captures.
//!
//! Each line is `OID = TYPE: VALUE`. Blank lines and lines starting with
//! `#` are skipped. A parse failure on any line aborts the whole file --
//! no partial profile is ever handed to the `ProfileStore`, preserving
//! the atomic-load invariant (spec.md §3, §6).

use crate::behavior::Behavior;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::profile::OidRecord;
use crate::value::{SnmpType, TypedValue};

/// Parse the full contents of a walk file into OID records.
///
/// Every record is given `Behavior::StaticValue`; callers that want
/// dynamic behavior on specific OIDs can post-process the returned
/// records before loading them into the profile store.
pub fn parse(contents: &str) -> Result<Vec<OidRecord>> {
    let mut records = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        records.push(parse_line(line_no, line)?);
    }
    Ok(records)
}

fn parse_line(line_no: usize, line: &str) -> Result<OidRecord> {
    let (oid_part, rest) = line
        .split_once('=')
        .ok_or_else(|| Error::walk_parse(line_no, "missing '=' separator"))?;
    let oid: Oid = oid_part
        .trim()
        .parse()
        .map_err(|_| Error::walk_parse(line_no, format!("invalid OID '{}'", oid_part.trim())))?;

    let (type_part, value_part) = rest
        .split_once(':')
        .ok_or_else(|| Error::walk_parse(line_no, "missing ':' between type and value"))?;
    let type_name = type_part.trim();
    let value_text = value_part.trim();

    if type_name.eq_ignore_ascii_case("NULL") {
        return Ok(OidRecord::new(oid, TypedValue::Null, Behavior::StaticValue));
    }

    let snmp_type = SnmpType::from_name(type_name)
        .ok_or_else(|| Error::walk_parse(line_no, format!("unrecognized type '{type_name}'")))?;

    let value = parse_value(line_no, snmp_type, value_text)?;
    Ok(OidRecord::new(oid, value, Behavior::StaticValue))
}

fn parse_value(line_no: usize, snmp_type: SnmpType, text: &str) -> Result<TypedValue> {
    let unquoted = text.trim_matches('"');
    Ok(match snmp_type {
        SnmpType::Integer => TypedValue::Integer(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid INTEGER '{unquoted}'")))?,
        ),
        SnmpType::OctetString => TypedValue::OctetString(unquoted.as_bytes().to_vec()),
        SnmpType::ObjectIdentifier => TypedValue::ObjectIdentifier(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid OID value '{unquoted}'")))?,
        ),
        SnmpType::Null => TypedValue::Null,
        SnmpType::IpAddress => {
            let octets: Vec<&str> = unquoted.split('.').collect();
            if octets.len() != 4 {
                return Err(Error::walk_parse(line_no, format!("invalid IpAddress '{unquoted}'")));
            }
            let mut ip = [0u8; 4];
            for (i, part) in octets.iter().enumerate() {
                ip[i] = part
                    .parse()
                    .map_err(|_| Error::walk_parse(line_no, format!("invalid IpAddress '{unquoted}'")))?;
            }
            TypedValue::IpAddress(ip)
        }
        SnmpType::Counter32 => TypedValue::Counter32(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid Counter32 '{unquoted}'")))?,
        ),
        SnmpType::Gauge32 => TypedValue::Gauge32(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid Gauge32 '{unquoted}'")))?,
        ),
        SnmpType::TimeTicks => TypedValue::TimeTicks(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid Timeticks '{unquoted}'")))?,
        ),
        SnmpType::Opaque => TypedValue::Opaque(parse_hex_string(line_no, unquoted)?),
        SnmpType::Counter64 => TypedValue::Counter64(
            unquoted
                .parse()
                .map_err(|_| Error::walk_parse(line_no, format!("invalid Counter64 '{unquoted}'")))?,
        ),
        SnmpType::NoSuchObject | SnmpType::NoSuchInstance | SnmpType::EndOfMibView => {
            return Err(Error::walk_parse(
                line_no,
                "exception types cannot appear in a walk file",
            ))
        }
    })
}

fn parse_hex_string(line_no: usize, text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.split_whitespace().collect();
    if cleaned.len() % 2 != 0 {
        return Err(Error::walk_parse(line_no, "hex string has odd length"));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| Error::walk_parse(line_no, format!("invalid hex byte in '{text}'")))
        })
        .collect()
}
