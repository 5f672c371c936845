//! SNMP value types.
//!
//! `TypedValue` tags every value with its declared `SnmpType` so a decoded
//! or simulated value can never lose its type on the way to the wire --
//! in particular an `ObjectIdentifier` must never collapse into a bare
//! `Null` just because some code path forgot to carry the tag along.

use crate::oid::Oid;

/// The SNMP/BER type tags this simulator understands (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnmpType {
    Integer,
    OctetString,
    ObjectIdentifier,
    Null,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpType {
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Some(match normalized.as_str() {
            "INTEGER" | "INTEGER32" => SnmpType::Integer,
            "STRING" | "OCTET_STRING" | "OCTETSTRING" => SnmpType::OctetString,
            "OID" | "OBJECT_IDENTIFIER" | "OBJECTIDENTIFIER" => SnmpType::ObjectIdentifier,
            "NULL" => SnmpType::Null,
            "IPADDRESS" => SnmpType::IpAddress,
            "COUNTER32" | "COUNTER" => SnmpType::Counter32,
            "GAUGE32" | "GAUGE" | "UNSIGNED32" => SnmpType::Gauge32,
            "TIMETICKS" => SnmpType::TimeTicks,
            "OPAQUE" | "HEX_STRING" => SnmpType::Opaque,
            "COUNTER64" => SnmpType::Counter64,
            _ => return None,
        })
    }
}

/// A value paired with the type it was declared as.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    Null,
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    /// v2c exception values -- only ever synthesized, never read from a
    /// profile; they carry no payload of their own.
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl TypedValue {
    pub fn snmp_type(&self) -> SnmpType {
        match self {
            TypedValue::Integer(_) => SnmpType::Integer,
            TypedValue::OctetString(_) => SnmpType::OctetString,
            TypedValue::ObjectIdentifier(_) => SnmpType::ObjectIdentifier,
            TypedValue::Null => SnmpType::Null,
            TypedValue::IpAddress(_) => SnmpType::IpAddress,
            TypedValue::Counter32(_) => SnmpType::Counter32,
            TypedValue::Gauge32(_) => SnmpType::Gauge32,
            TypedValue::TimeTicks(_) => SnmpType::TimeTicks,
            TypedValue::Opaque(_) => SnmpType::Opaque,
            TypedValue::Counter64(_) => SnmpType::Counter64,
            TypedValue::NoSuchObject => SnmpType::NoSuchObject,
            TypedValue::NoSuchInstance => SnmpType::NoSuchInstance,
            TypedValue::EndOfMibView => SnmpType::EndOfMibView,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            TypedValue::NoSuchObject | TypedValue::NoSuchInstance | TypedValue::EndOfMibView
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_identifier_never_becomes_null() {
        let v = TypedValue::ObjectIdentifier("1.3.6.1.2.1.1.2.0".parse().unwrap());
        assert_eq!(v.snmp_type(), SnmpType::ObjectIdentifier);
        assert_ne!(v.snmp_type(), SnmpType::Null);
    }

    #[test]
    fn type_name_parsing_is_case_insensitive() {
        assert_eq!(SnmpType::from_name("Counter32"), Some(SnmpType::Counter32));
        assert_eq!(SnmpType::from_name("COUNTER32"), Some(SnmpType::Counter32));
        assert_eq!(
            SnmpType::from_name("OBJECT IDENTIFIER"),
            Some(SnmpType::ObjectIdentifier)
        );
        assert_eq!(
            SnmpType::from_name("OCTET STRING"),
            Some(SnmpType::OctetString)
        );
        assert_eq!(SnmpType::from_name("bogus"), None);
    }
}
