//! Error handling for the SNMP fleet simulator

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Walk file parse error at line {line}: {reason}")]
    WalkParse { line: usize, reason: String },

    #[error("Profile not found for device type: {0}")]
    ProfileNotFound(String),

    #[error("Duplicate OID {oid} in profile for device type {device_type}")]
    DuplicateOid { device_type: String, oid: String },

    #[error("No such name")]
    NoSuchName,

    #[error("Port {0} is not assigned to any device type")]
    UnassignedPort(u16),

    #[error("Device pool capacity exceeded")]
    CapacityExceeded,

    #[error("Failed to bind port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("Failed to decode SNMP message: {0}")]
    DecodeFailed(String),

    #[error("Unsupported SNMP version")]
    UnsupportedVersion,

    #[error("Community string mismatch")]
    CommunityMismatch,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    pub fn walk_parse<S: Into<String>>(line: usize, reason: S) -> Self {
        Self::WalkParse {
            line,
            reason: reason.into(),
        }
    }

    pub fn profile_not_found<S: Into<String>>(device_type: S) -> Self {
        Self::ProfileNotFound(device_type.into())
    }

    pub fn duplicate_oid<S: Into<String>>(device_type: S, oid: S) -> Self {
        Self::DuplicateOid {
            device_type: device_type.into(),
            oid: oid.into(),
        }
    }

    pub fn bind_failed<S: Into<String>>(port: u16, reason: S) -> Self {
        Self::BindFailed {
            port,
            reason: reason.into(),
        }
    }

    pub fn decode_failed<S: Into<String>>(msg: S) -> Self {
        Self::DecodeFailed(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}
