//! SNMP fleet simulator
//!
//! Exposes thousands of independently-addressable virtual SNMP agents
//! over UDP, each bound to its own port, answering SNMPv1/v2c GET,
//! GET-NEXT and GET-BULK out of a device-type profile -- for load-testing
//! and functional exercise of network-management tooling.

pub mod behavior;
pub mod codec;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod oid;
pub mod pool;
pub mod profile;
pub mod utils;
pub mod value;
pub mod walkfile;

pub use error::{Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");