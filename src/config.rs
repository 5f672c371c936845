//! Configuration management for the SNMP fleet simulator

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub general: GeneralConfig,
    pub agent: AgentRuntimeConfig,
    pub port_ranges: Vec<PortRangeAssignment>,
    pub profiles: Vec<ProfileSource>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub node_id: String,
    pub description: String,
    pub location: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    pub bind_address: String,
    pub read_community: String,
    pub max_devices: usize,
    pub idle_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRangeAssignment {
    pub min: u16,
    pub max: u16,
    pub device_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSource {
    pub device_type: String,
    pub walk_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub max_size: u64,
    pub max_files: u32,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "full")]
    Full,
}

impl AgentConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&contents)
            .map_err(|e| Error::parse(format!("Invalid TOML: {}", e)))?;
        Ok(config)
    }

    pub fn load_from_env() -> Result<Self> {
        let settings = config::Config::builder().add_source(
            config::Environment::with_prefix("SNMPSIM").separator("_"),
        );
        let built = settings.build()?;
        let agent_config = built.try_deserialize()?;
        Ok(agent_config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.max_devices == 0 {
            return Err(Error::parse("agent.max_devices must be greater than 0"));
        }
        if self.agent.idle_ttl_secs == 0 {
            return Err(Error::parse("agent.idle_ttl_secs must be greater than 0"));
        }
        if self.port_ranges.is_empty() {
            return Err(Error::parse("at least one port range must be configured"));
        }
        for range in &self.port_ranges {
            if range.min > range.max {
                return Err(Error::parse(format!(
                    "invalid port range {}-{} for device type {}",
                    range.min, range.max, range.device_type
                )));
            }
        }
        // Every port range must name a device type with a profile source,
        // otherwise the range can never serve real traffic.
        for range in &self.port_ranges {
            if !self
                .profiles
                .iter()
                .any(|p| p.device_type == range.device_type)
            {
                return Err(Error::parse(format!(
                    "port range for device type '{}' has no matching profile source",
                    range.device_type
                )));
            }
        }
        Ok(())
    }

    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig {
                node_id: "snmp-fleet-sim-1".to_string(),
                description: "SNMP fleet simulator".to_string(),
                location: "Network Operations Center".to_string(),
                contact: "admin@snmp-fleet-sim.local".to_string(),
            },
            agent: AgentRuntimeConfig {
                bind_address: "0.0.0.0".to_string(),
                read_community: "public".to_string(),
                max_devices: 10_000,
                idle_ttl_secs: 600,
            },
            port_ranges: vec![PortRangeAssignment {
                min: 30000,
                max: 37999,
                device_type: "cable_modem".to_string(),
            }],
            profiles: vec![ProfileSource {
                device_type: "cable_modem".to_string(),
                walk_file: PathBuf::from("profiles/cable_modem.walk"),
            }],
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("/var/log/snmp-fleet-sim.log".to_string()),
                max_size: 100 * 1024 * 1024,
                max_files: 10,
                format: LogFormat::Json,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        AgentConfig::default_config().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_port_range() {
        let mut config = AgentConfig::default_config();
        config.port_ranges[0].min = 40000;
        config.port_ranges[0].max = 30000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_port_range_with_no_profile() {
        let mut config = AgentConfig::default_config();
        config.port_ranges.push(PortRangeAssignment {
            min: 40000,
            max: 40099,
            device_type: "set_top_box".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_devices() {
        let mut config = AgentConfig::default_config();
        config.agent.max_devices = 0;
        assert!(config.validate().is_err());
    }
}
