//! SNMP fleet simulator CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use snmp_fleet_sim::{
    config::AgentConfig,
    core::fleet::{FleetEvent, FleetSimulator},
    utils::setup_logging,
    Result,
};

#[derive(Parser)]
#[command(name = "snmp-fleet-sim")]
#[command(about = "Large-scale SNMP agent simulator")]
#[command(version = snmp_fleet_sim::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the simulator: load profiles, bind devices lazily, run until Ctrl+C
    Start,
    /// Parse a walk file and load it as a device-type profile
    LoadProfile {
        /// Device type to load the profile under
        device_type: String,
        /// Path to the snmpwalk-style walk file
        walk_file: PathBuf,
    },
    /// Validate configuration without starting the simulator
    ValidateConfig,
    /// Generate default configuration
    GenerateConfig {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(&cli).await?;
    setup_logging(&config.logging)?;

    info!("Starting {} v{}", snmp_fleet_sim::NAME, snmp_fleet_sim::VERSION);
    info!("Description: {}", snmp_fleet_sim::DESCRIPTION);

    match &cli.command {
        Some(Commands::Start) | None => run_simulator(config).await,
        Some(Commands::LoadProfile {
            device_type,
            walk_file,
        }) => load_profile(config, device_type, walk_file).await,
        Some(Commands::ValidateConfig) => validate_configuration(&config).await,
        Some(Commands::GenerateConfig { output }) => generate_default_config(output.clone()).await,
    }
}

async fn load_configuration(cli: &Cli) -> Result<AgentConfig> {
    let config = if let Some(config_path) = &cli.config {
        AgentConfig::load_from_file(config_path)?
    } else {
        match AgentConfig::load_from_env() {
            Ok(config) => config,
            Err(_) => AgentConfig::default_config(),
        }
    };

    config.validate()?;
    Ok(config)
}

async fn run_simulator(config: AgentConfig) -> Result<()> {
    info!("initializing SNMP fleet simulator");

    let mut sim = FleetSimulator::new(config)?;
    let mut event_rx = sim
        .take_event_receiver()
        .ok_or_else(|| snmp_fleet_sim::Error::internal("failed to get event receiver"))?;

    sim.start().await?;

    let event_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_fleet_event(event);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(err) => error!("unable to listen for shutdown signal: {}", err),
    }

    sim.stop().await;
    event_task.abort();

    info!("SNMP fleet simulator shutdown complete");
    Ok(())
}

fn handle_fleet_event(event: FleetEvent) {
    match event {
        FleetEvent::Started => info!("fleet simulator started"),
        FleetEvent::ProfileLoaded {
            device_type,
            record_count,
        } => info!(device_type, record_count, "profile loaded"),
        FleetEvent::Stopped => info!("fleet simulator stopped"),
        FleetEvent::Error { message } => error!("fleet simulator error: {}", message),
    }
}

async fn load_profile(
    config: AgentConfig,
    device_type: &str,
    walk_file: &PathBuf,
) -> Result<()> {
    let sim = FleetSimulator::new(config)?;
    let count = sim.load_profile_source(device_type, walk_file).await?;
    println!("Loaded {} records for device type '{}'", count, device_type);
    Ok(())
}

async fn validate_configuration(config: &AgentConfig) -> Result<()> {
    config.validate()?;

    println!("Configuration is valid");
    println!("  Node ID: {}", config.general.node_id);
    println!("  Bind address: {}", config.agent.bind_address);
    println!("  Max devices: {}", config.agent.max_devices);
    println!("  Idle TTL (secs): {}", config.agent.idle_ttl_secs);
    for range in &config.port_ranges {
        println!(
            "  Port range {}-{} -> {}",
            range.min, range.max, range.device_type
        );
    }
    for profile in &config.profiles {
        println!(
            "  Profile: {} <- {}",
            profile.device_type,
            profile.walk_file.display()
        );
    }

    Ok(())
}

async fn generate_default_config(output_path: Option<PathBuf>) -> Result<()> {
    let config = AgentConfig::default_config();
    let toml_content = toml::to_string_pretty(&config)
        .map_err(|e| snmp_fleet_sim::Error::internal(format!("failed to serialize config: {}", e)))?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, toml_content)?;
            println!("Default configuration written to: {}", path.display());
        }
        None => println!("{}", toml_content),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_generation() {
        let result = generate_default_config(None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_config_validation() {
        let config = AgentConfig::default_config();
        let result = validate_configuration(&config).await;
        assert!(result.is_ok());
    }
}
