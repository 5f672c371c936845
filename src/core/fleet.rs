//! Top-level orchestrator: owns the profile store and device pool, loads
//! configured profiles at startup, and runs until told to stop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::pool::{spawn_sweeper, DevicePool, PortRange, PortRangeAssigner};
use crate::profile::{DeviceTypeId, Profile, ProfileStore};
use crate::walkfile;
use crate::Result;

/// Lifecycle events a CLI or embedding application can observe.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    Started,
    ProfileLoaded { device_type: String, record_count: usize },
    Stopped,
    Error { message: String },
}

/// The simulator as a whole: profile store, device pool, and the
/// background sweeper that reaps idle devices.
pub struct FleetSimulator {
    config: AgentConfig,
    profiles: Arc<ProfileStore>,
    pool: Option<Arc<DevicePool>>,
    sweeper: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    event_tx: mpsc::UnboundedSender<FleetEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<FleetEvent>>,
    is_running: Arc<RwLock<bool>>,
    start_time: Option<Instant>,
}

impl FleetSimulator {
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            profiles: Arc::new(ProfileStore::new()),
            pool: None,
            sweeper: None,
            listener: None,
            event_tx,
            event_rx: Some(event_rx),
            is_running: Arc::new(RwLock::new(false)),
            start_time: None,
        })
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<FleetEvent>> {
        self.event_rx.take()
    }

    pub fn profiles(&self) -> Arc<ProfileStore> {
        self.profiles.clone()
    }

    pub fn pool(&self) -> Option<Arc<DevicePool>> {
        self.pool.clone()
    }

    /// Load every configured profile, then bring up the device pool and
    /// sweeper. Traffic is accepted only after every configured profile
    /// has loaded successfully -- a walk-file parse failure at startup is
    /// fatal, not partially applied.
    pub async fn start(&mut self) -> Result<()> {
        info!("starting SNMP fleet simulator");

        for source in &self.config.profiles {
            self.load_profile_source(&source.device_type, &source.walk_file)
                .await?;
        }

        let ranges: Vec<PortRange> = self
            .config
            .port_ranges
            .iter()
            .map(|r| PortRange {
                min: r.min,
                max: r.max,
                device_type: DeviceTypeId::new(&r.device_type),
            })
            .collect();
        let listen_spans: Vec<(u16, u16)> = ranges.iter().map(|r| (r.min, r.max)).collect();

        let idle_ttl = Duration::from_secs(self.config.agent.idle_ttl_secs);
        let pool = Arc::new(DevicePool::new(
            PortRangeAssigner::new(ranges),
            self.config.agent.bind_address.clone(),
            self.config.agent.read_community.clone().into_bytes(),
            self.profiles.clone(),
            Arc::new(self.config.general.clone()),
            self.config.agent.max_devices,
            idle_ttl,
        ));

        self.sweeper = Some(spawn_sweeper(pool.clone(), idle_ttl));
        self.listener = Some(bind_configured_ports(pool.clone(), listen_spans));
        self.pool = Some(pool);

        *self.is_running.write().await = true;
        self.start_time = Some(Instant::now());
        let _ = self.event_tx.send(FleetEvent::Started);
        info!("SNMP fleet simulator started");
        Ok(())
    }

    /// Parse `walk_file` and install it for `device_type`, emitting a
    /// `ProfileLoaded` event on success. Exposed directly so the CLI's
    /// `load-profile` subcommand can call it against a running
    /// in-process simulator without a separate admin RPC.
    pub async fn load_profile_source(
        &self,
        device_type: &str,
        walk_file: &std::path::Path,
    ) -> Result<usize> {
        let contents = std::fs::read_to_string(walk_file)?;
        let records = walkfile::parse(&contents)?;
        let count = records.len();
        let profile = Profile::from_records(records)?;
        let device_type_id = DeviceTypeId::new(device_type);
        self.profiles.load(device_type_id, profile).await;
        let _ = self.event_tx.send(FleetEvent::ProfileLoaded {
            device_type: device_type.to_string(),
            record_count: count,
        });
        info!(device_type, record_count = count, "profile loaded");
        Ok(count)
    }

    pub async fn stop(&mut self) {
        info!("stopping SNMP fleet simulator");
        *self.is_running.write().await = false;
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
        let _ = self.event_tx.send(FleetEvent::Stopped);
        info!("SNMP fleet simulator stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn active_device_count(&self) -> usize {
        self.pool.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl Drop for FleetSimulator {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }
}

/// Drive every port in every configured range into `DevicePool::get_or_create`
/// so the pool's device actors actually bind and start answering traffic --
/// without this, the pool sits empty and nothing ever listens (spec.md
/// §2/§4.6/§4.7).
fn bind_configured_ports(pool: Arc<DevicePool>, ranges: Vec<(u16, u16)>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for (min, max) in ranges {
            for port in min..=max {
                if let Err(e) = pool.get_or_create(port).await {
                    warn!(port, error = %e, "failed to materialize configured port");
                }
            }
        }
    })
}
