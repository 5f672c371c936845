//! Lazy device materialization, port range assignment, and idle reaping.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::GeneralConfig;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::profile::{DeviceTypeId, ProfileStore};

/// One `min..=max` port range mapped to the device type served on it
/// (spec.md §2 "Port Range Assigner").
#[derive(Debug, Clone)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
    pub device_type: DeviceTypeId,
}

/// Static lookup from port number to the device type that owns it.
#[derive(Debug, Default)]
pub struct PortRangeAssigner {
    ranges: Vec<PortRange>,
}

impl PortRangeAssigner {
    pub fn new(ranges: Vec<PortRange>) -> Self {
        Self { ranges }
    }

    pub fn device_type_for(&self, port: u16) -> Option<&DeviceTypeId> {
        self.ranges
            .iter()
            .find(|r| port >= r.min && port <= r.max)
            .map(|r| &r.device_type)
    }

    pub fn total_ports(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| (r.max - r.min) as usize + 1)
            .sum()
    }
}

/// Port-keyed registry of live device actors. Devices are created lazily
/// on first traffic to their port and reaped after `idle_ttl` of silence.
pub struct DevicePool {
    devices: DashMap<u16, Arc<Device>>,
    handles: DashMap<u16, JoinHandle<Result<()>>>,
    assigner: PortRangeAssigner,
    bind_address: String,
    read_community: Vec<u8>,
    profiles: Arc<ProfileStore>,
    general: Arc<GeneralConfig>,
    max_devices: usize,
    idle_ttl: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl DevicePool {
    pub fn new(
        assigner: PortRangeAssigner,
        bind_address: String,
        read_community: Vec<u8>,
        profiles: Arc<ProfileStore>,
        general: Arc<GeneralConfig>,
        max_devices: usize,
        idle_ttl: Duration,
    ) -> Self {
        let (shutdown_tx, _rx) = watch::channel(false);
        Self {
            devices: DashMap::new(),
            handles: DashMap::new(),
            assigner,
            bind_address,
            read_community,
            profiles,
            general,
            max_devices,
            idle_ttl,
            shutdown_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Return the device actor for `port`, materializing and spawning it
    /// on first use. Not a pure getter: the first call for a port starts
    /// its background task.
    pub async fn get_or_create(&self, port: u16) -> Result<Arc<Device>> {
        if let Some(existing) = self.devices.get(&port) {
            return Ok(existing.clone());
        }

        if self.devices.len() >= self.max_devices {
            self.evict_one_idle();
            if self.devices.len() >= self.max_devices {
                return Err(Error::CapacityExceeded);
            }
        }

        let device_type = self
            .assigner
            .device_type_for(port)
            .cloned()
            .ok_or(Error::UnassignedPort(port))?;

        let device = Device::new(
            device_type,
            port,
            self.bind_address.clone(),
            self.read_community.clone(),
            self.profiles.clone(),
            self.general.clone(),
        );

        let recv_timeout = self.idle_ttl.checked_div(4).unwrap_or(Duration::from_secs(1));
        let recv_timeout = recv_timeout.min(Duration::from_secs(1));
        let shutdown_rx = self.shutdown_tx.subscribe();
        let spawned = device.clone();
        let handle = tokio::spawn(async move { spawned.run(shutdown_rx, recv_timeout).await });

        self.devices.insert(port, device.clone());
        self.handles.insert(port, handle);
        Ok(device)
    }

    /// Evict the single idlest device, if any exist. Called when the pool
    /// is at capacity and a new port is requested.
    fn evict_one_idle(&self) {
        let idlest = self
            .devices
            .iter()
            .max_by_key(|entry| entry.value().idle_for())
            .map(|entry| *entry.key());
        if let Some(port) = idlest {
            self.remove(port);
        }
    }

    /// Drop a device from the pool and abort its task. Used both by
    /// eviction and by the sweeper.
    pub fn remove(&self, port: u16) {
        self.devices.remove(&port);
        if let Some((_, handle)) = self.handles.remove(&port) {
            handle.abort();
        }
    }

    /// Reap every device idle for longer than `idle_ttl`. Intended to run
    /// on a `tokio::time::interval` of `idle_ttl / 4`.
    pub fn reap_idle(&self) -> usize {
        let idle_ttl = self.idle_ttl;
        let to_remove: Vec<u16> = self
            .devices
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_ttl)
            .map(|entry| *entry.key())
            .collect();
        let count = to_remove.len();
        for port in to_remove {
            self.remove(port);
        }
        count
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Spawn the periodic sweeper task that calls [`DevicePool::reap_idle`]
/// every `idle_ttl / 4`.
pub fn spawn_sweeper(pool: Arc<DevicePool>, idle_ttl: Duration) -> JoinHandle<()> {
    let period = idle_ttl.checked_div(4).unwrap_or(Duration::from_secs(15));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let reaped = pool.reap_idle();
            if reaped > 0 {
                tracing::debug!(count = reaped, "sweeper reaped idle devices");
            }
        }
    })
}
