//! The per-device actor: one UDP socket, one task, one profile lookup.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

use crate::behavior::{self, DeviceState};
use crate::codec::{self, Message, PduKind, VarBind};
use crate::config::GeneralConfig;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::profile::{DeviceTypeId, Profile, ProfileStore};
use crate::value::TypedValue;

/// The well-known system-group scalars a loaded profile may omit; when it
/// does, `Device::system_fallback` backs them with `GeneralConfig` instead
/// of reporting a miss (spec.md §6.2).
static SYS_DESCR_OID: Lazy<Oid> = Lazy::new(|| "1.3.6.1.2.1.1.1.0".parse().unwrap());
static SYS_CONTACT_OID: Lazy<Oid> = Lazy::new(|| "1.3.6.1.2.1.1.4.0".parse().unwrap());
static SYS_LOCATION_OID: Lazy<Oid> = Lazy::new(|| "1.3.6.1.2.1.1.6.0".parse().unwrap());

/// Upper bound on GET-BULK `max-repetitions`, regardless of what a
/// request's wire field claims. Without this, a single crafted datagram
/// with max-repetitions near `i32::MAX` forces an unbounded `Vec` of
/// response varbinds per repeating column.
const MAX_BULK_REPETITIONS: usize = 1000;

/// spec.md §4.7: every device walks this state machine exactly once,
/// monotonically, start to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unbound,
    Initializing,
    Ready,
    Reaping,
    Gone,
}

/// v1 PDU-level error statuses (the only ones this simulator emits).
mod error_status {
    pub const NO_ERROR: i32 = 0;
    pub const NO_SUCH_NAME: i32 = 2;
    pub const READ_ONLY: i32 = 4;
    pub const GEN_ERR: i32 = 5;
    pub const NOT_WRITABLE: i32 = 17;
}

/// One simulated SNMP agent: a single UDP socket bound to `port`,
/// answering as `device_type` out of the shared `ProfileStore`.
pub struct Device {
    pub device_type: DeviceTypeId,
    pub port: u16,
    bind_address: String,
    read_community: Vec<u8>,
    profiles: Arc<ProfileStore>,
    general: Arc<GeneralConfig>,
    state: RwLock<LifecycleState>,
    /// Seconds since UNIX_EPOCH of the last datagram handled; an
    /// `AtomicI64` so the pool sweeper can read it without an async lock.
    last_activity_secs: AtomicI64,
    started_at: RwLock<Option<Instant>>,
}

impl Device {
    pub fn new(
        device_type: DeviceTypeId,
        port: u16,
        bind_address: String,
        read_community: Vec<u8>,
        profiles: Arc<ProfileStore>,
        general: Arc<GeneralConfig>,
    ) -> Arc<Self> {
        Arc::new(Self {
            device_type,
            port,
            bind_address,
            read_community,
            profiles,
            general,
            state: RwLock::new(LifecycleState::Unbound),
            last_activity_secs: AtomicI64::new(now_secs()),
            started_at: RwLock::new(None),
        })
    }

    /// Back `sysDescr`/`sysContact`/`sysLocation` from the agent's general
    /// configuration when the loaded profile doesn't define them.
    fn system_fallback(&self, oid: &Oid) -> Option<TypedValue> {
        if *oid == *SYS_DESCR_OID {
            Some(TypedValue::OctetString(self.general.description.clone().into_bytes()))
        } else if *oid == *SYS_CONTACT_OID {
            Some(TypedValue::OctetString(self.general.contact.clone().into_bytes()))
        } else if *oid == *SYS_LOCATION_OID {
            Some(TypedValue::OctetString(self.general.location.clone().into_bytes()))
        } else {
            None
        }
    }

    /// Resolve the current value of `oid` for a GET: the loaded profile,
    /// then the system-object fallback, else `Error::NoSuchName` -- the
    /// v1 lookup-miss signal (spec.md §7), which v2c instead surfaces as
    /// the `noSuchObject` sentinel.
    fn resolve_get(
        &self,
        profile: &Profile,
        oid: &Oid,
        device_state: &DeviceState,
        now: Instant,
    ) -> std::result::Result<TypedValue, Error> {
        if let Some(record) = profile.get(oid) {
            return Ok(behavior::simulate(record, device_state, now));
        }
        if let Some(value) = self.system_fallback(oid) {
            return Ok(value);
        }
        Err(Error::NoSuchName)
    }

    pub async fn lifecycle_state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn touch(&self) {
        self.last_activity_secs.store(now_secs(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_secs.load(Ordering::Relaxed);
        let idle = (now_secs() - last).max(0);
        Duration::from_secs(idle as u64)
    }

    /// Bind the socket and run the receive loop until `shutdown` fires or
    /// the device is reaped. Spawned as its own tokio task by the pool.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        recv_timeout: Duration,
    ) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = LifecycleState::Initializing;
        }

        let addr = format!("{}:{}", self.bind_address, self.port);
        let socket = match UdpSocket::bind(&addr).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(port = self.port, error = %e, "failed to bind device socket");
                *self.state.write().await = LifecycleState::Gone;
                return Err(Error::bind_failed(self.port, e.to_string()));
            }
        };

        *self.started_at.write().await = Some(Instant::now());
        *self.state.write().await = LifecycleState::Ready;
        tracing::debug!(port = self.port, device_type = %self.device_type, "device ready");

        let mut buf = [0u8; 65536];
        loop {
            if *shutdown.borrow() {
                break;
            }
            let recv = tokio::time::timeout(recv_timeout, socket.recv_from(&mut buf));
            tokio::select! {
                result = recv => {
                    match result {
                        Ok(Ok((len, peer))) => {
                            self.touch();
                            self.handle_datagram(&socket, &buf[..len], peer).await;
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(port = self.port, error = %e, "recv_from failed");
                        }
                        Err(_timeout) => {
                            // No traffic this tick; loop back around to
                            // re-check the shutdown signal.
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        *self.state.write().await = LifecycleState::Reaping;
        tracing::debug!(port = self.port, "device reaping");
        *self.state.write().await = LifecycleState::Gone;
        Ok(())
    }

    async fn handle_datagram(&self, socket: &UdpSocket, bytes: &[u8], peer: SocketAddr) {
        let request = match codec::decode_message(bytes) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(port = self.port, %peer, error = %e, "dropping undecodable datagram");
                return;
            }
        };

        if request.community != self.read_community {
            tracing::debug!(port = self.port, %peer, "dropping datagram: community mismatch");
            return;
        }

        let profile = match self.profiles.snapshot(&self.device_type).await {
            Some(p) => p,
            None => {
                tracing::debug!(port = self.port, "no profile loaded for device type, dropping");
                return;
            }
        };

        let started_at = self.started_at.read().await.unwrap_or_else(Instant::now);
        let device_state = DeviceState::new(started_at);

        let response = match self.build_response(&profile, &request, &device_state) {
            Some(r) => r,
            None => return,
        };

        let encoded = codec::encode_message(&response);
        if let Err(e) = socket.send_to(&encoded, peer).await {
            tracing::warn!(port = self.port, %peer, error = %e, "send_to failed");
        }
    }

    /// Build the reply for one decoded request, or `None` to silently
    /// drop (protocol-level errors per spec.md §7).
    fn build_response(
        &self,
        profile: &Profile,
        request: &Message,
        device_state: &DeviceState,
    ) -> Option<Message> {
        let now = Instant::now();
        match request.kind {
            PduKind::GetRequest => Some(self.handle_get(profile, request, device_state, now)),
            PduKind::GetNextRequest => {
                Some(self.handle_get_next(profile, request, device_state, now))
            }
            PduKind::GetBulkRequest => {
                if request.version != codec::VERSION_V2C {
                    tracing::debug!(port = self.port, "GETBULK on v1, dropping");
                    return None;
                }
                Some(self.handle_get_bulk(profile, request, device_state, now))
            }
            PduKind::SetRequest => Some(self.handle_set(request)),
            PduKind::Response => None,
        }
    }

    fn handle_get(
        &self,
        profile: &Profile,
        request: &Message,
        device_state: &DeviceState,
        now: Instant,
    ) -> Message {
        let is_v1 = request.version == codec::VERSION_V1;
        let mut out_varbinds = Vec::with_capacity(request.varbinds.len());
        let mut first_miss: Option<usize> = None;

        for (idx, vb) in request.varbinds.iter().enumerate() {
            match self.resolve_get(profile, &vb.oid, device_state, now) {
                Ok(value) => out_varbinds.push(VarBind::new(vb.oid.clone(), value)),
                Err(Error::NoSuchName) => {
                    if first_miss.is_none() {
                        first_miss = Some(idx + 1);
                    }
                    let value = if is_v1 {
                        TypedValue::Null
                    } else {
                        TypedValue::NoSuchObject
                    };
                    out_varbinds.push(VarBind::new(vb.oid.clone(), value));
                }
                Err(_) => unreachable!("resolve_get only ever returns NoSuchName"),
            }
        }

        if is_v1 {
            if let Some(index) = first_miss {
                return self.error_response(
                    request,
                    error_status::NO_SUCH_NAME,
                    index as i32,
                    request.varbinds.clone(),
                );
            }
        }

        self.ok_response(request, out_varbinds)
    }

    fn handle_get_next(
        &self,
        profile: &Profile,
        request: &Message,
        device_state: &DeviceState,
        now: Instant,
    ) -> Message {
        let is_v1 = request.version == codec::VERSION_V1;
        let mut out_varbinds = Vec::with_capacity(request.varbinds.len());
        let mut first_miss: Option<usize> = None;

        for (idx, vb) in request.varbinds.iter().enumerate() {
            match profile.successor(&vb.oid) {
                Some(record) => out_varbinds.push(VarBind::new(
                    record.oid.clone(),
                    behavior::simulate(record, device_state, now),
                )),
                None => {
                    if is_v1 {
                        if first_miss.is_none() {
                            first_miss = Some(idx + 1);
                        }
                        out_varbinds.push(vb.clone());
                    } else {
                        out_varbinds.push(VarBind::new(vb.oid.clone(), TypedValue::EndOfMibView));
                    }
                }
            }
        }

        if is_v1 {
            if let Some(index) = first_miss {
                return self.error_response(
                    request,
                    error_status::NO_SUCH_NAME,
                    index as i32,
                    request.varbinds.clone(),
                );
            }
        }

        self.ok_response(request, out_varbinds)
    }

    fn handle_get_bulk(
        &self,
        profile: &Profile,
        request: &Message,
        device_state: &DeviceState,
        now: Instant,
    ) -> Message {
        let non_repeaters = request.error_status.max(0) as usize;
        let max_repetitions = (request.error_index.max(0) as usize).min(MAX_BULK_REPETITIONS);

        let mut out_varbinds = Vec::new();
        let varbinds = &request.varbinds;

        let non_rep_count = non_repeaters.min(varbinds.len());
        for vb in &varbinds[..non_rep_count] {
            match profile.successor(&vb.oid) {
                Some(record) => out_varbinds.push(VarBind::new(
                    record.oid.clone(),
                    behavior::simulate(record, device_state, now),
                )),
                None => out_varbinds.push(VarBind::new(vb.oid.clone(), TypedValue::EndOfMibView)),
            }
        }

        // Each repeating varbind walks forward up to max_repetitions
        // times; once a column hits end-of-MIB it keeps reporting
        // end-of-MIB for its remaining repetitions rather than stalling.
        for vb in &varbinds[non_rep_count..] {
            let mut cursor = vb.oid.clone();
            let mut exhausted = false;
            for _ in 0..max_repetitions {
                if exhausted {
                    out_varbinds.push(VarBind::new(cursor.clone(), TypedValue::EndOfMibView));
                    continue;
                }
                match profile.successor(&cursor) {
                    Some(record) => {
                        cursor = record.oid.clone();
                        out_varbinds.push(VarBind::new(
                            cursor.clone(),
                            behavior::simulate(record, device_state, now),
                        ));
                    }
                    None => {
                        exhausted = true;
                        out_varbinds.push(VarBind::new(cursor.clone(), TypedValue::EndOfMibView));
                    }
                }
            }
        }

        self.ok_response(request, out_varbinds)
    }

    fn handle_set(&self, request: &Message) -> Message {
        // spec.md Non-goals: SET value application is out of scope; reject
        // cleanly with the version-appropriate status rather than
        // silently accepting or dropping.
        let status = if request.version == codec::VERSION_V1 {
            error_status::READ_ONLY
        } else {
            error_status::NOT_WRITABLE
        };
        self.error_response(
            request,
            status,
            if request.varbinds.is_empty() { 0 } else { 1 },
            request.varbinds.clone(),
        )
    }

    fn ok_response(&self, request: &Message, varbinds: Vec<VarBind>) -> Message {
        Message {
            version: request.version,
            community: request.community.clone(),
            kind: PduKind::Response,
            request_id: request.request_id,
            error_status: error_status::NO_ERROR,
            error_index: 0,
            varbinds,
        }
    }

    fn error_response(
        &self,
        request: &Message,
        error_status: i32,
        error_index: i32,
        varbinds: Vec<VarBind>,
    ) -> Message {
        Message {
            version: request.version,
            community: request.community.clone(),
            kind: PduKind::Response,
            request_id: request.request_id,
            error_status,
            error_index,
            varbinds,
        }
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
