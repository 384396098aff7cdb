//! Simulated device backend.
//!
//! Allows the setup flow and the poller to run against scriptable in-process
//! fans without a real device on the network, and gives the headless binary
//! something to talk to.  Three pieces:
//!
//! - [`FanBlueprint`] – shared, mutable script for one fan: the identity it
//!   resolves to, whether it confirms the handshake, and a reachability
//!   switch that can be flipped mid-run to simulate an outage.
//! - [`SimulatedDevice`] / [`SimulatedConnector`] – the capability-trait
//!   implementations.  Every `connect` call yields a *fresh* device bound to
//!   the blueprint for that host, mirroring how the real connector must
//!   behave.
//! - [`spawn_udp_responder`] – a real UDP socket that answers every datagram,
//!   standing in for a fan during broadcast discovery.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use vento_core::{
    ClientError, Credentials, DeviceAddress, DeviceClient, DeviceConnector, DeviceId, FanState,
};

/// Shared script controlling how a simulated fan behaves.
#[derive(Debug)]
pub struct FanBlueprint {
    resolved_id: DeviceId,
    confirm_handshake: bool,
    reachable: Arc<AtomicBool>,
    state: Arc<Mutex<FanState>>,
    refresh_count: Arc<AtomicU32>,
}

impl FanBlueprint {
    /// A reachable fan that resolves to `id` and confirms its handshake.
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            resolved_id: id.into(),
            confirm_handshake: true,
            reachable: Arc::new(AtomicBool::new(true)),
            state: Arc::new(Mutex::new(FanState::default())),
            refresh_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A fan whose handshake completes but is never confirmed.
    pub fn unconfirmed(id: impl Into<DeviceId>) -> Self {
        Self {
            confirm_handshake: false,
            ..Self::new(id)
        }
    }

    /// Flips whether network exchanges with this fan succeed.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    /// Replaces the state the fan reports on the next refresh.
    pub fn set_state(&self, state: FanState) {
        *self.state.lock().expect("lock poisoned") = state;
    }

    /// How many refresh calls any client of this fan has completed or failed.
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    fn share(&self) -> Self {
        Self {
            resolved_id: self.resolved_id.clone(),
            confirm_handshake: self.confirm_handshake,
            reachable: Arc::clone(&self.reachable),
            state: Arc::clone(&self.state),
            refresh_count: Arc::clone(&self.refresh_count),
        }
    }
}

/// One simulated session, created fresh per `connect` call.
pub struct SimulatedDevice {
    blueprint: FanBlueprint,
    configured_id: DeviceId,
    host: String,
    port: u16,
    initialized: bool,
}

impl SimulatedDevice {
    fn unreachable_error() -> ClientError {
        ClientError::Network(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "simulated fan is unreachable",
        ))
    }
}

#[async_trait]
impl DeviceClient for SimulatedDevice {
    async fn initialize(&mut self) -> Result<bool, ClientError> {
        if !self.blueprint.reachable.load(Ordering::Relaxed) {
            return Err(Self::unreachable_error());
        }
        self.initialized = true;
        debug!(
            "simulated fan {} completed handshake (confirmed: {})",
            self.blueprint.resolved_id, self.blueprint.confirm_handshake
        );
        Ok(self.blueprint.confirm_handshake)
    }

    async fn refresh(&mut self) -> Result<(), ClientError> {
        self.blueprint.refresh_count.fetch_add(1, Ordering::Relaxed);
        if !self.blueprint.reachable.load(Ordering::Relaxed) {
            return Err(Self::unreachable_error());
        }
        Ok(())
    }

    fn device_id(&self) -> DeviceId {
        if self.initialized {
            self.blueprint.resolved_id.clone()
        } else {
            self.configured_id.clone()
        }
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn state(&self) -> FanState {
        self.blueprint.state.lock().expect("lock poisoned").clone()
    }
}

/// Connector serving simulated fans keyed by host address.
///
/// Hosts with no blueprint behave as dead air: the handshake fails with a
/// connection error, like probing an address where no fan listens.  With a
/// default blueprint installed, every host resolves to that fan — handy for
/// the headless binary, where discovery reports whatever interface address
/// the responder answered from.
#[derive(Default)]
pub struct SimulatedConnector {
    fleet: Mutex<HashMap<String, FanBlueprint>>,
    default_fan: Option<FanBlueprint>,
    connect_count: AtomicU32,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that serves `blueprint` for every host.
    pub fn with_default_fan(blueprint: FanBlueprint) -> Self {
        Self {
            default_fan: Some(blueprint),
            ..Self::default()
        }
    }

    /// Installs a fan at `host`; returns a shared handle to its script.
    pub fn add_fan(&self, host: impl Into<String>, blueprint: FanBlueprint) -> FanBlueprint {
        let handle = blueprint.share();
        self.fleet
            .lock()
            .expect("lock poisoned")
            .insert(host.into(), blueprint);
        handle
    }

    /// How many clients this connector has handed out.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }
}

impl DeviceConnector for SimulatedConnector {
    type Client = SimulatedDevice;

    fn connect(&self, address: &DeviceAddress, credentials: &Credentials) -> SimulatedDevice {
        self.connect_count.fetch_add(1, Ordering::Relaxed);

        let blueprint = {
            let fleet = self.fleet.lock().expect("lock poisoned");
            fleet
                .get(&address.host)
                .or(self.default_fan.as_ref())
                .map(FanBlueprint::share)
        };

        // No fan at that host: a blueprint that never answers.
        let blueprint = blueprint.unwrap_or_else(|| {
            let dead = FanBlueprint::new(DeviceId::unassigned());
            dead.set_reachable(false);
            dead
        });

        SimulatedDevice {
            blueprint,
            configured_id: credentials.device_id.clone(),
            host: address.host.clone(),
            port: address.port,
            initialized: false,
        }
    }

    fn discovery_query(&self) -> Vec<u8> {
        b"VENTO?".to_vec()
    }
}

/// Binds a UDP socket and answers every incoming datagram, standing in for a
/// fan on the network during broadcast discovery.
///
/// Runs on a dedicated thread with a 250 ms read timeout; the loop exits when
/// `running` is cleared.  Returns the bound address (bind port 0 to let the
/// OS pick).
///
/// # Errors
///
/// Returns the bind error when the socket cannot be created.
pub fn spawn_udp_responder(bind: SocketAddr, running: Arc<AtomicBool>) -> io::Result<SocketAddr> {
    let socket = UdpSocket::bind(bind)?;
    socket.set_read_timeout(Some(Duration::from_millis(250)))?;
    let local = socket.local_addr()?;

    std::thread::Builder::new()
        .name("vento-sim-responder".to_string())
        .spawn(move || {
            let mut buf = [0u8; 256];
            while running.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buf) {
                    Ok((_, src)) => {
                        debug!("simulated responder answering {src}");
                        let _ = socket.send_to(b"VENTO!", src);
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::WouldBlock
                            || e.kind() == io::ErrorKind::TimedOut =>
                    {
                        continue
                    }
                    Err(e) => {
                        debug!("simulated responder recv error: {e}");
                        continue;
                    }
                }
            }
            info!("simulated responder stopped");
        })
        .expect("failed to spawn responder thread");

    Ok(local)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
