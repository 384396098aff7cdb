//! One-shot device configuration flow.
//!
//! Sequences discovery, authentication, and deduplication into a single
//! operation with an explicit terminal for every way it can end:
//!
//! ```text
//! resolve candidates ──► authenticate each in order ──► claim identity
//!   │ broadcast: probe      │ explicit addr: fault is      │ taken: AlreadyConfigured
//!   │ explicit: one addr    │   terminal                   └ free:  Created(session)
//!   └ none: NoDevicesFound  │ broadcast: fault/duplicate
//!                           │   excludes the candidate
//!                           └ exhausted: AllDevicesConfigured
//! ```
//!
//! The two candidate sources fail differently on purpose.  With an explicit
//! address the operator named one device, so the first fault is the answer
//! (`CannotConnect` / `InvalidAuth`).  Under broadcast discovery a candidate
//! that fails or is already configured is simply not the device being set
//! up; the flow moves on and only reports `AllDevicesConfigured` once every
//! candidate has been excluded.  First acceptable candidate wins — no
//! further probing after an acceptance.
//!
//! Faults never escape `run` as panics or raw errors; anything unexpected
//! maps to [`SetupOutcome::Unknown`] so the caller always has a displayable
//! outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use vento_core::{
    Credentials, DeviceAddress, DeviceClient, DeviceConnector, BROADCAST_HOST,
};

use crate::application::dedup::{is_duplicate, RegisteredIds};
use crate::application::registry::{ClaimError, DeviceEntry, DeviceRegistry};
use crate::infrastructure::network::auth::{AuthError, Authenticator, DeviceSession};
use crate::infrastructure::network::discovery::{DiscoveryProbe, DiscoverySettings};

/// Operator input for one setup attempt.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    /// Explicit device host, or [`BROADCAST_HOST`] to discover one.
    pub address: String,
    pub port: u16,
    pub credentials: Credentials,
}

impl SetupRequest {
    pub fn is_broadcast(&self) -> bool {
        self.address == BROADCAST_HOST
    }
}

/// Terminal state of one setup attempt.
pub enum SetupOutcome<C: DeviceClient> {
    /// A device was authenticated and claimed; the session is live.
    Created(DeviceSession<C>),
    /// Broadcast discovery found no candidates.
    NoDevicesFound,
    /// Every discovered candidate was excluded (failed or duplicate).
    AllDevicesConfigured,
    /// The accepted identity was registered after the snapshot was taken.
    AlreadyConfigured,
    /// The explicitly named device could not be reached.
    CannotConnect,
    /// The explicitly named device rejected the handshake.
    InvalidAuth,
    /// An unexpected fault, recovered and classified.
    Unknown,
}

impl<C: DeviceClient> SetupOutcome<C> {
    /// User-facing error code for failed attempts; `None` on success.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            SetupOutcome::Created(_) => None,
            SetupOutcome::NoDevicesFound => Some("no_devices_found"),
            SetupOutcome::AllDevicesConfigured => Some("all_devices_configured"),
            SetupOutcome::AlreadyConfigured => Some("already_configured"),
            SetupOutcome::CannotConnect => Some("cannot_connect"),
            SetupOutcome::InvalidAuth => Some("invalid_auth"),
            SetupOutcome::Unknown => Some("unknown"),
        }
    }
}

impl<C: DeviceClient> fmt::Debug for SetupOutcome<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupOutcome::Created(session) => {
                write!(f, "Created({})", session.device_id())
            }
            other => f.write_str(other.error_code().unwrap_or("Created")),
        }
    }
}

/// The configuration flow, bound to a connector and the shared registry.
pub struct SetupFlow<N: DeviceConnector> {
    connector: Arc<N>,
    authenticator: Authenticator<N>,
    registry: Arc<Mutex<DeviceRegistry>>,
    discovery: DiscoverySettings,
}

impl<N: DeviceConnector> SetupFlow<N> {
    pub fn new(connector: Arc<N>, registry: Arc<Mutex<DeviceRegistry>>) -> Self {
        let authenticator = Authenticator::new(Arc::clone(&connector));
        Self {
            connector,
            authenticator,
            registry,
            discovery: DiscoverySettings::default(),
        }
    }

    /// Overrides the discovery window/targets (tests probe loopback).
    pub fn with_discovery(mut self, settings: DiscoverySettings) -> Self {
        self.discovery = settings;
        self
    }

    /// Overrides the per-handshake deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.authenticator = Authenticator::new(Arc::clone(&self.connector)).with_timeout(timeout);
        self
    }

    /// Runs one setup attempt to a terminal outcome.
    ///
    /// Dropping the returned future abandons the attempt; a probe in flight
    /// stops within one read slice and no socket outlives the call.
    pub async fn run(&self, request: &SetupRequest) -> SetupOutcome<N::Client> {
        let snapshot = self.registry.lock().await.snapshot();

        let (candidates, explicit) = if request.is_broadcast() {
            info!("starting broadcast search for fans on port {}", request.port);
            let probe = DiscoveryProbe::new(self.discovery.clone(), request.port);
            match probe.discover(self.connector.discovery_query()).await {
                Ok(found) => (found, false),
                Err(e) => {
                    error!("broadcast discovery failed: {e}");
                    return SetupOutcome::Unknown;
                }
            }
        } else {
            let address = DeviceAddress::new(request.address.clone(), request.port);
            (vec![address], true)
        };

        if candidates.is_empty() {
            info!("no fans answered the broadcast query");
            return SetupOutcome::NoDevicesFound;
        }

        self.select_candidate(candidates, explicit, &request.credentials, &snapshot)
            .await
    }

    /// Authenticates candidates in discovery order and accepts the first one
    /// that is not already registered.
    async fn select_candidate(
        &self,
        candidates: Vec<DeviceAddress>,
        explicit: bool,
        credentials: &Credentials,
        snapshot: &RegisteredIds,
    ) -> SetupOutcome<N::Client> {
        for address in candidates {
            let session = match self.authenticator.authenticate(&address, credentials).await {
                Ok(session) => session,
                Err(e) if explicit => {
                    // The operator named this device; the fault is the answer.
                    return match e {
                        AuthError::Connection { .. } => SetupOutcome::CannotConnect,
                        AuthError::InvalidIdentity { .. } => SetupOutcome::InvalidAuth,
                    };
                }
                Err(e) => {
                    debug!("excluding candidate {address}: {e}");
                    continue;
                }
            };

            // Snapshot dedup applies to discovered candidates only; an
            // explicitly named device still has to pass the claim below.
            if !explicit && is_duplicate(session.device_id(), snapshot) {
                debug!(
                    "candidate {address} resolved to already-configured device {}; skipping",
                    session.device_id()
                );
                continue;
            }

            return self.accept(session).await;
        }

        info!("every discovered fan is unusable or already configured");
        SetupOutcome::AllDevicesConfigured
    }

    /// Claims the session's identity in the authoritative registry.
    ///
    /// The claim runs under the registry lock and is the check that catches
    /// a registration racing the earlier snapshot.
    async fn accept(&self, session: DeviceSession<N::Client>) -> SetupOutcome<N::Client> {
        let entry = DeviceEntry {
            id: session.device_id().clone(),
            display_name: session.display_name().to_string(),
            address: session.address().clone(),
        };

        let mut registry = self.registry.lock().await;
        match registry.try_claim(entry) {
            Ok(()) => {
                info!(
                    "configured device {} (\"{}\") at {}",
                    session.device_id(),
                    session.display_name(),
                    session.address()
                );
                SetupOutcome::Created(session)
            }
            Err(ClaimError::AlreadyConfigured(id)) => {
                warn!("device {id} was registered while setup was running");
                SetupOutcome::AlreadyConfigured
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
