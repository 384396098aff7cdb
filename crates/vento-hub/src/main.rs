//! VentoHub entry point.
//!
//! Wires the services together and runs headless:
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML config, defaults on first run
//!  └─ spawn_udp_responder()    -- simulated fan answering discovery
//!  └─ SetupFlow::run()         -- discover / authenticate / claim
//!  └─ Poller::start()          -- fixed-interval refresh loop
//!  └─ ctrl_c  → poller.stop()
//! ```
//!
//! The concrete vendor transport is not part of this workspace; the binary
//! runs against the simulated backend so the whole flow is exercisable end
//! to end on a development machine.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vento_hub::application::poller::{Poller, PollerSettings, PollResult};
use vento_hub::application::registry::DeviceRegistry;
use vento_hub::application::setup::{SetupFlow, SetupOutcome, SetupRequest};
use vento_hub::infrastructure::client::sim::{
    spawn_udp_responder, FanBlueprint, SimulatedConnector,
};
use vento_hub::infrastructure::network::discovery::DiscoverySettings;
use vento_hub::infrastructure::storage::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;

    // Initialise structured logging.  `RUST_LOG` overrides the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.hub.log_level.clone())),
        )
        .init();

    info!("VentoHub starting");

    // Shutdown flag shared with the background responder thread.
    let running = Arc::new(AtomicBool::new(true));

    // ── Simulated fan ─────────────────────────────────────────────────────────
    // Stands in for a device on the LAN so broadcast discovery has something
    // to find; the real vendor transport plugs in through the same
    // DeviceConnector seam.
    let responder_bind: SocketAddr = format!("0.0.0.0:{}", cfg.device.port).parse()?;
    match spawn_udp_responder(responder_bind, Arc::clone(&running)) {
        Ok(addr) => info!("simulated fan answering discovery on UDP {addr}"),
        Err(e) => warn!("could not start the simulated fan responder: {e}"),
    }

    let connector = Arc::new(SimulatedConnector::with_default_fan(FanBlueprint::new(
        "002D6E24E495",
    )));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));

    // ── Setup flow ────────────────────────────────────────────────────────────
    let flow = SetupFlow::new(Arc::clone(&connector), Arc::clone(&registry))
        .with_discovery(DiscoverySettings {
            window: cfg.poll.discovery_window(),
            ..DiscoverySettings::default()
        })
        .with_request_timeout(cfg.poll.request_timeout());

    let request = SetupRequest {
        address: cfg.device.address.clone(),
        port: cfg.device.port,
        credentials: cfg.device.credentials(),
    };

    let session = match flow.run(&request).await {
        SetupOutcome::Created(session) => session,
        outcome => {
            let code = outcome.error_code().unwrap_or("unknown");
            error!("setup did not produce a device: {code}");
            anyhow::bail!("setup failed: {code}");
        }
    };
    info!(
        "configured \"{}\" ({}) at {}",
        session.display_name(),
        session.device_id(),
        session.address()
    );

    // ── Poller ────────────────────────────────────────────────────────────────
    let poller = Poller::start(
        session,
        PollerSettings {
            interval: cfg.poll.update_interval(),
            request_timeout: cfg.poll.request_timeout(),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("device is not ready: {e}"))?;

    // Log every status change for the headless run.
    let mut status_rx = poller.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow().clone();
            match status.last {
                Some(PollResult::Updated) => {
                    if let Some(state) = status.state {
                        info!(
                            "state: power={} humidity={}% fan1={}rpm",
                            state.power, state.humidity, state.fan1_rpm
                        );
                    }
                }
                Some(PollResult::Failed { reason }) => {
                    warn!("last update failed: {reason}");
                }
                None => {}
            }
        }
    });

    info!("VentoHub ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    running.store(false, Ordering::Relaxed);
    poller.stop().await;

    info!("VentoHub stopped");
    Ok(())
}
