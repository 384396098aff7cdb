//! Integration tests for the device setup flow.
//!
//! These tests exercise `SetupFlow` through its *public* API the same way
//! the binary does, with the simulated device backend standing in for fans:
//!
//! - The happy paths: an explicitly addressed fan, and a broadcast search
//!   that finds the simulated responder over a real loopback socket.
//! - The terminal error paths: an unreachable explicit address, a rejected
//!   handshake, and re-configuring an already-claimed identity.
//!
//! The per-candidate iteration details (skip-on-failure, snapshot dedup,
//! first-match-wins) are covered by the unit tests next to the flow itself;
//! here every attempt goes through `SetupFlow::run`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::Mutex;

use vento_core::{DeviceId, BROADCAST_HOST};
use vento_hub::application::registry::DeviceRegistry;
use vento_hub::application::setup::{SetupFlow, SetupOutcome, SetupRequest};
use vento_hub::infrastructure::client::sim::{
    spawn_udp_responder, FanBlueprint, SimulatedConnector,
};
use vento_hub::infrastructure::network::discovery::DiscoverySettings;
use vento_hub::infrastructure::storage::config::HubConfig;

fn loopback_discovery(window_ms: u64) -> DiscoverySettings {
    DiscoverySettings {
        bind_host: "127.0.0.1".parse().unwrap(),
        target: "127.0.0.1".parse().unwrap(),
        window: Duration::from_millis(window_ms),
    }
}

/// Request built from the default config, pointed at `address`/`port`.
fn request(address: &str, port: u16) -> SetupRequest {
    let cfg = HubConfig::default();
    SetupRequest {
        address: address.to_string(),
        port,
        credentials: cfg.device.credentials(),
    }
}

/// Tests the complete explicit-address happy path: the named fan answers the
/// handshake, resolves a real identity, and is claimed in the registry.
#[tokio::test]
async fn test_explicit_address_setup_creates_a_session() {
    // Arrange
    let connector = SimulatedConnector::new();
    connector.add_fan("10.0.0.5", FanBlueprint::new("XYZ999"));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let flow = SetupFlow::new(Arc::new(connector), Arc::clone(&registry));

    // Act
    let outcome = flow.run(&request("10.0.0.5", 4000)).await;

    // Assert
    match outcome {
        SetupOutcome::Created(session) => {
            assert_eq!(session.device_id(), &DeviceId::new("XYZ999"));
            assert_eq!(session.display_name(), "Vento Expert Fan XYZ999");
            assert!(!session.device_id().is_unassigned());
        }
        other => panic!("expected Created, got {other:?}"),
    }
    assert!(
        registry.lock().await.get(&DeviceId::new("XYZ999")).is_some(),
        "the accepted identity must be claimed in the registry"
    );
}

/// Tests that an explicit address nobody answers terminates `CannotConnect`
/// after a single attempt, without probing anything else.
#[tokio::test]
async fn test_explicit_address_that_cannot_connect_is_terminal() {
    let connector = Arc::new(SimulatedConnector::new());
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let flow = SetupFlow::new(Arc::clone(&connector), registry);

    let outcome = flow.run(&request("10.0.0.5", 4000)).await;

    assert!(matches!(outcome, SetupOutcome::CannotConnect));
    assert_eq!(outcome.error_code(), Some("cannot_connect"));
    assert_eq!(
        connector.connect_count(),
        1,
        "exactly one connection attempt is allowed on the explicit path"
    );
}

/// Tests that a fan which answers but never confirms its handshake maps to
/// `InvalidAuth` on the explicit path.
#[tokio::test]
async fn test_explicit_address_with_rejected_handshake_is_invalid_auth() {
    let connector = SimulatedConnector::new();
    connector.add_fan("10.0.0.5", FanBlueprint::unconfirmed("XYZ999"));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let flow = SetupFlow::new(Arc::new(connector), registry);

    let outcome = flow.run(&request("10.0.0.5", 4000)).await;

    assert!(matches!(outcome, SetupOutcome::InvalidAuth));
    assert_eq!(outcome.error_code(), Some("invalid_auth"));
}

/// Tests broadcast discovery end to end over a real loopback socket: the
/// simulated responder answers the query datagram, the responding address
/// becomes the candidate, and setup accepts it.
#[tokio::test]
async fn test_broadcast_discovery_finds_and_configures_the_responder() {
    // Arrange: a fan answering discovery on an OS-assigned loopback port
    let running = Arc::new(AtomicBool::new(true));
    let responder = spawn_udp_responder("127.0.0.1:0".parse().unwrap(), Arc::clone(&running))
        .expect("responder bind");

    let connector = SimulatedConnector::with_default_fan(FanBlueprint::new("XYZ999"));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let flow = SetupFlow::new(Arc::new(connector), Arc::clone(&registry))
        .with_discovery(loopback_discovery(700));

    // Act
    let outcome = flow.run(&request(BROADCAST_HOST, responder.port())).await;
    running.store(false, Ordering::Relaxed);

    // Assert
    match outcome {
        SetupOutcome::Created(session) => {
            assert_eq!(session.device_id(), &DeviceId::new("XYZ999"));
            assert_eq!(session.address().port, responder.port());
        }
        other => panic!("expected Created, got {other:?}"),
    }
}

/// Tests that a broadcast search whose only responder resolves to an
/// already-registered identity terminates `AllDevicesConfigured`.
#[tokio::test]
async fn test_broadcast_with_only_known_fans_is_all_devices_configured() {
    use vento_hub::application::registry::DeviceEntry;
    use vento_core::DeviceAddress;

    // Arrange
    let running = Arc::new(AtomicBool::new(true));
    let responder = spawn_udp_responder("127.0.0.1:0".parse().unwrap(), Arc::clone(&running))
        .expect("responder bind");

    let connector = SimulatedConnector::with_default_fan(FanBlueprint::new("ABC123"));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    registry
        .lock()
        .await
        .try_claim(DeviceEntry {
            id: DeviceId::new("ABC123"),
            display_name: "Vento Expert Fan ABC123".to_string(),
            address: DeviceAddress::new("127.0.0.1", responder.port()),
        })
        .unwrap();

    let flow = SetupFlow::new(Arc::new(connector), Arc::clone(&registry))
        .with_discovery(loopback_discovery(700));

    // Act
    let outcome = flow.run(&request(BROADCAST_HOST, responder.port())).await;
    running.store(false, Ordering::Relaxed);

    // Assert
    assert!(matches!(outcome, SetupOutcome::AllDevicesConfigured));
    assert_eq!(outcome.error_code(), Some("all_devices_configured"));
    assert_eq!(registry.lock().await.len(), 1, "nothing new may be claimed");
}

/// Tests that running setup twice for the same fan rejects the second
/// attempt at the acceptance-time registry check.
#[tokio::test]
async fn test_reconfiguring_the_same_fan_is_already_configured() {
    let connector = SimulatedConnector::new();
    connector.add_fan("10.0.0.5", FanBlueprint::new("XYZ999"));
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let flow = SetupFlow::new(Arc::new(connector), Arc::clone(&registry));

    let first = flow.run(&request("10.0.0.5", 4000)).await;
    let second = flow.run(&request("10.0.0.5", 4000)).await;

    assert!(matches!(first, SetupOutcome::Created(_)));
    assert!(matches!(second, SetupOutcome::AlreadyConfigured));
    assert_eq!(second.error_code(), Some("already_configured"));
}
