//! UDP broadcast-based device discovery.
//!
//! The hub sends one query datagram to the broadcast address on the device
//! port and then collects answers until the window closes:
//!
//! 1. Bind a transient, broadcast-capable UDP socket on an ephemeral port.
//! 2. Send the opaque query payload (supplied by the vendor capability
//!    layer) to `target:port`.
//! 3. Record the source address of every datagram that arrives before the
//!    window elapses, dropping repeats from the same address.
//!
//! The answer payloads are not inspected here; any host that replies to the
//! query is a candidate, and the authentication handshake that follows is
//! what actually vets it.
//!
//! # Read timeout
//!
//! The socket is configured with a 250 ms read timeout, so `recv_from`
//! returns at least four times a second.  On each timeout the loop checks
//! the window deadline and the stop flag; dropping the future returned by
//! [`DiscoveryProbe::discover`] raises the flag, which stops the blocking
//! loop within one slice and closes the socket — abandoning a setup attempt
//! does not leak the probe socket.
//!
//! Blocking socket I/O runs on `tokio::task::spawn_blocking` so the caller's
//! task suspends instead of blocking its runtime thread.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use vento_core::DeviceAddress;

/// How long `recv_from` blocks before the loop re-checks its deadline.
const READ_SLICE: Duration = Duration::from_millis(250);

/// Error type for discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The probe socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred while sending the query or configuring the socket.
    #[error("discovery probe error: {0}")]
    Probe(#[from] std::io::Error),
    /// The probe was abandoned before the window closed.
    #[error("discovery was cancelled")]
    Cancelled,
}

/// Tunable parameters for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Local address the probe socket binds to.  `0.0.0.0` uses all interfaces.
    pub bind_host: IpAddr,
    /// Where the query datagram is sent.  The LAN broadcast address by
    /// default; tests and directed probes point this at a single host.
    pub target: IpAddr,
    /// How long to collect answers after the query is sent.
    pub window: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            target: IpAddr::V4(Ipv4Addr::BROADCAST),
            window: Duration::from_secs(3),
        }
    }
}

/// One-shot broadcast probe for fans on the local network.
///
/// Stateless between runs: every [`DiscoveryProbe::discover`] call opens its
/// own socket and closes it when the window ends.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe {
    settings: DiscoverySettings,
    port: u16,
}

/// Raises the stop flag when the owning future is dropped.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl DiscoveryProbe {
    pub fn new(settings: DiscoverySettings, port: u16) -> Self {
        Self { settings, port }
    }

    /// Sends `query` once and returns the distinct addresses that answered
    /// within the window, in first-seen order.
    ///
    /// An empty result is not an error; the caller decides whether "nobody
    /// answered" is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Bind`] when the probe socket cannot be
    /// bound and [`DiscoveryError::Probe`] for send/configuration faults.
    pub async fn discover(&self, query: Vec<u8>) -> Result<Vec<DeviceAddress>, DiscoveryError> {
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(Arc::clone(&stop));

        let settings = self.settings.clone();
        let port = self.port;
        let handle =
            tokio::task::spawn_blocking(move || probe_loop(&settings, port, &query, &stop));

        match handle.await {
            Ok(result) => result,
            // The blocking task only disappears without a result when the
            // runtime is shutting down.
            Err(_) => Err(DiscoveryError::Cancelled),
        }
    }
}

/// The blocking collect loop executed on the spawn_blocking thread.
fn probe_loop(
    settings: &DiscoverySettings,
    port: u16,
    query: &[u8],
    stop: &AtomicBool,
) -> Result<Vec<DeviceAddress>, DiscoveryError> {
    let bind_addr = SocketAddr::new(settings.bind_host, 0);
    let socket = UdpSocket::bind(bind_addr).map_err(|source| DiscoveryError::Bind {
        addr: bind_addr,
        source,
    })?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(READ_SLICE))?;

    let target = SocketAddr::new(settings.target, port);
    socket.send_to(query, target)?;
    debug!("discovery query sent to {target}");

    let deadline = Instant::now() + settings.window;
    let mut seen: HashSet<SocketAddr> = HashSet::new();
    let mut found: Vec<DeviceAddress> = Vec::new();
    let mut buf = [0u8; 1024];

    while Instant::now() < deadline {
        if stop.load(Ordering::Relaxed) {
            debug!("discovery probe cancelled");
            return Err(DiscoveryError::Cancelled);
        }

        let (_len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                warn!("discovery recv error: {e}");
                continue;
            }
        };

        // The same fan answers more than once on busy networks; keep the
        // first occurrence only, preserving discovery order.
        if seen.insert(src) {
            debug!("device answered from {src}");
            found.push(DeviceAddress::new(src.ip().to_string(), src.port()));
        }
    }

    info!("discovery window closed: {} device(s) answered", found.len());
    Ok(found)
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Binds a UDP socket on loopback and, on receiving the query, sends
    /// `devices` replies from distinct ephemeral sockets, `per_device` times
    /// each — simulating several fans (some of which answer repeatedly).
    fn spawn_responder(devices: usize, per_device: usize) -> (u16, std::thread::JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("responder bind");
        let port = socket.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            if let Ok((_, src)) = socket.recv_from(&mut buf) {
                for _ in 0..devices {
                    let reply = UdpSocket::bind("127.0.0.1:0").expect("reply bind");
                    for _ in 0..per_device {
                        reply.send_to(b"VENTO", src).expect("reply send");
                    }
                }
            }
        });
        (port, handle)
    }

    fn loopback_settings(window_ms: u64) -> DiscoverySettings {
        DiscoverySettings {
            bind_host: "127.0.0.1".parse().unwrap(),
            target: "127.0.0.1".parse().unwrap(),
            window: Duration::from_millis(window_ms),
        }
    }

    #[test]
    fn test_is_timeout_error_recognises_timed_out_and_would_block() {
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out"
        )));
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "would block"
        )));
    }

    #[test]
    fn test_is_timeout_error_returns_false_for_other_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_timeout_error(&e));
    }

    #[test]
    fn test_default_settings_use_broadcast_target() {
        let settings = DiscoverySettings::default();
        assert_eq!(settings.target, IpAddr::V4(Ipv4Addr::BROADCAST));
        assert_eq!(settings.window, Duration::from_secs(3));
    }

    #[test]
    fn test_stop_flag_is_raised_when_guard_drops() {
        // Arrange
        let stop = Arc::new(AtomicBool::new(false));

        // Act – simulate the discover future being dropped
        drop(StopOnDrop(Arc::clone(&stop)));

        // Assert
        assert!(stop.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_discover_returns_empty_when_nothing_answers() {
        // Arrange: pick a loopback port with no listener by binding and
        // immediately releasing one.
        let probe_port = {
            let s = UdpSocket::bind("127.0.0.1:0").unwrap();
            s.local_addr().unwrap().port()
        };
        let probe = DiscoveryProbe::new(loopback_settings(300), probe_port);

        // Act
        let found = probe.discover(b"VENTO?".to_vec()).await.expect("discover");

        // Assert – no answers is an empty set, not an error
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_discover_dedupes_a_device_that_answers_repeatedly() {
        // Arrange: one simulated fan that answers the query three times
        let (port, responder) = spawn_responder(1, 3);
        let probe = DiscoveryProbe::new(loopback_settings(700), port);

        // Act
        let found = probe.discover(b"VENTO?".to_vec()).await.expect("discover");
        responder.join().unwrap();

        // Assert
        assert_eq!(found.len(), 1, "repeat answers must collapse to one candidate");
    }

    #[tokio::test]
    async fn test_discover_collects_distinct_responders_in_answer_order() {
        // Arrange: three simulated fans, each answering twice
        let (port, responder) = spawn_responder(3, 2);
        let probe = DiscoveryProbe::new(loopback_settings(700), port);

        // Act
        let found = probe.discover(b"VENTO?".to_vec()).await.expect("discover");
        responder.join().unwrap();

        // Assert – three distinct candidates, no duplicates
        assert_eq!(found.len(), 3);
        let unique: HashSet<_> = found.iter().cloned().collect();
        assert_eq!(unique.len(), found.len());
    }

    #[tokio::test]
    async fn test_discover_fails_to_bind_on_unroutable_host() {
        // 198.51.100.1 (TEST-NET-2) is not a local interface address, so the
        // bind must fail with the Bind variant.
        let settings = DiscoverySettings {
            bind_host: "198.51.100.1".parse().unwrap(),
            target: "127.0.0.1".parse().unwrap(),
            window: Duration::from_millis(100),
        };
        let probe = DiscoveryProbe::new(settings, 4000);

        let result = probe.discover(Vec::new()).await;
        assert!(matches!(result, Err(DiscoveryError::Bind { .. })));
    }
}
