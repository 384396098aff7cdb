//! Fixed-interval state polling for one authenticated session.
//!
//! # Lifecycle
//!
//! ```text
//! Poller::start ──► startup handshake ──► poll task
//!                     │ fails: fatal        │ tick: one refresh, then wait
//!                     └ (no task spawned)   │   fault → Failed{reason}, keep going
//!                                           └ stop() → finish in-flight tick, exit
//! ```
//!
//! The startup handshake failing is the one fatal case: it distinguishes
//! "device unreachable at startup" (the owner must not begin polling) from
//! "device became unreachable later" (a degraded tick, retried on the next
//! interval — no backoff, no retry cutoff, the loop never tears itself
//! down).
//!
//! The poll task is the sole owner of the session, and each tick awaits its
//! refresh before the timer is consulted again, so at most one refresh is in
//! flight per session at any time.  `MissedTickBehavior::Delay` keeps a slow
//! refresh from causing a burst of catch-up ticks.
//!
//! Consumers read the most recent [`PollStatus`] from a `watch` channel;
//! before the first successful refresh its `state` is `None`, and consumers
//! must tolerate that.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use vento_core::{ClientError, DeviceClient, FanState};

use crate::infrastructure::network::auth::DeviceSession;

/// Outcome of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// The device state was refreshed.
    Updated,
    /// The refresh failed; the poller stays alive and retries next tick.
    Failed { reason: String },
}

/// Most recent polling state published to consumers.
#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    /// Last successfully refreshed state; `None` before the first success.
    pub state: Option<FanState>,
    /// Result of the most recent tick; `None` before the first tick.
    pub last: Option<PollResult>,
}

/// Error type for poller construction.
#[derive(Debug, Error)]
pub enum PollerStartError {
    /// The startup handshake could not complete.
    #[error("device startup handshake failed: {0}")]
    Handshake(#[from] ClientError),
    /// The handshake completed but the device did not confirm it.
    #[error("device did not confirm the startup handshake")]
    Rejected,
}

/// Timing parameters for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Time between refresh ticks.
    pub interval: Duration,
    /// Deadline for a single handshake or refresh exchange.
    pub request_timeout: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// The refresh engine: owns the session and performs one tick at a time.
///
/// [`Poller::start`] drives it from a timer task; tests drive
/// [`Poller::tick`] directly.
pub struct Poller<C: DeviceClient> {
    session: DeviceSession<C>,
    request_timeout: Duration,
    status_tx: watch::Sender<PollStatus>,
}

impl<C: DeviceClient> Poller<C> {
    /// Wraps an authenticated session; the receiver observes every tick.
    pub fn new(
        session: DeviceSession<C>,
        request_timeout: Duration,
    ) -> (Self, watch::Receiver<PollStatus>) {
        let (status_tx, status_rx) = watch::channel(PollStatus::default());
        (
            Self {
                session,
                request_timeout,
                status_tx,
            },
            status_rx,
        )
    }

    /// Runs exactly one refresh and publishes the result.
    ///
    /// A fault is folded into [`PollResult::Failed`]; it never propagates,
    /// and the previously published state is retained.
    pub async fn tick(&mut self) -> PollResult {
        let result =
            match tokio::time::timeout(self.request_timeout, self.session.refresh()).await {
                Err(_) => PollResult::Failed {
                    reason: format!("refresh timed out after {:?}", self.request_timeout),
                },
                Ok(Err(e)) => PollResult::Failed {
                    reason: e.to_string(),
                },
                Ok(Ok(())) => PollResult::Updated,
            };

        match &result {
            PollResult::Updated => {
                debug!("refreshed state of device {}", self.session.device_id());
            }
            PollResult::Failed { reason } => {
                warn!(
                    "refresh of device {} failed: {reason}",
                    self.session.device_id()
                );
            }
        }

        self.status_tx.send_modify(|status| {
            if result == PollResult::Updated {
                status.state = Some(self.session.state());
            }
            status.last = Some(result.clone());
        });

        result
    }

    /// Runs the startup handshake, then spawns the timer-driven poll loop.
    ///
    /// The first refresh fires immediately; subsequent ticks follow at
    /// `settings.interval`.
    ///
    /// # Errors
    ///
    /// Returns [`PollerStartError`] when the startup handshake fails; no
    /// task is spawned in that case and the session is dropped.
    pub async fn start(
        mut session: DeviceSession<C>,
        settings: PollerSettings,
    ) -> Result<PollerHandle, PollerStartError>
    where
        C: 'static,
    {
        match tokio::time::timeout(settings.request_timeout, session.handshake()).await {
            Err(_) => {
                return Err(PollerStartError::Handshake(ClientError::Timeout(
                    settings.request_timeout,
                )))
            }
            Ok(Err(e)) => return Err(PollerStartError::Handshake(e)),
            Ok(Ok(false)) => return Err(PollerStartError::Rejected),
            Ok(Ok(true)) => {}
        }
        info!(
            "starting poller for device {} every {:?}",
            session.device_id(),
            settings.interval
        );

        let (mut poller, status_rx) = Poller::new(session, settings.request_timeout);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = settings.interval;

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        poller.tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("poller for device {} stopped", poller.session.device_id());
                        break;
                    }
                }
            }
        });

        Ok(PollerHandle {
            status_rx,
            shutdown_tx,
            task,
            interval,
        })
    }
}

/// Owner-facing handle for a running poll loop.
pub struct PollerHandle {
    status_rx: watch::Receiver<PollStatus>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    interval: Duration,
}

impl PollerHandle {
    /// Snapshot of the most recent polling state.
    pub fn status(&self) -> PollStatus {
        self.status_rx.borrow().clone()
    }

    /// A receiver that observes every subsequent tick.
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status_rx.clone()
    }

    /// The configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops the loop.  An in-flight refresh completes first; when this
    /// returns, no further refresh will be issued.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
