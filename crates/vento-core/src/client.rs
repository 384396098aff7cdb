//! Capability seam for the vendor device transport.
//!
//! The concrete wire protocol is not part of this workspace; the hub talks
//! to devices exclusively through these traits.  Two rules shape them:
//!
//! - A [`DeviceClient`] drives exactly one device.  All I/O happens inside
//!   `initialize` / `refresh`; constructing a client must not touch the
//!   network, mirroring the vendor library where the session object is built
//!   first and the handshake is an explicit call.
//!
//! - A [`DeviceConnector`] hands out one *fresh* client per call.  Probing
//!   several candidates must never reuse a client object, so no resolved
//!   identity or socket state can leak from one candidate into the next.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::device::{Credentials, DeviceAddress, DeviceId};
use crate::domain::state::FanState;

/// Fault raised by a device transport implementation.
///
/// The hub folds every variant into its own taxonomy: a `ClientError` during
/// a handshake is a connection-level failure; a handshake that *completes*
/// without yielding a usable identity is reported separately by the caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The network exchange could not complete.
    #[error("network error talking to device: {0}")]
    Network(#[from] std::io::Error),

    /// The device did not answer within the transport's deadline.
    #[error("device did not answer within {0:?}")]
    Timeout(Duration),

    /// The device answered with something the transport could not accept.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// One live session to one device.
///
/// Implementations are driven by a single owner at a time; the hub
/// serializes calls structurally (the poller task is the sole owner of its
/// session), so no internal locking is required of implementors.
#[async_trait]
pub trait DeviceClient: Send {
    /// Runs the identity/authentication handshake.
    ///
    /// `Ok(false)` means the exchange completed but the device did not
    /// confirm the handshake; callers treat that the same as an unresolved
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange cannot complete.
    async fn initialize(&mut self) -> Result<bool, ClientError>;

    /// Fetches the current device state into the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange cannot complete.
    async fn refresh(&mut self) -> Result<(), ClientError>;

    /// Identity as currently known: the configured id before a successful
    /// handshake, the device-reported id after.
    fn device_id(&self) -> DeviceId;

    fn host(&self) -> &str;

    fn port(&self) -> u16;

    /// Last state fetched by [`DeviceClient::refresh`].
    fn state(&self) -> FanState;
}

/// Factory for device clients and the broadcast probe payload.
pub trait DeviceConnector: Send + Sync {
    type Client: DeviceClient;

    /// Creates a fresh, independently owned client for one candidate.
    fn connect(&self, address: &DeviceAddress, credentials: &Credentials) -> Self::Client;

    /// Opaque datagram payload that makes devices announce themselves.
    fn discovery_query(&self) -> Vec<u8>;
}
