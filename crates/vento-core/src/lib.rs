//! # vento-core
//!
//! Shared library for VentoHub containing the domain types and the
//! device-capability traits used by the hub application.
//!
//! This crate has zero dependencies on sockets, OS APIs, or the concrete
//! vendor wire protocol.  It defines:
//!
//! - **`domain`** – Pure data types: device identities (including the vendor
//!   sentinel), candidate addresses, operator credentials, and the fan state
//!   snapshot exposed to downstream consumers.
//!
//! - **`client`** – The capability seam for the vendor transport: a
//!   [`client::DeviceClient`] drives exactly one device session, and a
//!   [`client::DeviceConnector`] creates one fresh client per candidate so
//!   no connection state leaks between probe attempts.

pub mod client;
pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `vento_core::DeviceId` instead of `vento_core::domain::device::DeviceId`.
pub use client::{ClientError, DeviceClient, DeviceConnector};
pub use domain::device::{
    Credentials, DeviceAddress, DeviceId, BROADCAST_HOST, DEFAULT_DEVICE_PORT,
    UNASSIGNED_DEVICE_ID,
};
pub use domain::state::{Airflow, FanState, SpeedMode};
