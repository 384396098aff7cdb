//! Network infrastructure for the hub.
//!
//! # Sub-modules
//!
//! - **`discovery`** – Sends one broadcast query datagram and collects the
//!   distinct addresses that answer within a bounded window.  This is how
//!   fans are found without manual IP configuration.
//!
//! - **`auth`** – Opens a session to one candidate address, runs the
//!   identity handshake under an explicit timeout, and yields a
//!   [`auth::DeviceSession`] whose identity is guaranteed to be resolved.

pub mod auth;
pub mod discovery;
