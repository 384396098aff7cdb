//! Infrastructure layer for the hub.
//!
//! Contains the adapters that touch the outside world: the UDP broadcast
//! probe, the session authenticator driving the vendor capability traits,
//! the simulated device backend, and TOML config storage.

pub mod client;
pub mod network;
pub mod storage;
