//! Domain types shared between the hub's setup and polling paths.
//!
//! # Sub-modules
//!
//! - **`device`** – Device identity (with the vendor's factory sentinel),
//!   candidate network addresses, and operator credentials.
//!
//! - **`state`** – The fan state snapshot a session exposes after a
//!   successful refresh.

pub mod device;
pub mod state;
