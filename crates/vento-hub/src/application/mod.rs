//! Application layer use cases for the hub.
//!
//! Use cases in this layer sequence the discovery, authentication, and
//! refresh primitives into the two operator-visible behaviors: configuring
//! a device and keeping its state fresh.  Everything is injected through
//! the capability traits in `vento-core`, so every flow is drivable from
//! plain tests with a scripted device backend.
//!
//! # Sub-modules
//!
//! - **`setup`** – The one-shot configuration flow: resolve candidates
//!   (broadcast discovery or an explicit address), authenticate them in
//!   order, and accept the first device not already registered.  Every
//!   terminal state is an explicit [`setup::SetupOutcome`] variant.
//!
//! - **`dedup`** – The registered-identity snapshot and the pure membership
//!   check the setup flow uses to skip already-configured devices.
//!
//! - **`registry`** – The authoritative registry of configured devices;
//!   acceptance claims an identity here under lock, catching registrations
//!   that raced the snapshot.
//!
//! - **`poller`** – Long-term ownership of one authenticated session: a
//!   fixed-interval refresh loop that classifies per-tick failures without
//!   ever tearing itself down.

pub mod dedup;
pub mod poller;
pub mod registry;
pub mod setup;
