//! Device client backends.
//!
//! The concrete vendor transport lives outside this workspace; what ships
//! here is the simulated backend used by the headless binary and the test
//! suites.

pub mod sim;
