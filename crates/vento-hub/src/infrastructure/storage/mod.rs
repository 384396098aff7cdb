//! File-system storage for the hub.

pub mod config;
