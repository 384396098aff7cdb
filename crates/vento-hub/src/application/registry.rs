//! Authoritative registry of configured devices.
//!
//! Callers share the registry behind a `tokio::sync::Mutex`.  The setup flow
//! reads a [`RegisteredIds`] snapshot from it before probing and then claims
//! the accepted identity under the lock, so a registration that raced the
//! snapshot is still caught at acceptance time.

use std::collections::HashMap;

use thiserror::Error;

use vento_core::{DeviceAddress, DeviceId};

use crate::application::dedup::RegisteredIds;

/// Error type for registry claims.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    /// The identity is already registered as a unique key.
    #[error("device {0} is already configured")]
    AlreadyConfigured(DeviceId),
}

/// Persisted-facing record of one configured device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub display_name: String,
    pub address: DeviceAddress,
}

/// In-memory registry keyed by device identity.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only snapshot of every registered identity.
    pub fn snapshot(&self) -> RegisteredIds {
        self.devices.keys().cloned().collect()
    }

    /// Registers `entry` iff its identity is not already taken.
    ///
    /// This is the unique-key check the setup flow runs at acceptance time,
    /// under the registry lock.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::AlreadyConfigured`] when the identity is taken.
    pub fn try_claim(&mut self, entry: DeviceEntry) -> Result<(), ClaimError> {
        if self.devices.contains_key(&entry.id) {
            return Err(ClaimError::AlreadyConfigured(entry.id));
        }
        self.devices.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceEntry> {
        self.devices.get(id)
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<DeviceEntry> {
        self.devices.remove(id)
    }

    /// Returns every registered device.
    pub fn all(&self) -> Vec<DeviceEntry> {
        self.devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
