//! Device identity, addressing, and operator credentials.
//!
//! A factory-fresh fan reports the placeholder identifier
//! [`UNASSIGNED_DEVICE_ID`] until its handshake resolves the real one.  The
//! whole setup path treats that placeholder as "not a usable identity": a
//! session whose id is still the sentinel after initialization is a failed
//! authentication, never a success.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier a factory-fresh device reports before its real id is resolved.
pub const UNASSIGNED_DEVICE_ID: &str = "DEFAULT_DEVICEID";

/// Address sentinel requesting broadcast discovery instead of a direct probe.
pub const BROADCAST_HOST: &str = "<broadcast>";

/// Default UDP port the fans listen on.
pub const DEFAULT_DEVICE_PORT: u16 = 4000;

/// Stable identifier a device reports after a successful handshake.
///
/// Comparison is exact and case-sensitive; the vendor assigns ids as opaque
/// strings, so no normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The factory placeholder id.
    pub fn unassigned() -> Self {
        Self(UNASSIGNED_DEVICE_ID.to_string())
    }

    /// Returns `true` when this id is still the factory placeholder.
    pub fn is_unassigned(&self) -> bool {
        self.0 == UNASSIGNED_DEVICE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Network address of a candidate device.
///
/// Produced by discovery (or taken verbatim from operator configuration) and
/// consumed by authentication; not kept once a session is established.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Operator-supplied credentials for one device.
///
/// `device_id` may be the factory sentinel when the operator does not know
/// the id in advance; the handshake resolves the real one.  Immutable once a
/// session is opened with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub device_id: DeviceId,
    pub password: String,
    /// Base display name; the resolved device id is appended on success so
    /// several fans configured in one system get distinct names.
    pub name: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
