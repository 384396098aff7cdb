//! Fan state snapshot exposed after a successful refresh.

use serde::{Deserialize, Serialize};

/// Speed setting reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    Low,
    Medium,
    High,
    /// Operator-set percentage, 0–100.
    Manual(u8),
}

/// Airflow direction/mode of the fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Airflow {
    Ventilation,
    HeatRecovery,
    AirSupply,
}

/// Snapshot of the device state after one refresh.
///
/// The poller publishes the most recent snapshot to consumers; before the
/// first successful refresh there is none, and consumers must tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanState {
    pub power: bool,
    pub speed: SpeedMode,
    pub airflow: Airflow,
    /// Relative humidity at the device, percent.
    pub humidity: u8,
    /// Intake fan speed, RPM.
    pub fan1_rpm: u16,
    /// Exhaust fan speed, RPM.
    pub fan2_rpm: u16,
    /// Set when the device asks for a filter replacement.
    pub filter_replacement_due: bool,
    /// Temporary full-speed boost engaged.
    pub boost: bool,
}

impl Default for FanState {
    fn default() -> Self {
        Self {
            power: false,
            speed: SpeedMode::Low,
            airflow: Airflow::Ventilation,
            humidity: 0,
            fan1_rpm: 0,
            fan2_rpm: 0,
            filter_replacement_due: false,
            boost: false,
        }
    }
}
