//! Firing configuration for the laser head.
//!
//! All modes are closed enums carrying their wire codes, so invalid mode
//! values are unrepresentable. Numeric ranges (repetition rate 1-5 Hz,
//! positive burst count, current and pulse width) are enforced at the
//! [`crate::Laser`] setter boundary before any frame is sent.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Allowed repetition rates in Hz.
pub const REP_RATE_RANGE: RangeInclusive<u32> = 1..=5;

/// Shot mode of the laser (`PM` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseMode {
    /// Fire for the configured pulse period.
    Continuous,
    /// Fire a single shot at the configured repetition rate.
    SingleShot,
    /// Fire `burst_count` shots at the configured repetition rate.
    Burst,
}

impl PulseMode {
    /// Wire code sent with the `PM` command.
    pub fn code(self) -> u8 {
        match self {
            Self::Continuous => 0,
            Self::SingleShot => 1,
            Self::Burst => 2,
        }
    }
}

/// Energy mode of the laser (`EM` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyMode {
    /// Diode current set manually via `DC`.
    Manual,
    /// Factory low-power setting. Firing is disallowed in this mode.
    Low,
    /// Factory high-power setting.
    High,
}

impl EnergyMode {
    /// Wire code sent with the `EM` command.
    pub fn code(self) -> u8 {
        match self {
            Self::Manual => 0,
            Self::Low => 1,
            Self::High => 2,
        }
    }
}

/// Diode trigger source (`DT` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiodeTrigger {
    /// Software/internal trigger.
    Internal,
    /// Hardware/external trigger.
    External,
}

impl DiodeTrigger {
    /// Wire code sent with the `DT` command.
    pub fn code(self) -> u8 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }
}

/// Session-local copy of the laser's firing parameters.
///
/// Held by [`crate::Laser`] and mutated only through its validated setters,
/// which commit a value only after the device acknowledged the matching
/// command. Burst duration is derived on demand from burst count and
/// repetition rate, so it can never go stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserConfig {
    /// Shot mode.
    pub pulse_mode: PulseMode,
    /// Pulse period in seconds; only used in continuous mode.
    pub pulse_period_s: f64,
    /// Repetition rate in Hz (1-5).
    pub rep_rate_hz: u32,
    /// Shots per burst.
    pub burst_count: u32,
    /// Diode current in amps.
    pub diode_current_a: f64,
    /// Energy mode.
    pub energy_mode: EnergyMode,
    /// Diode pulse width in seconds.
    pub pulse_width_s: f64,
    /// Diode trigger source.
    pub diode_trigger: DiodeTrigger,
}

impl Default for LaserConfig {
    /// Documented power-on defaults from the control manual.
    fn default() -> Self {
        Self {
            pulse_mode: PulseMode::Continuous,
            pulse_period_s: 0.0,
            rep_rate_hz: 1,
            burst_count: 10,
            diode_current_a: 0.1,
            energy_mode: EnergyMode::Manual,
            pulse_width_s: 10.0,
            diode_trigger: DiodeTrigger::Internal,
        }
    }
}

impl LaserConfig {
    /// Expected wall-clock duration of a burst-mode fire operation:
    /// `burst_count / rep_rate`.
    pub fn burst_duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.burst_count) / f64::from(self.rep_rate_hz))
    }
}
