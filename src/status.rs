//! Status word codec for the `SS?` query.
//!
//! The laser reports its state as a decimal ASCII integer whose bits map to
//! the named flags below. Bits 2, 4 and 5 are reserved by the protocol and
//! deliberately absent; undefined bits are dropped on decode and never
//! produced on encode.

use serde::{Deserialize, Serialize};

use crate::error::{LaserError, Result};

const LASER_ENABLED: u32 = 1 << 0;
const LASER_ACTIVE: u32 = 1 << 1;
const DIODE_EXTERNAL_TRIGGER: u32 = 1 << 3;
const EXTERNAL_INTERLOCK: u32 = 1 << 6;
const RESONATOR_OVER_TEMP: u32 = 1 << 7;
const ELECTRICAL_OVER_TEMP: u32 = 1 << 8;
const POWER_FAILURE: u32 = 1 << 9;
const READY_TO_ENABLE: u32 = 1 << 10;
const READY_TO_FIRE: u32 = 1 << 11;
const LOW_POWER_MODE: u32 = 1 << 12;
const HIGH_POWER_MODE: u32 = 1 << 13;

/// Decoded snapshot of the laser's status word.
///
/// Snapshots are transient; one is produced per `SS?` query and never
/// cached for safety decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaserStatus {
    /// Bit 0: the laser is enabled (armed).
    pub laser_enabled: bool,
    /// Bit 1: the laser is actively firing.
    pub laser_active: bool,
    /// Bit 3: the diode is set to external triggering.
    pub diode_external_trigger: bool,
    /// Bit 6: the external interlock circuit is open.
    pub external_interlock: bool,
    /// Bit 7: resonator over-temperature fault.
    pub resonator_over_temp: bool,
    /// Bit 8: electrical over-temperature fault.
    pub electrical_over_temp: bool,
    /// Bit 9: power failure fault.
    pub power_failure: bool,
    /// Bit 10: the head is ready to be enabled.
    pub ready_to_enable: bool,
    /// Bit 11: the head is ready to fire.
    pub ready_to_fire: bool,
    /// Bit 12: low power mode selected.
    pub low_power_mode: bool,
    /// Bit 13: high power mode selected.
    pub high_power_mode: bool,
}

impl LaserStatus {
    /// Decode a status word into named flags.
    pub fn from_word(word: u32) -> Self {
        Self {
            laser_enabled: word & LASER_ENABLED != 0,
            laser_active: word & LASER_ACTIVE != 0,
            diode_external_trigger: word & DIODE_EXTERNAL_TRIGGER != 0,
            external_interlock: word & EXTERNAL_INTERLOCK != 0,
            resonator_over_temp: word & RESONATOR_OVER_TEMP != 0,
            electrical_over_temp: word & ELECTRICAL_OVER_TEMP != 0,
            power_failure: word & POWER_FAILURE != 0,
            ready_to_enable: word & READY_TO_ENABLE != 0,
            ready_to_fire: word & READY_TO_FIRE != 0,
            low_power_mode: word & LOW_POWER_MODE != 0,
            high_power_mode: word & HIGH_POWER_MODE != 0,
        }
    }

    /// Encode the flags back into the numeric status word.
    pub fn to_word(&self) -> u32 {
        let mut word = 0;
        if self.laser_enabled {
            word |= LASER_ENABLED;
        }
        if self.laser_active {
            word |= LASER_ACTIVE;
        }
        if self.diode_external_trigger {
            word |= DIODE_EXTERNAL_TRIGGER;
        }
        if self.external_interlock {
            word |= EXTERNAL_INTERLOCK;
        }
        if self.resonator_over_temp {
            word |= RESONATOR_OVER_TEMP;
        }
        if self.electrical_over_temp {
            word |= ELECTRICAL_OVER_TEMP;
        }
        if self.power_failure {
            word |= POWER_FAILURE;
        }
        if self.ready_to_enable {
            word |= READY_TO_ENABLE;
        }
        if self.ready_to_fire {
            word |= READY_TO_FIRE;
        }
        if self.low_power_mode {
            word |= LOW_POWER_MODE;
        }
        if self.high_power_mode {
            word |= HIGH_POWER_MODE;
        }
        word
    }

    /// Parse the decimal ASCII payload of an `SS?` response.
    pub fn parse(payload: &str) -> Result<Self> {
        payload
            .trim()
            .parse::<u32>()
            .map(Self::from_word)
            .map_err(|_| LaserError::Malformed(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_nominal_firing_word() {
        // 3075 = enabled + active + ready to enable + ready to fire
        let status = LaserStatus::from_word(3075);
        assert!(status.laser_enabled);
        assert!(status.laser_active);
        assert!(status.ready_to_enable);
        assert!(status.ready_to_fire);
        assert!(!status.power_failure);
        assert!(!status.high_power_mode);
        assert_eq!(status.to_word(), 3075);
    }

    #[test]
    fn decode_high_power_firing_word() {
        let status = LaserStatus::from_word(11267);
        assert!(status.laser_enabled);
        assert!(status.laser_active);
        assert!(status.ready_to_fire);
        assert!(status.high_power_mode);
        assert_eq!(status.to_word(), 11267);
    }

    #[test]
    fn round_trip_over_all_defined_bits() {
        let defined = [
            1u32, 2, 8, 64, 128, 256, 512, 1024, 2048, 4096, 8192,
        ];

        // Each defined bit individually.
        for bit in defined {
            let status = LaserStatus::from_word(bit);
            assert_eq!(status.to_word(), bit, "bit {bit} did not round-trip");
        }

        // All defined bits at once.
        let all: u32 = defined.iter().sum();
        assert_eq!(LaserStatus::from_word(all).to_word(), all);

        // Empty word.
        assert_eq!(LaserStatus::from_word(0), LaserStatus::default());
    }

    #[test]
    fn reserved_bits_are_dropped() {
        // Bits 2, 4, 5 and anything above 13 are not part of the codec.
        let word = 3075 | (1 << 2) | (1 << 4) | (1 << 5) | (1 << 20);
        assert_eq!(LaserStatus::from_word(word).to_word(), 3075);
    }

    #[test]
    fn parse_accepts_decimal_payloads_only() {
        assert_eq!(LaserStatus::parse("3075").unwrap().to_word(), 3075);
        assert!(matches!(
            LaserStatus::parse("banana"),
            Err(LaserError::Malformed(_))
        ));
    }
}
