//! Motion configuration
//!
//! Compile-time defaults for the rotator; there is no persisted
//! configuration store, so these are the values every boot starts from.

use crate::motion::AngleMapping;

/// Lowest commandable servo speed in device units
pub const MIN_SPEED: u16 = 100;

/// Highest commandable servo speed in device units (device limit)
pub const MAX_SPEED: u16 = 4000;

/// Speed used until a client adjusts it
pub const DEFAULT_SPEED: u16 = 400;

/// Acceleration value sent with every move command
pub const DEFAULT_ACCEL: u8 = 100;

/// Reported speeds at or below this magnitude count as stationary
pub const MOVING_THRESHOLD: i16 = 10;

/// Static configuration for the motion controller
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionConfig {
    /// Motor-shaft degrees per gear degree
    pub gear_ratio: f64,
    /// Negate motor-facing deltas (wiring/mounting compensation)
    pub reverse: bool,
    /// Target-angle mapping variant
    pub mapping: AngleMapping,
    /// Initial commanded speed, clamped to `[MIN_SPEED, MAX_SPEED]`
    pub initial_speed: u16,
    /// Acceleration for move commands
    pub accel: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            gear_ratio: 2.0,
            reverse: false,
            mapping: AngleMapping::Direct,
            initial_speed: DEFAULT_SPEED,
            accel: DEFAULT_ACCEL,
        }
    }
}

/// Clamp a requested speed into the commandable range
pub fn clamp_speed(speed: i32) -> u16 {
    speed.clamp(MIN_SPEED as i32, MAX_SPEED as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_speed() {
        assert_eq!(clamp_speed(400), 400);
        assert_eq!(clamp_speed(100), 100);
        assert_eq!(clamp_speed(4000), 4000);
        assert_eq!(clamp_speed(99), 100);
        assert_eq!(clamp_speed(4001), 4000);
        assert_eq!(clamp_speed(-999_999), 100);
        assert_eq!(clamp_speed(999_999), 4000);
    }

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert_eq!(config.gear_ratio, 2.0);
        assert!(!config.reverse);
        assert_eq!(config.mapping, AngleMapping::Direct);
        assert!((MIN_SPEED..=MAX_SPEED).contains(&config.initial_speed));
    }
}
