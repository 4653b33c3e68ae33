//! Angle math for the geared rotator
//!
//! All conversions between gear degrees and motor-shaft steps live here
//! as pure functions so the controller and the tests share one source of
//! truth. The motor has 4096 steps per shaft revolution; the gear ratio
//! is motor-shaft degrees per gear degree.

/// Device-native steps per motor shaft revolution
pub const STEPS_PER_REVOLUTION: u16 = 4096;

/// Degrees per revolution
pub const DEGREES_PER_REVOLUTION: f64 = 360.0;

/// Normalize an angle into `[0, 360)`
pub fn normalize_angle(deg: f64) -> f64 {
    let wrapped = deg - DEGREES_PER_REVOLUTION * libm::floor(deg / DEGREES_PER_REVOLUTION);
    // Rounding can land exactly on 360.0 for tiny negative inputs
    if wrapped >= DEGREES_PER_REVOLUTION {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed path from `current` to `target`, in `(-180, 180]`
///
/// Both inputs are taken modulo 360 first, so callers may pass
/// unnormalized angles.
pub fn shortest_delta(current: f64, target: f64) -> f64 {
    let delta = normalize_angle(target - current);
    if delta > DEGREES_PER_REVOLUTION / 2.0 {
        delta - DEGREES_PER_REVOLUTION
    } else {
        delta
    }
}

/// Convert a gear-degree delta into a motor step delta, rounded to nearest
pub fn angle_to_steps(deg: f64, gear_ratio: f64) -> i32 {
    libm::round(deg * gear_ratio / DEGREES_PER_REVOLUTION * STEPS_PER_REVOLUTION as f64) as i32
}

/// Convert an accumulated motor step count into a gear angle in `[0, 360)`
pub fn steps_to_angle(steps: i32, gear_ratio: f64) -> f64 {
    let motor_degrees = steps as f64 / STEPS_PER_REVOLUTION as f64 * DEGREES_PER_REVOLUTION;
    normalize_angle(motor_degrees / gear_ratio)
}

/// Angular size of a single motor step on the gear, in degrees
pub fn step_resolution(gear_ratio: f64) -> f64 {
    DEGREES_PER_REVOLUTION / STEPS_PER_REVOLUTION as f64 / gear_ratio
}

/// Mapping applied to requested target angles before step conversion
///
/// Two mounting variants exist in the field. `Direct` maps the full
/// 0-360 range one-to-one. `FoldedHalf` folds targets past 180 back via
/// `|180 - angle|`, halving the usable range for mounts whose cabling
/// cannot pass the half-turn point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AngleMapping {
    /// Full 0-360 range, shortest-path moves
    #[default]
    Direct,
    /// Fold targets past 180 back into `[0, 180]`
    FoldedHalf,
}

impl AngleMapping {
    /// Apply the mapping to a requested target angle
    pub fn map_target(self, deg: f64) -> f64 {
        match self {
            Self::Direct => deg,
            Self::FoldedHalf => {
                libm::fabs(DEGREES_PER_REVOLUTION / 2.0 - normalize_angle(deg))
            }
        }
    }
}
