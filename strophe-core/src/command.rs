//! Command and status types shared between the network tasks and the
//! motion control task.

/// A rotator operation requested by a network client
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RotatorCommand {
    /// Move to an absolute gear angle in degrees
    MoveToAngle(f64),
    /// Move by a relative gear angle in degrees
    MoveByAngle(f64),
    /// Stop motion and re-sync the position model
    Halt,
    /// Adjust the active speed by a signed amount (result is clamped)
    AdjustSpeed(i32),
    /// Define the current orientation as angle zero
    SetZero,
    /// Define the current orientation as the gear mid-point (90 degrees)
    SetMiddle,
    /// Set the motor-facing direction reversal flag
    SetReverse(bool),
    /// Enable or disable holding torque without touching the position model
    SetTorque(bool),
}

/// Read-only snapshot of the rotator, published for status consumers
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotatorStatus {
    /// Gear angle in `[0, 360)` from the last position model update
    pub angle: f64,
    /// Gear angle in `[0, 360)` the rotator is moving toward (equals
    /// `angle` once the move completes)
    pub target_angle: f64,
    /// Whether the motor reported motion on the last poll
    pub moving: bool,
    /// Whether the health monitor currently flags the motor blocked
    pub blocked: bool,
    /// Active commanded speed
    pub speed: u16,
    /// Authoritative accumulated step count
    pub accumulated_steps: i32,
    /// Supply voltage in decivolts from the last good poll, if any
    pub voltage_dv: Option<u8>,
    /// Servo temperature in degrees C from the last good poll, if any
    pub temperature_c: Option<u8>,
    /// Servo load from the last good poll, if any
    pub load: Option<i16>,
    /// Operating mode the servo last reported, if any
    pub mode: Option<u8>,
}
