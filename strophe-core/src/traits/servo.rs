//! Servo link trait
//!
//! The motion controller issues every bus operation through this trait.
//! The firmware implements it over the half-duplex UART with a bounded
//! per-transaction timeout; tests implement it with a simulated device.
//!
//! All register transactions on the shared bus are strictly sequential:
//! the implementation must not pipeline requests, and a call resolves
//! only when the status frame has arrived or the timeout has expired.

use strophe_protocol::{FrameError, ServoFault};

/// Transport-level failure of a single bus transaction
///
/// No retry happens at this layer; the health monitor decides what a
/// failure means and whether to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No status frame within the transaction timeout
    Timeout,
    /// The bus returned bytes that never formed a valid frame
    Frame(FrameError),
    /// A valid frame arrived from the wrong bus address
    WrongResponder,
    /// A valid frame arrived whose shape does not match the request
    /// (typically a reply that outlived its own timeout)
    UnexpectedReply,
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

/// One complete telemetry sample from the servo
///
/// Replaced wholesale on every successful poll; never persisted. A fault
/// in the underlying read fails the whole sample, there are no partial
/// updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedbackSample {
    /// Steps remaining to the last commanded target (motor frame).
    /// This is the only position-like telemetry the device exposes in
    /// motor mode; it is NOT an absolute position.
    pub position_remaining: i16,
    /// Present speed in steps/s, signed
    pub speed: i16,
    /// Present load in 0.1% duty units, signed
    pub load: i16,
    /// Supply voltage in 0.1 V units
    pub voltage_dv: u8,
    /// Internal temperature in °C
    pub temperature_c: u8,
    /// Motor current in 6.5 mA units
    pub current_raw: u16,
    /// Device moving flag
    pub moving: bool,
    /// Reported operating mode (must stay pinned to motor mode)
    pub mode: u8,
    /// Fault flags from the status register
    pub fault: ServoFault,
}

/// Bus operations the motion controller needs at runtime
///
/// Bring-up operations (scan, travel limits, mode pinning) run before
/// the controller exists and are not part of this seam.
#[allow(async_fn_in_trait)]
pub trait ServoLink {
    /// Read one complete telemetry sample in a single bus transaction
    async fn feedback(&mut self) -> Result<FeedbackSample, LinkError>;

    /// Command a relative move of `delta_steps` from the device's current
    /// commanded target, at the given speed and acceleration
    ///
    /// Repeated calls compose on the device side.
    async fn move_relative(
        &mut self,
        delta_steps: i16,
        speed: u16,
        accel: u8,
    ) -> Result<(), LinkError>;

    /// Enable or disable holding torque
    async fn set_torque(&mut self, enabled: bool) -> Result<(), LinkError>;
}
