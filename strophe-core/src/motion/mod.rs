//! Rotator motion control
//!
//! Pure angle math plus the controller that owns the authoritative
//! position model for the geared servo.

pub mod angle;
pub mod controller;

pub use angle::{
    normalize_angle, shortest_delta, step_resolution, AngleMapping, DEGREES_PER_REVOLUTION,
    STEPS_PER_REVOLUTION,
};
pub use controller::{MotionController, MotionError};
