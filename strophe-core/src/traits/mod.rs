//! Hardware abstraction traits
//!
//! These traits define the interface between the motion logic and the
//! hardware-specific bus implementation.

pub mod servo;

pub use servo::{FeedbackSample, LinkError, ServoLink};
