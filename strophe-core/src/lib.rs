//! Board-agnostic motion core for the Strophe rotator firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - The servo link trait seam (bus operations as a testable interface)
//! - Motion controller owning the authoritative rotator position
//! - Angle math and gear-ratio mapping strategies
//! - Health monitoring of the servo bus
//! - Command boundary for transport adapters
//! - Configuration type definitions
//!
//! The servo in motor mode never reports absolute position, only distance
//! to its last commanded target, so the motion controller's accumulated
//! step count is the single source of truth for the rotator angle.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod command;
pub mod config;
pub mod health;
pub mod motion;
pub mod traits;
