//! Hardware driver implementations
//!
//! Frame-level drivers for the devices on the rotator's serial bus. The
//! drivers are transport-free: they build instruction frames and parse
//! status frames, while the firmware owns the UART and the timeouts.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod servo;
