//! SCS/STS serial-bus servo protocol
//!
//! This crate defines the half-duplex UART protocol spoken by ST-series
//! serial bus servos (ST3215 and friends). One controller addresses up to
//! 253 servos on a shared bus; every exchange is a single instruction frame
//! answered by a single status frame.
//!
//! # Frame Overview
//!
//! Both directions use the same binary frame format:
//! ```text
//! ┌────────┬────────┬────┬────────┬───────────┬───────────┬──────────┐
//! │ HEADER │ HEADER │ ID │ LENGTH │ INSTR/ERR │ PARAMS    │ CHECKSUM │
//! │ 0xFF   │ 0xFF   │ 1B │ 1B     │ 1B        │ 0–64B     │ 1B       │
//! └────────┴────────┴────┴────────┴───────────┴───────────┴──────────┘
//! ```
//!
//! LENGTH counts the instruction byte, the parameters, and the checksum.
//! The checksum is the bitwise complement of the byte sum from ID through
//! the last parameter. In a status frame, the instruction slot carries the
//! servo's fault flags instead.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod registers;

pub use frame::{
    FrameError, InstructionFrame, StatusFrame, StatusParser, BROADCAST_ID, FRAME_HEADER,
    MAX_FRAME_SIZE, MAX_PARAMS,
};
pub use registers::{instruction, reg, ServoFault};
