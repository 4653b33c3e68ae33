//! ST3215 serial-bus servo driver
//!
//! The ST3215 is a geared smart servo on a half-duplex UART bus
//! (1 Mbaud, 8N1). This driver runs it exclusively in continuous "motor
//! mode": travel limits pinned to zero, moves issued as signed step
//! deltas, and the position register repurposed by the device to report
//! remaining distance to the last target.
//!
//! The driver is transport-free. Every operation is exposed as a frame
//! builder plus a response parser; the firmware sends the bytes and
//! enforces the per-transaction timeout.

use heapless::Vec;
use strophe_core::traits::FeedbackSample;
use strophe_protocol::registers::{decode_signed, encode_signed, word_from_le, word_to_le};
use strophe_protocol::{instruction, reg, InstructionFrame, ServoFault, StatusFrame, MAX_PARAMS};

/// The single supported operating mode (continuous rotation)
pub const MOTOR_MODE: u8 = 3;

/// First bus ID tried during discovery
pub const SCAN_ID_MIN: u8 = 0;

/// Last bus ID tried during discovery
pub const SCAN_ID_MAX: u8 = 10;

/// ID assumed when no servo answers the scan
pub const FALLBACK_ID: u8 = 0;

/// Telemetry block size: [`reg::OPERATING_MODE`] through the high byte
/// of [`reg::PRESENT_CURRENT`], read in one transaction so a sample is
/// either complete or absent
pub const FEEDBACK_SPAN: u8 = 38;

/// Byte offset of a register within the telemetry block
const fn off(register: u8) -> usize {
    (register - reg::OPERATING_MODE) as usize
}

/// Response validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum St3215Error {
    /// A valid frame arrived from an unexpected bus address
    WrongResponder,
    /// The status frame carried fewer parameter bytes than requested
    ShortResponse,
    /// A valid frame arrived whose shape does not match the request
    /// (e.g. a register read reply where a bare ack was expected)
    UnexpectedReply,
}

/// ST3215 driver bound to one bus address
#[derive(Debug, Clone, Copy)]
pub struct St3215Driver {
    id: u8,
}

impl St3215Driver {
    /// Create a driver for the servo at the given bus address
    pub fn new(id: u8) -> Self {
        Self { id }
    }

    /// Bus address this driver talks to
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Rebind to a different bus address (after discovery)
    pub fn set_id(&mut self, id: u8) {
        self.id = id;
    }

    fn write_frame(&self, start: u8, data: &[u8]) -> InstructionFrame {
        let mut params: Vec<u8, MAX_PARAMS> = Vec::new();
        // Cannot overflow: every write this driver issues is under 8 bytes
        let _ = params.push(start);
        let _ = params.extend_from_slice(data);
        InstructionFrame {
            id: self.id,
            instruction: instruction::WRITE,
            params,
        }
    }

    fn read_frame(&self, start: u8, count: u8) -> InstructionFrame {
        let mut params: Vec<u8, MAX_PARAMS> = Vec::new();
        let _ = params.push(start);
        let _ = params.push(count);
        InstructionFrame {
            id: self.id,
            instruction: instruction::READ,
            params,
        }
    }

    /// Presence check
    pub fn ping_frame(&self) -> InstructionFrame {
        InstructionFrame::empty(self.id, instruction::PING)
    }

    /// Request the full telemetry block in one transaction
    pub fn feedback_request(&self) -> InstructionFrame {
        self.read_frame(reg::OPERATING_MODE, FEEDBACK_SPAN)
    }

    /// Parse the reply to [`Self::feedback_request`]
    pub fn parse_feedback(&self, frame: &StatusFrame) -> Result<FeedbackSample, St3215Error> {
        if frame.id != self.id {
            return Err(St3215Error::WrongResponder);
        }
        let p = &frame.params;
        if p.len() < FEEDBACK_SPAN as usize {
            return Err(St3215Error::ShortResponse);
        }

        let word = |r: u8| word_from_le(p[off(r)], p[off(r) + 1]);

        Ok(FeedbackSample {
            position_remaining: decode_signed(word(reg::PRESENT_POSITION)),
            speed: decode_signed(word(reg::PRESENT_SPEED)),
            load: decode_signed(word(reg::PRESENT_LOAD)),
            voltage_dv: p[off(reg::PRESENT_VOLTAGE)],
            temperature_c: p[off(reg::PRESENT_TEMPERATURE)],
            current_raw: word(reg::PRESENT_CURRENT),
            moving: p[off(reg::MOVING)] != 0,
            mode: p[off(reg::OPERATING_MODE)],
            fault: ServoFault::from_bits(p[off(reg::STATUS)]),
        })
    }

    /// Command a relative move at the given speed and acceleration
    ///
    /// Writes acceleration, goal position (the step delta, sign-magnitude
    /// encoded), running time (zero), and goal speed in one contiguous
    /// register write starting at [`reg::ACCELERATION`].
    pub fn move_frame(&self, delta_steps: i16, speed: u16, accel: u8) -> InstructionFrame {
        let [pos_lo, pos_hi] = word_to_le(encode_signed(delta_steps));
        let [spd_lo, spd_hi] = word_to_le(speed);
        self.write_frame(
            reg::ACCELERATION,
            &[accel, pos_lo, pos_hi, 0, 0, spd_lo, spd_hi],
        )
    }

    /// Enable or disable holding torque
    pub fn torque_frame(&self, enabled: bool) -> InstructionFrame {
        self.write_frame(reg::TORQUE_ENABLE, &[enabled as u8])
    }

    /// Open the EPROM write gate
    pub fn unlock_frame(&self) -> InstructionFrame {
        self.write_frame(reg::LOCK, &[0])
    }

    /// Close the EPROM write gate
    pub fn lock_frame(&self) -> InstructionFrame {
        self.write_frame(reg::LOCK, &[1])
    }

    /// Program both travel limits in one write
    pub fn travel_limits_frame(&self, min: u16, max: u16) -> InstructionFrame {
        let [min_lo, min_hi] = word_to_le(min);
        let [max_lo, max_hi] = word_to_le(max);
        self.write_frame(reg::MIN_TRAVEL_LIMIT, &[min_lo, min_hi, max_lo, max_hi])
    }

    /// Pin the operating mode to motor mode
    pub fn motor_mode_frame(&self) -> InstructionFrame {
        self.write_frame(reg::OPERATING_MODE, &[MOTOR_MODE])
    }

    /// Read back the operating mode register
    pub fn mode_request(&self) -> InstructionFrame {
        self.read_frame(reg::OPERATING_MODE, 1)
    }

    /// Parse the reply to [`Self::mode_request`]
    pub fn parse_mode(&self, frame: &StatusFrame) -> Result<u8, St3215Error> {
        if frame.id != self.id {
            return Err(St3215Error::WrongResponder);
        }
        frame
            .params
            .first()
            .copied()
            .ok_or(St3215Error::ShortResponse)
    }

    /// Validate a bare acknowledgement
    ///
    /// A write ack carries no parameters. A frame with a payload is some
    /// other exchange's reply (typically a telemetry read that outlived
    /// its timeout) and must not be taken as confirmation of a write.
    pub fn check_ack(&self, frame: &StatusFrame) -> Result<(), St3215Error> {
        if frame.id != self.id {
            return Err(St3215Error::WrongResponder);
        }
        if !frame.params.is_empty() {
            return Err(St3215Error::UnexpectedReply);
        }
        Ok(())
    }

    /// Read back both travel limit registers
    pub fn limits_request(&self) -> InstructionFrame {
        self.read_frame(reg::MIN_TRAVEL_LIMIT, 4)
    }

    /// Parse the reply to [`Self::limits_request`] into (min, max)
    pub fn parse_limits(&self, frame: &StatusFrame) -> Result<(u16, u16), St3215Error> {
        if frame.id != self.id {
            return Err(St3215Error::WrongResponder);
        }
        let p = &frame.params;
        if p.len() < 4 {
            return Err(St3215Error::ShortResponse);
        }
        Ok((word_from_le(p[0], p[1]), word_from_le(p[2], p[3])))
    }

    /// EPROM configuration sequence for bring-up
    ///
    /// Unlocks the gate, pins both travel limits to zero (unlimited
    /// rotation), forces motor mode, and locks the gate again. The lock
    /// frame is always the final element; a caller that aborts mid-way
    /// must still deliver it so the gate never stays open.
    pub fn bringup_frames(&self) -> [InstructionFrame; 4] {
        [
            self.unlock_frame(),
            self.travel_limits_frame(0, 0),
            self.motor_mode_frame(),
            self.lock_frame(),
        ]
    }
}
