//! Register map, instruction codes, and value encodings for the ST3215.
//!
//! The servo exposes a flat byte-addressed memory table: EPROM-backed
//! configuration up to the LOCK gate, volatile control and telemetry above
//! it. Multi-byte values are little-endian; position, speed, and load use
//! the sign-magnitude encoding documented at [`encode_signed`].

/// Instruction codes
pub mod instruction {
    /// Presence check; replies with an empty status frame
    pub const PING: u8 = 0x01;
    /// Read `params[1]` bytes starting at register `params[0]`
    pub const READ: u8 = 0x02;
    /// Write `params[1..]` starting at register `params[0]`
    pub const WRITE: u8 = 0x03;
    /// Buffered write, committed by ACTION
    pub const REG_WRITE: u8 = 0x04;
    /// Commit a buffered REG_WRITE
    pub const ACTION: u8 = 0x05;
    /// Synchronized write to several servos in one frame
    pub const SYNC_WRITE: u8 = 0x83;
}

/// Register addresses
pub mod reg {
    // EPROM (persistent, gated by LOCK)

    /// Bus address of the servo
    pub const SERVO_ID: u8 = 0x05;
    /// Minimum travel limit (2 bytes)
    pub const MIN_TRAVEL_LIMIT: u8 = 0x09;
    /// Maximum travel limit (2 bytes); 0 in motor mode for unlimited rotation
    pub const MAX_TRAVEL_LIMIT: u8 = 0x0B;
    /// Operating mode (0 = position servo, 3 = continuous motor)
    pub const OPERATING_MODE: u8 = 0x21;

    // SRAM (volatile)

    /// Torque enable (0 = free, 1 = holding)
    pub const TORQUE_ENABLE: u8 = 0x28;
    /// Acceleration, in 100 steps/s² units
    pub const ACCELERATION: u8 = 0x29;
    /// Goal position (2 bytes, sign-magnitude); a step delta in motor mode
    pub const GOAL_POSITION: u8 = 0x2A;
    /// Running time (2 bytes); unused in motor mode, written as 0
    pub const GOAL_TIME: u8 = 0x2C;
    /// Goal speed (2 bytes, steps/s)
    pub const GOAL_SPEED: u8 = 0x2E;
    /// EPROM write gate (1 = locked, 0 = unlocked)
    pub const LOCK: u8 = 0x37;
    /// Present position (2 bytes, sign-magnitude); distance-to-target in motor mode
    pub const PRESENT_POSITION: u8 = 0x38;
    /// Present speed (2 bytes, sign-magnitude, steps/s)
    pub const PRESENT_SPEED: u8 = 0x3A;
    /// Present load (2 bytes, sign-magnitude, 0.1% duty units)
    pub const PRESENT_LOAD: u8 = 0x3C;
    /// Supply voltage (1 byte, 0.1 V units)
    pub const PRESENT_VOLTAGE: u8 = 0x3E;
    /// Internal temperature (1 byte, °C)
    pub const PRESENT_TEMPERATURE: u8 = 0x3F;
    /// Fault status flags
    pub const STATUS: u8 = 0x41;
    /// Moving flag (1 while the last command is still executing)
    pub const MOVING: u8 = 0x42;
    /// Motor current (2 bytes, 6.5 mA units)
    pub const PRESENT_CURRENT: u8 = 0x45;
}

/// Encode a little-endian word
pub fn word_to_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

/// Decode a little-endian word
pub fn word_from_le(lo: u8, hi: u8) -> u16 {
    (lo as u16) | ((hi as u16) << 8)
}

/// Encode a signed value as the servo's 15-bit sign-magnitude word
///
/// The STS series does not use two's complement on the wire: bit 15 is a
/// direction flag over a 15-bit magnitude. Magnitudes beyond 15 bits are
/// saturated.
pub fn encode_signed(value: i16) -> u16 {
    if value < 0 {
        let magnitude = (value as i32).unsigned_abs().min(0x7FFF) as u16;
        magnitude | 0x8000
    } else {
        value as u16
    }
}

/// Decode a 15-bit sign-magnitude word into a signed value
pub fn decode_signed(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Parsed servo fault flags (the error byte of a status frame, also
/// readable at [`reg::STATUS`])
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoFault {
    /// Supply voltage outside configured limits
    pub voltage: bool,
    /// Position sensor fault
    pub sensor: bool,
    /// Over-temperature
    pub temperature: bool,
    /// Over-current
    pub current: bool,
    /// Commanded angle outside travel limits
    pub angle: bool,
    /// Sustained overload
    pub overload: bool,
}

impl ServoFault {
    /// Parse from the raw status byte
    pub fn from_bits(bits: u8) -> Self {
        Self {
            voltage: bits & (1 << 0) != 0,
            sensor: bits & (1 << 1) != 0,
            temperature: bits & (1 << 2) != 0,
            current: bits & (1 << 3) != 0,
            angle: bits & (1 << 4) != 0,
            overload: bits & (1 << 5) != 0,
        }
    }

    /// Check if any fault flag is set
    pub fn any(&self) -> bool {
        self.voltage
            || self.sensor
            || self.temperature
            || self.current
            || self.angle
            || self.overload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_roundtrip() {
        let [lo, hi] = word_to_le(0x0FFF);
        assert_eq!(lo, 0xFF);
        assert_eq!(hi, 0x0F);
        assert_eq!(word_from_le(lo, hi), 0x0FFF);
    }

    #[test]
    fn test_encode_signed_positive() {
        assert_eq!(encode_signed(0), 0);
        assert_eq!(encode_signed(2048), 2048);
        assert_eq!(encode_signed(i16::MAX), 0x7FFF);
    }

    #[test]
    fn test_encode_signed_negative() {
        assert_eq!(encode_signed(-1), 0x8001);
        assert_eq!(encode_signed(-2048), 0x8800);
        // i16::MIN magnitude saturates to the 15-bit field
        assert_eq!(encode_signed(i16::MIN), 0xFFFF);
    }

    #[test]
    fn test_decode_signed() {
        assert_eq!(decode_signed(0), 0);
        assert_eq!(decode_signed(400), 400);
        assert_eq!(decode_signed(0x8000 | 400), -400);
        assert_eq!(decode_signed(0x7FFF), 0x7FFF);
    }

    #[test]
    fn test_signed_roundtrip() {
        for value in [-32767i16, -2048, -1, 0, 1, 1000, 32767] {
            assert_eq!(decode_signed(encode_signed(value)), value);
        }
    }

    #[test]
    fn test_fault_parsing() {
        let fault = ServoFault::from_bits(0);
        assert!(!fault.any());

        let fault = ServoFault::from_bits(1 << 2);
        assert!(fault.temperature);
        assert!(fault.any());

        let fault = ServoFault::from_bits(1 << 5 | 1 << 0);
        assert!(fault.overload);
        assert!(fault.voltage);
        assert!(!fault.sensor);
    }
}
