//! Frame encoding and decoding for the SCS/STS servo bus.
//!
//! Instruction frames flow controller → servo, status frames flow back.
//! Both share the layout:
//! - HEADER (2 bytes): 0xFF 0xFF synchronization
//! - ID (1 byte): bus address, 0xFE broadcasts
//! - LENGTH (1 byte): params + 2 (instruction/error byte and checksum)
//! - INSTR or ERROR (1 byte)
//! - PARAMS (0-64 bytes)
//! - CHECKSUM (1 byte): complement of the sum of ID..last param

use heapless::Vec;

/// Frame synchronization byte, sent twice
pub const FRAME_HEADER: u8 = 0xFF;

/// Broadcast bus address (no status frame is returned)
pub const BROADCAST_ID: u8 = 0xFE;

/// Maximum parameter bytes per frame
///
/// The largest exchange this driver performs is the 38-byte telemetry
/// block read; 64 leaves headroom without wasting buffer space.
pub const MAX_PARAMS: usize = 64;

/// Maximum complete frame size (HEADER×2 + ID + LENGTH + INSTR + params + CHECKSUM)
pub const MAX_FRAME_SIZE: usize = 2 + 1 + 1 + 1 + MAX_PARAMS + 1;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Parameters exceed maximum allowed size
    TooManyParams,
    /// Checksum mismatch
    InvalidChecksum,
    /// Declared length outside the valid range
    InvalidLength,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Compute the bus checksum over ID, LENGTH, INSTR/ERROR, and params
pub fn checksum(id: u8, length: u8, instr: u8, params: &[u8]) -> u8 {
    let mut sum = id
        .wrapping_add(length)
        .wrapping_add(instr);
    for &byte in params {
        sum = sum.wrapping_add(byte);
    }
    !sum
}

/// An instruction frame addressed to a servo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionFrame {
    /// Target bus address
    pub id: u8,
    /// Instruction code (see [`crate::registers::instruction`])
    pub instruction: u8,
    /// Instruction parameters
    pub params: Vec<u8, MAX_PARAMS>,
}

impl InstructionFrame {
    /// Create a new instruction frame with the given parameters
    pub fn new(id: u8, instruction: u8, params: &[u8]) -> Result<Self, FrameError> {
        let mut param_vec = Vec::new();
        param_vec
            .extend_from_slice(params)
            .map_err(|_| FrameError::TooManyParams)?;

        Ok(Self {
            id,
            instruction,
            params: param_vec,
        })
    }

    /// Create a frame with no parameters (PING, ACTION)
    pub fn empty(id: u8, instruction: u8) -> Self {
        Self {
            id,
            instruction,
            params: Vec::new(),
        }
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = 6 + self.params.len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = (self.params.len() + 2) as u8;

        buffer[0] = FRAME_HEADER;
        buffer[1] = FRAME_HEADER;
        buffer[2] = self.id;
        buffer[3] = length;
        buffer[4] = self.instruction;
        buffer[5..5 + self.params.len()].copy_from_slice(&self.params);
        buffer[5 + self.params.len()] = checksum(self.id, length, self.instruction, &self.params);

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// A status frame returned by a servo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFrame {
    /// Responding bus address
    pub id: u8,
    /// Raw fault flags (see [`crate::registers::ServoFault`])
    pub error: u8,
    /// Returned parameters (register contents for READ)
    pub params: Vec<u8, MAX_PARAMS>,
}

/// State machine for parsing incoming status frames
///
/// Fed one byte at a time; resynchronizes on the double-0xFF header, so
/// line noise between frames is silently skipped.
#[derive(Debug, Clone)]
pub struct StatusParser {
    state: ParseState,
    buffer: Vec<u8, MAX_PARAMS>,
    expected_params: u8,
    id: u8,
    length: u8,
    error: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for first header byte
    WaitingForHeader1,
    /// Got one 0xFF, waiting for the second
    WaitingForHeader2,
    /// Waiting for the responder ID
    WaitingForId,
    /// Waiting for LENGTH
    WaitingForLength,
    /// Waiting for the error/status byte
    WaitingForError,
    /// Reading parameter bytes
    ReadingParams,
    /// Waiting for CHECKSUM
    WaitingForChecksum,
}

impl Default for StatusParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusParser {
    /// Create a new status parser
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForHeader1,
            buffer: Vec::new(),
            expected_params: 0,
            id: 0,
            length: 0,
            error: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForHeader1;
        self.buffer.clear();
        self.expected_params = 0;
        self.id = 0;
        self.length = 0;
        self.error = 0;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<StatusFrame>, FrameError> {
        match self.state {
            ParseState::WaitingForHeader1 => {
                if byte == FRAME_HEADER {
                    self.state = ParseState::WaitingForHeader2;
                }
                // Silently ignore non-header bytes while waiting
                Ok(None)
            }
            ParseState::WaitingForHeader2 => {
                if byte == FRAME_HEADER {
                    self.state = ParseState::WaitingForId;
                } else {
                    self.state = ParseState::WaitingForHeader1;
                }
                Ok(None)
            }
            ParseState::WaitingForId => {
                // A third 0xFF is still header noise, not an ID
                if byte == FRAME_HEADER {
                    return Ok(None);
                }
                self.id = byte;
                self.state = ParseState::WaitingForLength;
                Ok(None)
            }
            ParseState::WaitingForLength => {
                if byte < 2 || (byte as usize - 2) > MAX_PARAMS {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.length = byte;
                self.expected_params = byte - 2;
                self.state = ParseState::WaitingForError;
                Ok(None)
            }
            ParseState::WaitingForError => {
                self.error = byte;
                if self.expected_params == 0 {
                    self.state = ParseState::WaitingForChecksum;
                } else {
                    self.buffer.clear();
                    self.state = ParseState::ReadingParams;
                }
                Ok(None)
            }
            ParseState::ReadingParams => {
                // Cannot overflow: expected_params is bounded by MAX_PARAMS
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_params as usize {
                    self.state = ParseState::WaitingForChecksum;
                }
                Ok(None)
            }
            ParseState::WaitingForChecksum => {
                let expected = checksum(self.id, self.length, self.error, &self.buffer);

                if byte != expected {
                    self.reset();
                    return Err(FrameError::InvalidChecksum);
                }

                let frame = StatusFrame {
                    id: self.id,
                    error: self.error,
                    params: self.buffer.clone(),
                };

                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<StatusFrame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::instruction;

    fn encode_status(id: u8, error: u8, params: &[u8]) -> Vec<u8, MAX_FRAME_SIZE> {
        let length = (params.len() + 2) as u8;
        let mut out = Vec::new();
        out.extend_from_slice(&[FRAME_HEADER, FRAME_HEADER, id, length, error])
            .unwrap();
        out.extend_from_slice(params).unwrap();
        out.push(checksum(id, length, error, params)).unwrap();
        out
    }

    #[test]
    fn test_encode_ping() {
        let frame = InstructionFrame::empty(1, instruction::PING);
        let mut buffer = [0u8; 8];
        let len = frame.encode(&mut buffer).unwrap();

        assert_eq!(len, 6);
        assert_eq!(buffer[..6], [0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
    }

    #[test]
    fn test_encode_read() {
        // READ position register (0x38), 2 bytes
        let frame = InstructionFrame::new(1, instruction::READ, &[0x38, 0x02]).unwrap();
        let encoded = frame.encode_to_vec().unwrap();

        assert_eq!(encoded[0], FRAME_HEADER);
        assert_eq!(encoded[1], FRAME_HEADER);
        assert_eq!(encoded[2], 1); // id
        assert_eq!(encoded[3], 4); // length = 2 params + 2
        assert_eq!(encoded[4], instruction::READ);
        assert_eq!(encoded[5], 0x38);
        assert_eq!(encoded[6], 0x02);
        assert_eq!(encoded[7], checksum(1, 4, instruction::READ, &[0x38, 0x02]));
    }

    #[test]
    fn test_checksum_complement() {
        // Checksum plus the summed bytes must be 0xFF
        let params = [0x2A, 0x00, 0x08];
        let cs = checksum(3, 5, instruction::WRITE, &params);
        let sum: u8 = [3u8, 5, instruction::WRITE]
            .iter()
            .chain(params.iter())
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(cs.wrapping_add(sum), 0xFF);
    }

    #[test]
    fn test_parse_ack() {
        let encoded = encode_status(1, 0, &[]);
        let mut parser = StatusParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();

        assert_eq!(frame.id, 1);
        assert_eq!(frame.error, 0);
        assert!(frame.params.is_empty());
    }

    #[test]
    fn test_parse_read_reply() {
        let encoded = encode_status(2, 0, &[0x34, 0x12]);
        let mut parser = StatusParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();

        assert_eq!(frame.id, 2);
        assert_eq!(&frame.params[..], &[0x34, 0x12]);
    }

    #[test]
    fn test_parser_invalid_checksum() {
        let mut encoded = encode_status(1, 0, &[0x10]);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        let mut parser = StatusParser::new();
        assert_eq!(
            parser.feed_bytes(&encoded),
            Err(FrameError::InvalidChecksum)
        );
    }

    #[test]
    fn test_parser_resync_after_garbage() {
        let encoded = encode_status(1, 0, &[0x07]);

        let mut data = Vec::<u8, 32>::new();
        data.extend_from_slice(&[0x00, 0x12, 0xFF, 0x03]).unwrap();
        data.extend_from_slice(&encoded).unwrap();

        let mut parser = StatusParser::new();
        let frame = parser.feed_bytes(&data).unwrap().unwrap();
        assert_eq!(frame.id, 1);
        assert_eq!(&frame.params[..], &[0x07]);
    }

    #[test]
    fn test_parser_triple_header_byte() {
        // 0xFF 0xFF 0xFF <id> must still parse: the third 0xFF is header noise
        let mut data = Vec::<u8, 32>::new();
        data.push(FRAME_HEADER).unwrap();
        data.extend_from_slice(&encode_status(5, 0, &[])).unwrap();

        let mut parser = StatusParser::new();
        let frame = parser.feed_bytes(&data).unwrap().unwrap();
        assert_eq!(frame.id, 5);
    }

    #[test]
    fn test_parser_invalid_length() {
        // LENGTH below 2 is not a valid status frame
        let data = [FRAME_HEADER, FRAME_HEADER, 1, 1];
        let mut parser = StatusParser::new();
        assert_eq!(parser.feed_bytes(&data), Err(FrameError::InvalidLength));
    }

    #[test]
    fn test_parser_recovers_after_error() {
        let mut bad = encode_status(1, 0, &[0x10]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = encode_status(1, 0, &[0x20]);

        let mut parser = StatusParser::new();
        assert!(parser.feed_bytes(&bad).is_err());
        let frame = parser.feed_bytes(&good).unwrap().unwrap();
        assert_eq!(&frame.params[..], &[0x20]);
    }

    #[test]
    fn test_error_byte_carried() {
        // Error byte 0x20 = overload fault
        let encoded = encode_status(1, 0x20, &[]);
        let mut parser = StatusParser::new();
        let frame = parser.feed_bytes(&encoded).unwrap().unwrap();
        assert_eq!(frame.error, 0x20);
    }

    #[test]
    fn test_too_many_params() {
        let params = [0u8; MAX_PARAMS + 1];
        assert_eq!(
            InstructionFrame::new(1, instruction::WRITE, &params),
            Err(FrameError::TooManyParams)
        );
    }
}
