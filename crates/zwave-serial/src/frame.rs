//! Frame encoding/decoding.
//!
//! ```text
//! +-----+-----+------+-------+-------------+----------+
//! | SOF | LEN | TYPE | CLASS | PAYLOAD ... | CHECKSUM |
//! +-----+-----+------+-------+-------------+----------+
//! ```
//!
//! LEN counts TYPE, CLASS, PAYLOAD and CHECKSUM. The checksum is `0xFF`
//! XOR every byte from LEN up to the last payload byte.

use crate::constants::*;
use crate::error::FrameError;
use crate::message::{MessageClass, MessageType};

/// One complete data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request or response.
    pub message_type: MessageType,
    /// Serial API function id.
    pub message_class: MessageClass,
    /// Function specific payload.
    pub payload: Vec<u8>,
    /// Checksum over length, type, class and payload.
    pub checksum: u8,
}

impl Frame {
    /// Build a frame, computing its checksum.
    ///
    /// The payload must not exceed [`MAX_PAYLOAD_SIZE`] bytes.
    pub fn new(message_type: MessageType, message_class: MessageClass, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE, "payload exceeds frame capacity");
        let length = length_byte(payload.len());
        let checksum = checksum(
            [length, message_type.code(), message_class.code()]
                .iter()
                .chain(payload.iter()),
        );
        Frame {
            message_type,
            message_class,
            payload,
            checksum,
        }
    }

    /// Value of the length byte for this frame.
    pub fn length(&self) -> u8 {
        length_byte(self.payload.len())
    }

    /// Encode the frame to wire bytes, start-of-frame marker included.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_FRAME_SIZE + self.payload.len());
        buf.push(SOF);
        buf.push(self.length());
        buf.push(self.message_type.code());
        buf.push(self.message_class.code());
        buf.extend_from_slice(&self.payload);
        buf.push(self.checksum);
        buf
    }

    /// Decode and validate a complete frame.
    ///
    /// `raw` must hold exactly one frame, starting with the start-of-frame
    /// marker. The checksum is validated before the type byte is looked at.
    pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
        if raw.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                expected: MIN_FRAME_SIZE,
                actual: raw.len(),
            });
        }
        if raw[0] != SOF {
            return Err(FrameError::MissingStartOfFrame(raw[0]));
        }

        let declared = raw[1] as usize;
        let actual = raw.len() - FRAME_OVERHEAD;
        if declared != actual {
            return Err(FrameError::LengthMismatch { declared, actual });
        }

        let last = raw.len() - 1;
        let expected = checksum(raw[1..last].iter());
        if expected != raw[last] {
            return Err(FrameError::ChecksumMismatch {
                expected,
                actual: raw[last],
            });
        }

        let message_type = MessageType::from_code(raw[2]).ok_or(FrameError::InvalidMessageType(raw[2]))?;
        let message_class = MessageClass::from_code(raw[3]);

        Ok(Frame {
            message_type,
            message_class,
            payload: raw[4..last].to_vec(),
            checksum: raw[last],
        })
    }
}

fn length_byte(payload_len: usize) -> u8 {
    (payload_len + MIN_LENGTH_BYTE as usize) as u8
}

/// Compute the frame checksum over the given bytes.
pub fn checksum<'a>(bytes: impl IntoIterator<Item = &'a u8>) -> u8 {
    bytes.into_iter().fold(0xFF, |acc, b| acc ^ b)
}
