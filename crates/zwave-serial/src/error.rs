//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when decoding a frame.
///
/// All of these are link-level problems: the link layer answers them with a
/// NAK and resynchronises on the next start-of-frame byte.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The first byte is not the start-of-frame marker.
    #[error("missing start of frame: got 0x{0:02X}")]
    MissingStartOfFrame(u8),

    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// The length byte does not match the number of bytes received.
    #[error("length mismatch: length byte declares {declared} bytes, frame carries {actual}")]
    LengthMismatch {
        /// Bytes declared by the length field.
        declared: usize,
        /// Bytes actually present after the length field.
        actual: usize,
    },

    /// The checksum byte does not match the computed checksum.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum carried by the frame.
        actual: u8,
    },

    /// The message type byte is neither request nor response.
    #[error("invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),
}
