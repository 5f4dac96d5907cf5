//! Error types for the controller engine.

use crate::transaction::TransactionId;
use thiserror::Error;
use zwave_serial::{FrameError, MessageClass};

/// Errors that can occur while driving the serial link.
///
/// None of these stop the engine: the receive path logs them and carries on
/// with the next frame.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A frame failed link-level validation.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No processor is registered for the message class.
    #[error("no processor registered for message class {0}")]
    UnhandledMessageClass(MessageClass),

    /// The node does not have the command class.
    #[error("node {node_id} does not support command class 0x{key:02X}")]
    UnsupportedCommandClass {
        /// Node id.
        node_id: u8,
        /// Command class key.
        key: u8,
    },

    /// The command class key is not known to this implementation.
    #[error("unknown command class 0x{0:02X}")]
    UnknownCommandClass(u8),

    /// A transaction ran out of retries.
    #[error("transaction {id} timed out after {retries} retries")]
    TransactionTimeout {
        /// Transaction id.
        id: TransactionId,
        /// Retransmissions performed before giving up.
        retries: u32,
    },

    /// The node id is not in the node registry.
    #[error("unknown node {0}")]
    UnknownNode(u8),

    /// The command cannot be expressed by the command class at its
    /// negotiated version.
    #[error("{command} is not supported by {command_class} version {version}")]
    UnsupportedCommand {
        /// Command class label.
        command_class: &'static str,
        /// Description of the rejected command.
        command: String,
        /// Negotiated version of the command class.
        version: u8,
    },

    /// A payload was shorter than its layout requires or carried an
    /// impossible value.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Create a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        ControllerError::MalformedPayload(message.into())
    }

    /// Error for a payload shorter than `expected` bytes.
    pub fn too_short(what: &str, expected: usize, actual: usize) -> Self {
        ControllerError::MalformedPayload(format!(
            "{} too short: expected at least {} bytes, got {}",
            what, expected, actual
        ))
    }
}

/// Result type alias for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ControllerError::too_short("VERSION_REPORT", 6, 2);
        assert!(err.to_string().contains("expected at least 6 bytes"));

        let err = ControllerError::UnsupportedCommandClass { node_id: 5, key: 0x43 };
        assert_eq!(err.to_string(), "node 5 does not support command class 0x43");

        let err = ControllerError::from(FrameError::InvalidMessageType(7));
        assert!(err.to_string().starts_with("frame error"));
    }
}
