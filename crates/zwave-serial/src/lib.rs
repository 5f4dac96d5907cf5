//! Z-Wave Serial API
//!
//! This crate provides the wire-level pieces needed to talk to a Z-Wave
//! controller module ("stick") over a UART: frame encoding/decoding, the
//! message class table, and a byte-stream link layer that assembles frames
//! and produces the ACK/NAK control replies the stick expects.
//!
//! # Protocol Overview
//!
//! Every data frame has the layout:
//!
//! ```text
//! +-----+-----+------+-------+-------------+----------+
//! | SOF | LEN | TYPE | CLASS | PAYLOAD ... | CHECKSUM |
//! +-----+-----+------+-------+-------------+----------+
//! ```
//!
//! - **SOF**: start-of-frame marker (`0x01`)
//! - **LEN**: number of bytes following LEN, checksum included
//! - **TYPE**: `0x00` request, `0x01` response
//! - **CLASS**: serial API function id (see [`MessageClass`])
//! - **CHECKSUM**: `0xFF` XOR every byte from LEN to the last payload byte
//!
//! Outside of frames, the single bytes ACK (`0x06`), NAK (`0x15`) and CAN
//! (`0x18`) acknowledge, reject, or signal a collision.
//!
//! # Example
//!
//! ```rust
//! use zwave_serial::{Frame, MessageClass, MessageType};
//!
//! let frame = Frame::new(MessageType::Request, MessageClass::GetVersion, vec![]);
//! let bytes = frame.encode();
//! assert_eq!(bytes, vec![0x01, 0x03, 0x00, 0x15, 0xE9]);
//!
//! let decoded = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded.message_class, MessageClass::GetVersion);
//! ```

mod constants;
mod error;
mod frame;
mod link;
mod message;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use link::*;
pub use message::*;
