//! Z-Wave Controller Engine
//!
//! This crate drives a Z-Wave stick over the serial API described in
//! [`zwave_serial`]. It correlates outbound requests with the stick's
//! responses and callbacks, interprets inbound frames with a static table of
//! message processors, keeps a per-node model of supported command classes,
//! and negotiates the version of every command class a node supports.
//!
//! # Architecture
//!
//! ```text
//!  bytes in ──► LinkLayer ──► Frame ──► processor_for(class)
//!                  │                          │
//!                  │ ACK/NAK/CAN              ├─► NodeRegistry (command classes)
//!                  ▼                          ├─► ZWaveEvent ──► subscribers
//!          TransactionManager ◄── complete? ──┘
//!                  │
//!  bytes out ◄─────┘ (one transaction in flight, FIFO queue behind it)
//! ```
//!
//! The [`Controller`] is sans-IO: callers feed it received bytes together
//! with the current time, call [`Controller::poll`] periodically for
//! timeouts, and write whatever [`Controller::take_outbound`] returns to the
//! transport.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use zwave_controller::{Controller, ControllerConfig};
//!
//! let mut controller = Controller::new(ControllerConfig::default());
//! controller.initialize();
//! controller.poll(Instant::now());
//!
//! // GetVersion is the first request of the initialisation sequence.
//! assert_eq!(controller.take_outbound(), vec![0x01, 0x03, 0x00, 0x15, 0xE9]);
//! ```

pub mod command_class;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod node;
pub mod processor;
pub mod telemetry;
pub mod transaction;
pub mod value;

pub use command_class::{CommandClass, CommandClassKind, CommandDescriptor, LibraryType, SetpointType};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerInfo, EncodeRequest};
pub use error::{ControllerError, ControllerResult};
pub use event::{ValueEvent, ValueKind, ZWaveEvent};
pub use node::{CommandClassSnapshot, NegotiationState, Node, NodeRegistry, NodeSnapshot};
pub use processor::{processor_for, MessageProcessor};
pub use transaction::{Transaction, TransactionId, TransactionManager};
pub use value::DecimalValue;
