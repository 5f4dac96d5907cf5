//! Z-Wave Runner
//!
//! Async glue around the sans-IO [`zwave_controller::Controller`]: a
//! [`bridge::SerialBridge`] that pumps bytes between the controller and a
//! TCP-forwarded stick, and an [`events`] printer that drains the
//! controller's event channel on its own thread.

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;

pub use bridge::{BridgeExit, SerialBridge, DEFAULT_TICK};
pub use config::{load_config, ConfigOverrides};
pub use error::{RunnerError, RunnerResult};
pub use events::{format_event, spawn_event_printer, EventFormat};
