//! Events published to subscribers.

use crate::command_class::LibraryType;
use crate::transaction::TransactionId;
use crate::value::DecimalValue;
use serde::{Deserialize, Serialize};
use zwave_serial::MessageClass;

/// What a reported value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    /// Basic level (0-255).
    Basic,
    /// Binary switch state, 0 or 255.
    Switch,
    /// Multilevel switch level (0-99).
    Level,
    /// Binary sensor state.
    SensorBinary {
        /// Sensor type byte (0 for version 1 reports).
        sensor_type: u8,
    },
    /// Multilevel sensor reading.
    Sensor {
        /// Sensor type byte.
        sensor_type: u8,
        /// Scale bits from the value header.
        scale: u8,
    },
    /// Thermostat setpoint.
    Setpoint {
        /// Setpoint type code.
        setpoint_type: u8,
        /// Scale bits from the value header.
        scale: u8,
    },
    /// Battery level in percent.
    Battery,
}

/// A decoded application value keyed by node, command class and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEvent {
    /// Node that reported the value.
    pub node_id: u8,
    /// Command class key.
    pub command_class: u8,
    /// Endpoint (0 for the root device).
    pub endpoint: u8,
    /// What the value measures.
    pub kind: ValueKind,
    /// The reported value.
    pub value: DecimalValue,
}

/// An event emitted by the controller engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ZWaveEvent {
    /// A node reported an application value.
    ValueChanged(ValueEvent),

    /// A transaction completed.
    TransactionCompleted {
        id: TransactionId,
        node_id: u8,
        message_class: MessageClass,
    },

    /// A transaction ran out of retries.
    TransactionFailed {
        id: TransactionId,
        node_id: u8,
        message_class: MessageClass,
        reason: String,
    },

    /// A node information frame registered the node's command classes.
    NodeInfoReceived {
        node_id: u8,
        command_classes: Vec<u8>,
    },

    /// A node reported its library and firmware versions.
    VersionReport {
        node_id: u8,
        library_type: LibraryType,
        protocol_version: String,
        application_version: String,
    },

    /// The version of one command class on a node was negotiated.
    CommandClassVersion {
        node_id: u8,
        command_class: u8,
        version: u8,
    },

    /// The controller reported whether a node is on its failed list.
    NodeFailureStatus {
        node_id: u8,
        failed: bool,
    },
}

impl ZWaveEvent {
    /// Node the event concerns, if any.
    pub fn node_id(&self) -> u8 {
        match self {
            ZWaveEvent::ValueChanged(value) => value.node_id,
            ZWaveEvent::TransactionCompleted { node_id, .. }
            | ZWaveEvent::TransactionFailed { node_id, .. }
            | ZWaveEvent::NodeInfoReceived { node_id, .. }
            | ZWaveEvent::VersionReport { node_id, .. }
            | ZWaveEvent::CommandClassVersion { node_id, .. }
            | ZWaveEvent::NodeFailureStatus { node_id, .. } => *node_id,
        }
    }
}
