//! Command classes.
//!
//! Every command class a node can support is described by a
//! [`CommandClassKind`] (key, label, highest version this crate speaks) and
//! carries a [`CommandClass`] capability holding the class-specific state.
//! The capability builds outbound payloads from a [`CommandDescriptor`] at
//! the node's negotiated version, and interprets inbound reports.

mod basic;
mod manufacturer;
mod multi_instance;
mod sensor;
mod setpoint;
mod version;

pub use basic::{BatteryState, LevelState};
pub use manufacturer::ManufacturerInfo;
pub use multi_instance::{encapsulate, unwrap_encapsulation, MultiInstanceState, MULTI_CHANNEL_CMD_ENCAP, MULTI_INSTANCE_CMD_ENCAP};
pub use sensor::{SensorBinaryState, SensorMultilevelState};
pub use setpoint::{SetpointState, SetpointType};
pub use version::{LibraryType, NodeVersion};
pub(crate) use version::VERSION_COMMAND_CLASS_GET;

use crate::error::{ControllerError, ControllerResult};
use crate::event::ValueKind;
use crate::value::DecimalValue;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Command Class Keys
// ============================================================================

pub const COMMAND_CLASS_NO_OPERATION: u8 = 0x00;
pub const COMMAND_CLASS_BASIC: u8 = 0x20;
pub const COMMAND_CLASS_SWITCH_BINARY: u8 = 0x25;
pub const COMMAND_CLASS_SWITCH_MULTILEVEL: u8 = 0x26;
pub const COMMAND_CLASS_SENSOR_BINARY: u8 = 0x30;
pub const COMMAND_CLASS_SENSOR_MULTILEVEL: u8 = 0x31;
pub const COMMAND_CLASS_THERMOSTAT_SETPOINT: u8 = 0x43;
pub const COMMAND_CLASS_MULTI_INSTANCE: u8 = 0x60;
pub const COMMAND_CLASS_MANUFACTURER_SPECIFIC: u8 = 0x72;
pub const COMMAND_CLASS_BATTERY: u8 = 0x80;
pub const COMMAND_CLASS_VERSION: u8 = 0x86;

/// Marker in a node information frame separating supported from controlled
/// command classes.
pub const COMMAND_CLASS_MARK: u8 = 0xEF;

// ============================================================================
// Command Class Kinds
// ============================================================================

/// The command classes this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandClassKind {
    NoOperation,
    Basic,
    SwitchBinary,
    SwitchMultilevel,
    SensorBinary,
    SensorMultilevel,
    ThermostatSetpoint,
    MultiInstance,
    ManufacturerSpecific,
    Battery,
    Version,
}

/// Key, label and highest implemented version of every kind.
const COMMAND_CLASS_KINDS: &[(CommandClassKind, u8, &str, u8)] = &[
    (CommandClassKind::NoOperation, COMMAND_CLASS_NO_OPERATION, "NO_OPERATION", 1),
    (CommandClassKind::Basic, COMMAND_CLASS_BASIC, "BASIC", 1),
    (CommandClassKind::SwitchBinary, COMMAND_CLASS_SWITCH_BINARY, "SWITCH_BINARY", 1),
    (CommandClassKind::SwitchMultilevel, COMMAND_CLASS_SWITCH_MULTILEVEL, "SWITCH_MULTILEVEL", 2),
    (CommandClassKind::SensorBinary, COMMAND_CLASS_SENSOR_BINARY, "SENSOR_BINARY", 2),
    (CommandClassKind::SensorMultilevel, COMMAND_CLASS_SENSOR_MULTILEVEL, "SENSOR_MULTILEVEL", 5),
    (CommandClassKind::ThermostatSetpoint, COMMAND_CLASS_THERMOSTAT_SETPOINT, "THERMOSTAT_SETPOINT", 3),
    (CommandClassKind::MultiInstance, COMMAND_CLASS_MULTI_INSTANCE, "MULTI_INSTANCE", 2),
    (CommandClassKind::ManufacturerSpecific, COMMAND_CLASS_MANUFACTURER_SPECIFIC, "MANUFACTURER_SPECIFIC", 1),
    (CommandClassKind::Battery, COMMAND_CLASS_BATTERY, "BATTERY", 1),
    (CommandClassKind::Version, COMMAND_CLASS_VERSION, "VERSION", 1),
];

impl CommandClassKind {
    /// Look up a kind by command class key.
    pub fn from_key(key: u8) -> Option<Self> {
        COMMAND_CLASS_KINDS
            .iter()
            .find(|(_, k, _, _)| *k == key)
            .map(|(kind, _, _, _)| *kind)
    }

    /// Look up a kind by label.
    pub fn from_label(label: &str) -> Option<Self> {
        COMMAND_CLASS_KINDS
            .iter()
            .find(|(_, _, l, _)| *l == label)
            .map(|(kind, _, _, _)| *kind)
    }

    fn entry(&self) -> &'static (CommandClassKind, u8, &'static str, u8) {
        // Every variant has exactly one row.
        COMMAND_CLASS_KINDS
            .iter()
            .find(|(kind, _, _, _)| kind == self)
            .unwrap_or(&COMMAND_CLASS_KINDS[0])
    }

    /// Command class key.
    pub fn key(&self) -> u8 {
        self.entry().1
    }

    /// Label used in logs.
    pub fn label(&self) -> &'static str {
        self.entry().2
    }

    /// Highest version this crate implements for the class.
    pub fn max_version(&self) -> u8 {
        self.entry().3
    }

    /// Fresh capability with no reported state.
    pub fn capability(&self) -> CommandClass {
        match self {
            CommandClassKind::NoOperation => CommandClass::NoOperation,
            CommandClassKind::Basic => CommandClass::Basic(LevelState::default()),
            CommandClassKind::SwitchBinary => CommandClass::SwitchBinary(LevelState::default()),
            CommandClassKind::SwitchMultilevel => CommandClass::SwitchMultilevel(LevelState::default()),
            CommandClassKind::SensorBinary => CommandClass::SensorBinary(SensorBinaryState::default()),
            CommandClassKind::SensorMultilevel => CommandClass::SensorMultilevel(SensorMultilevelState::default()),
            CommandClassKind::ThermostatSetpoint => CommandClass::ThermostatSetpoint(SetpointState::default()),
            CommandClassKind::MultiInstance => CommandClass::MultiInstance(MultiInstanceState::default()),
            CommandClassKind::ManufacturerSpecific => CommandClass::ManufacturerSpecific,
            CommandClassKind::Battery => CommandClass::Battery(BatteryState::default()),
            CommandClassKind::Version => CommandClass::Version,
        }
    }
}

impl fmt::Display for CommandClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A command-class specific command to send to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDescriptor {
    /// Plain GET of the class's current value.
    Get,
    /// Plain SET of a level or on/off value.
    Set { value: u8 },
    /// Multilevel sensor GET. Type and scale are only sent from version 5.
    SensorGet { sensor_type: u8, scale: u8 },
    /// Thermostat setpoint GET.
    SetpointGet { setpoint_type: SetpointType },
    /// Thermostat setpoint SET.
    SetpointSet {
        setpoint_type: SetpointType,
        scale: u8,
        value: DecimalValue,
    },
    /// Thermostat setpoint SUPPORTED_GET.
    SetpointSupportedGet,
    /// Node library and firmware version query.
    VersionGet,
    /// Version query for one command class.
    CommandClassVersionGet { command_class: u8 },
    /// Empty frame used to check that a node is reachable.
    NoOperation,
}

impl CommandDescriptor {
    /// Whether the node answers this command with a report.
    pub fn expects_report(&self) -> bool {
        matches!(
            self,
            CommandDescriptor::Get
                | CommandDescriptor::SensorGet { .. }
                | CommandDescriptor::SetpointGet { .. }
                | CommandDescriptor::SetpointSupportedGet
                | CommandDescriptor::VersionGet
                | CommandDescriptor::CommandClassVersionGet { .. }
        )
    }

    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            CommandDescriptor::Get => "GET",
            CommandDescriptor::Set { .. } => "SET",
            CommandDescriptor::SensorGet { .. } => "SENSOR_GET",
            CommandDescriptor::SetpointGet { .. } => "SETPOINT_GET",
            CommandDescriptor::SetpointSet { .. } => "SETPOINT_SET",
            CommandDescriptor::SetpointSupportedGet => "SETPOINT_SUPPORTED_GET",
            CommandDescriptor::VersionGet => "VERSION_GET",
            CommandDescriptor::CommandClassVersionGet { .. } => "VERSION_COMMAND_CLASS_GET",
            CommandDescriptor::NoOperation => "NO_OPERATION",
        }
    }
}

/// Result of handling an inbound command class report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The report carried application values.
    Values(Vec<(ValueKind, DecimalValue)>),
    /// The node reported its library and firmware versions.
    VersionReport(NodeVersion),
    /// The node reported the version of one of its command classes.
    CommandClassVersion { key: u8, version: u8 },
    /// The node reported its manufacturer ids.
    Manufacturer(ManufacturerInfo),
    /// Nothing to publish.
    Ignored,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Per-node state and behaviour of one command class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandClass {
    NoOperation,
    Basic(LevelState),
    SwitchBinary(LevelState),
    SwitchMultilevel(LevelState),
    SensorBinary(SensorBinaryState),
    SensorMultilevel(SensorMultilevelState),
    ThermostatSetpoint(SetpointState),
    MultiInstance(MultiInstanceState),
    ManufacturerSpecific,
    Battery(BatteryState),
    Version,
}

impl CommandClass {
    /// Kind of this capability.
    pub fn kind(&self) -> CommandClassKind {
        match self {
            CommandClass::NoOperation => CommandClassKind::NoOperation,
            CommandClass::Basic(_) => CommandClassKind::Basic,
            CommandClass::SwitchBinary(_) => CommandClassKind::SwitchBinary,
            CommandClass::SwitchMultilevel(_) => CommandClassKind::SwitchMultilevel,
            CommandClass::SensorBinary(_) => CommandClassKind::SensorBinary,
            CommandClass::SensorMultilevel(_) => CommandClassKind::SensorMultilevel,
            CommandClass::ThermostatSetpoint(_) => CommandClassKind::ThermostatSetpoint,
            CommandClass::MultiInstance(_) => CommandClassKind::MultiInstance,
            CommandClass::ManufacturerSpecific => CommandClassKind::ManufacturerSpecific,
            CommandClass::Battery(_) => CommandClassKind::Battery,
            CommandClass::Version => CommandClassKind::Version,
        }
    }

    /// Build the application payload (class key first) for `command` at the
    /// given negotiated version.
    pub fn encode(&self, version: u8, command: &CommandDescriptor) -> ControllerResult<Vec<u8>> {
        let payload = match (self, command) {
            (CommandClass::NoOperation, CommandDescriptor::NoOperation) => Some(vec![COMMAND_CLASS_NO_OPERATION]),
            (CommandClass::Basic(_), _) => basic::encode_basic(COMMAND_CLASS_BASIC, command),
            (CommandClass::SwitchBinary(_), _) => basic::encode_basic(COMMAND_CLASS_SWITCH_BINARY, command),
            (CommandClass::SwitchMultilevel(_), _) => basic::encode_multilevel(version, command),
            (CommandClass::SensorBinary(_), _) => sensor::encode_binary(command),
            (CommandClass::SensorMultilevel(_), _) => sensor::encode_multilevel(version, command),
            (CommandClass::ThermostatSetpoint(_), _) => setpoint::encode(version, command)?,
            (CommandClass::MultiInstance(_), _) => multi_instance::encode(version, command),
            (CommandClass::ManufacturerSpecific, CommandDescriptor::Get) => {
                Some(vec![COMMAND_CLASS_MANUFACTURER_SPECIFIC, manufacturer::MANUFACTURER_SPECIFIC_GET])
            }
            (CommandClass::Battery(_), CommandDescriptor::Get) => {
                Some(vec![COMMAND_CLASS_BATTERY, basic::BATTERY_GET])
            }
            (CommandClass::Version, _) => version::encode(command),
            _ => None,
        };

        payload.ok_or_else(|| ControllerError::UnsupportedCommand {
            command_class: self.kind().label(),
            command: command.name().to_string(),
            version,
        })
    }

    /// Interpret an inbound command for this class.
    ///
    /// `data` starts with the command byte (the class key is already
    /// stripped).
    pub fn handle(&mut self, data: &[u8]) -> ControllerResult<Handled> {
        let Some((&command, rest)) = data.split_first() else {
            return Err(ControllerError::too_short(self.kind().label(), 1, 0));
        };

        match self {
            CommandClass::NoOperation => Ok(Handled::Ignored),
            CommandClass::Basic(state) => state.handle_report(ValueKind::Basic, command, rest),
            CommandClass::SwitchBinary(state) => state.handle_report(ValueKind::Switch, command, rest),
            CommandClass::SwitchMultilevel(state) => state.handle_report(ValueKind::Level, command, rest),
            CommandClass::SensorBinary(state) => state.handle(command, rest),
            CommandClass::SensorMultilevel(state) => state.handle(command, rest),
            CommandClass::ThermostatSetpoint(state) => state.handle(command, rest),
            CommandClass::MultiInstance(state) => state.handle(command, rest),
            CommandClass::ManufacturerSpecific => manufacturer::handle(command, rest),
            CommandClass::Battery(state) => state.handle(command, rest),
            CommandClass::Version => version::handle(command, rest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_one_row() {
        let kinds = [
            CommandClassKind::NoOperation,
            CommandClassKind::Basic,
            CommandClassKind::SwitchBinary,
            CommandClassKind::SwitchMultilevel,
            CommandClassKind::SensorBinary,
            CommandClassKind::SensorMultilevel,
            CommandClassKind::ThermostatSetpoint,
            CommandClassKind::MultiInstance,
            CommandClassKind::ManufacturerSpecific,
            CommandClassKind::Battery,
            CommandClassKind::Version,
        ];
        assert_eq!(kinds.len(), COMMAND_CLASS_KINDS.len());
        for kind in kinds {
            let rows = COMMAND_CLASS_KINDS.iter().filter(|(k, _, _, _)| *k == kind).count();
            assert_eq!(rows, 1, "{:?}", kind);
            assert_eq!(CommandClassKind::from_key(kind.key()), Some(kind));
            assert_eq!(CommandClassKind::from_label(kind.label()), Some(kind));
            assert_eq!(kind.capability().kind(), kind);
        }
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(CommandClassKind::from_key(0x84), None);
        assert_eq!(CommandClassKind::from_label("WAKE_UP"), None);
    }

    #[test]
    fn test_max_versions() {
        assert_eq!(CommandClassKind::ThermostatSetpoint.max_version(), 3);
        assert_eq!(CommandClassKind::SensorMultilevel.max_version(), 5);
        assert_eq!(CommandClassKind::Basic.max_version(), 1);
    }

    #[test]
    fn test_unsupported_command_is_rejected() {
        let err = CommandClass::Battery(BatteryState::default())
            .encode(1, &CommandDescriptor::Set { value: 10 })
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnsupportedCommand { command_class: "BATTERY", .. }));
    }

    #[test]
    fn test_empty_report_is_malformed() {
        let mut cc = CommandClassKind::Basic.capability();
        assert!(matches!(cc.handle(&[]), Err(ControllerError::MalformedPayload(_))));
    }

    #[test]
    fn test_expects_report() {
        assert!(CommandDescriptor::Get.expects_report());
        assert!(CommandDescriptor::VersionGet.expects_report());
        assert!(!CommandDescriptor::Set { value: 0 }.expects_report());
        assert!(!CommandDescriptor::NoOperation.expects_report());
    }
}
