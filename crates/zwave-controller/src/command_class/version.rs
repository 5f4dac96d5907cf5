//! Version command class.
//!
//! Two queries are supported:
//!
//! - `VERSION_GET` asks a node for its library type and its protocol and
//!   application versions.
//! - `VERSION_COMMAND_CLASS_GET` asks for the version a node implements of
//!   one command class. The answer drives version negotiation.

use super::{CommandDescriptor, Handled, COMMAND_CLASS_VERSION};
use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VERSION_GET: u8 = 0x11;
pub const VERSION_REPORT: u8 = 0x12;
pub const VERSION_COMMAND_CLASS_GET: u8 = 0x13;
pub const VERSION_COMMAND_CLASS_REPORT: u8 = 0x14;

/// Z-Wave library a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryType {
    Unknown,
    StaticController,
    Controller,
    EnhancedSlave,
    Slave,
    Installer,
    RoutingSlave,
    BridgeController,
    DeviceUnderTest,
}

/// Library type codes and labels.
///
/// Installer and routing slave share code 5; lookups by code return the row
/// that comes first.
const LIBRARY_TYPES: &[(LibraryType, u8, &str)] = &[
    (LibraryType::Unknown, 0, "Unknown"),
    (LibraryType::StaticController, 1, "Static Controller"),
    (LibraryType::Controller, 2, "Controller"),
    (LibraryType::EnhancedSlave, 3, "Slave Enhanced"),
    (LibraryType::Slave, 4, "Slave"),
    (LibraryType::Installer, 5, "Installer"),
    (LibraryType::RoutingSlave, 5, "Slave Routing"),
    (LibraryType::BridgeController, 6, "Bridge Controller"),
    (LibraryType::DeviceUnderTest, 7, "Device Under Test"),
];

impl LibraryType {
    /// Look up a library type by code. Unknown codes map to
    /// [`LibraryType::Unknown`].
    pub fn from_code(code: u8) -> Self {
        LIBRARY_TYPES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(LibraryType::Unknown)
    }

    pub fn code(&self) -> u8 {
        LIBRARY_TYPES
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, c, _)| *c)
            .unwrap_or(0)
    }

    pub fn label(&self) -> &'static str {
        LIBRARY_TYPES
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, _, l)| *l)
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Library and firmware versions reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    pub library_type: LibraryType,
    /// Protocol version as `major.minor`.
    pub protocol_version: String,
    /// Application version as `major.minor`.
    pub application_version: String,
}

pub(crate) fn encode(command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::VersionGet => Some(vec![COMMAND_CLASS_VERSION, VERSION_GET]),
        CommandDescriptor::CommandClassVersionGet { command_class } => {
            Some(vec![COMMAND_CLASS_VERSION, VERSION_COMMAND_CLASS_GET, *command_class])
        }
        _ => None,
    }
}

pub(crate) fn handle(command: u8, data: &[u8]) -> ControllerResult<Handled> {
    match command {
        VERSION_REPORT => {
            if data.len() < 5 {
                return Err(ControllerError::too_short("VERSION_REPORT", 5, data.len()));
            }
            Ok(Handled::VersionReport(NodeVersion {
                library_type: LibraryType::from_code(data[0]),
                protocol_version: format!("{}.{}", data[1], data[2]),
                application_version: format!("{}.{}", data[3], data[4]),
            }))
        }
        VERSION_COMMAND_CLASS_REPORT => {
            if data.len() < 2 {
                return Err(ControllerError::too_short("VERSION_COMMAND_CLASS_REPORT", 2, data.len()));
            }
            Ok(Handled::CommandClassVersion { key: data[0], version: data[1] })
        }
        other => {
            tracing::debug!("Ignoring VERSION command 0x{:02X}", other);
            Ok(Handled::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_library_code_first_wins() {
        assert_eq!(LibraryType::from_code(5), LibraryType::Installer);
        assert_eq!(LibraryType::RoutingSlave.code(), 5);
        assert_eq!(LibraryType::from_code(0x42), LibraryType::Unknown);
    }

    #[test]
    fn test_version_report() {
        let handled = handle(VERSION_REPORT, &[0x02, 0x04, 0x05, 0x01, 0x02]).expect("should handle");
        assert_eq!(
            handled,
            Handled::VersionReport(NodeVersion {
                library_type: LibraryType::Controller,
                protocol_version: "4.5".to_string(),
                application_version: "1.2".to_string(),
            })
        );
    }

    #[test]
    fn test_command_class_version_get() {
        let get = CommandDescriptor::CommandClassVersionGet { command_class: 0x43 };
        assert_eq!(encode(&get), Some(vec![0x86, 0x13, 0x43]));
        assert_eq!(encode(&CommandDescriptor::VersionGet), Some(vec![0x86, 0x11]));
    }

    #[test]
    fn test_short_reports_are_malformed() {
        assert!(handle(VERSION_REPORT, &[0x02, 0x04]).is_err());
        assert!(handle(VERSION_COMMAND_CLASS_REPORT, &[0x43]).is_err());
    }
}
