//! Thermostat setpoint command class.
//!
//! ```text
//! SET:    0x43 0x01 <type> <precision|scale|size> <value..>
//! GET:    0x43 0x02 <type>
//! REPORT: 0x43 0x03 <type> <precision|scale|size> <value..>
//! ```
//!
//! Setpoint types were added over several versions of the class, so a type
//! is only encoded when the node's negotiated version knows it.

use super::{CommandDescriptor, Handled, COMMAND_CLASS_THERMOSTAT_SETPOINT};
use crate::error::{ControllerError, ControllerResult};
use crate::event::ValueKind;
use crate::value::DecimalValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const THERMOSTAT_SETPOINT_SET: u8 = 0x01;
pub const THERMOSTAT_SETPOINT_GET: u8 = 0x02;
pub const THERMOSTAT_SETPOINT_REPORT: u8 = 0x03;
pub const THERMOSTAT_SETPOINT_SUPPORTED_GET: u8 = 0x04;
pub const THERMOSTAT_SETPOINT_SUPPORTED_REPORT: u8 = 0x05;

const SETPOINT_TYPE_MASK: u8 = 0x0F;

/// Thermostat setpoint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetpointType {
    Heating,
    Cooling,
    Furnace,
    DryAir,
    MoistAir,
    AutoChangeover,
    EnergySaveHeating,
    EnergySaveCooling,
    AwayHeating,
}

/// Code, label and first class version that knows the type.
const SETPOINT_TYPES: &[(SetpointType, u8, &str, u8)] = &[
    (SetpointType::Heating, 1, "HEATING", 1),
    (SetpointType::Cooling, 2, "COOLING", 1),
    (SetpointType::Furnace, 7, "FURNACE", 1),
    (SetpointType::DryAir, 8, "DRY_AIR", 1),
    (SetpointType::MoistAir, 9, "MOIST_AIR", 1),
    (SetpointType::AutoChangeover, 10, "AUTO_CHANGEOVER", 1),
    (SetpointType::EnergySaveHeating, 11, "ENERGY_SAVE_HEATING", 2),
    (SetpointType::EnergySaveCooling, 12, "ENERGY_SAVE_COOLING", 2),
    (SetpointType::AwayHeating, 13, "AWAY_HEATING", 3),
];

impl SetpointType {
    /// Look up a type by its wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        SETPOINT_TYPES
            .iter()
            .find(|(_, c, _, _)| *c == code)
            .map(|(t, _, _, _)| *t)
    }

    /// Look up a type by label.
    pub fn from_label(label: &str) -> Option<Self> {
        SETPOINT_TYPES
            .iter()
            .find(|(_, _, l, _)| *l == label)
            .map(|(t, _, _, _)| *t)
    }

    fn entry(&self) -> &'static (SetpointType, u8, &'static str, u8) {
        SETPOINT_TYPES
            .iter()
            .find(|(t, _, _, _)| t == self)
            .unwrap_or(&SETPOINT_TYPES[0])
    }

    pub fn code(&self) -> u8 {
        self.entry().1
    }

    pub fn label(&self) -> &'static str {
        self.entry().2
    }

    /// First version of the command class that defines this type.
    pub fn min_version(&self) -> u8 {
        self.entry().3
    }
}

impl fmt::Display for SetpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Setpoints reported by a thermostat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetpointState {
    /// Scale and value per setpoint type code.
    pub values: BTreeMap<u8, (u8, DecimalValue)>,
    /// Types listed in the last supported report.
    pub supported: Vec<SetpointType>,
}

impl SetpointState {
    pub(crate) fn handle(&mut self, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        match command {
            THERMOSTAT_SETPOINT_REPORT => {
                let (&type_byte, rest) = data
                    .split_first()
                    .ok_or_else(|| ControllerError::too_short("THERMOSTAT_SETPOINT_REPORT", 3, data.len()))?;
                let setpoint_type = type_byte & SETPOINT_TYPE_MASK;
                let (value, scale, _) = DecimalValue::decode(rest)?;
                self.values.insert(setpoint_type, (scale, value));
                Ok(Handled::Values(vec![(ValueKind::Setpoint { setpoint_type, scale }, value)]))
            }
            THERMOSTAT_SETPOINT_SUPPORTED_REPORT => {
                self.supported = data
                    .iter()
                    .enumerate()
                    .flat_map(|(byte_index, &mask)| {
                        (0..8u8)
                            .filter(move |bit| mask & (1 << bit) != 0)
                            .map(move |bit| byte_index as u8 * 8 + bit)
                    })
                    .filter_map(SetpointType::from_code)
                    .collect();
                tracing::debug!("Supported setpoint types: {:?}", self.supported);
                Ok(Handled::Ignored)
            }
            _ => Ok(Handled::Ignored),
        }
    }
}

pub(crate) fn encode(version: u8, command: &CommandDescriptor) -> ControllerResult<Option<Vec<u8>>> {
    let check = |setpoint_type: &SetpointType| {
        if setpoint_type.min_version() > version {
            return Err(ControllerError::UnsupportedCommand {
                command_class: "THERMOSTAT_SETPOINT",
                command: format!("{} {}", command.name(), setpoint_type),
                version,
            });
        }
        Ok(())
    };

    let payload = match command {
        CommandDescriptor::SetpointGet { setpoint_type } => {
            check(setpoint_type)?;
            Some(vec![COMMAND_CLASS_THERMOSTAT_SETPOINT, THERMOSTAT_SETPOINT_GET, setpoint_type.code()])
        }
        CommandDescriptor::SetpointSet { setpoint_type, scale, value } => {
            check(setpoint_type)?;
            let mut payload = vec![COMMAND_CLASS_THERMOSTAT_SETPOINT, THERMOSTAT_SETPOINT_SET, setpoint_type.code()];
            payload.extend_from_slice(&value.encode(*scale));
            Some(payload)
        }
        CommandDescriptor::SetpointSupportedGet => {
            Some(vec![COMMAND_CLASS_THERMOSTAT_SETPOINT, THERMOSTAT_SETPOINT_SUPPORTED_GET])
        }
        _ => None,
    };
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setpoint_set_payload() {
        let command = CommandDescriptor::SetpointSet {
            setpoint_type: SetpointType::Heating,
            scale: 0,
            value: DecimalValue::new(215, 1),
        };
        let payload = encode(1, &command).expect("should encode").expect("should have payload");
        assert_eq!(payload, vec![0x43, 0x01, 0x01, 0x22, 0x00, 0xD7]);
    }

    #[test]
    fn test_type_gated_by_version() {
        let get = CommandDescriptor::SetpointGet { setpoint_type: SetpointType::AwayHeating };
        assert!(matches!(encode(2, &get), Err(ControllerError::UnsupportedCommand { version: 2, .. })));
        assert_eq!(
            encode(3, &get).expect("should encode"),
            Some(vec![0x43, 0x02, 0x0D])
        );
    }

    #[test]
    fn test_report_updates_state() {
        let mut state = SetpointState::default();
        // cooling, precision 0, scale 1 (Fahrenheit), size 1: 72
        let handled = state.handle(THERMOSTAT_SETPOINT_REPORT, &[0x02, 0x09, 0x48]).expect("should handle");
        assert_eq!(
            handled,
            Handled::Values(vec![(ValueKind::Setpoint { setpoint_type: 2, scale: 1 }, DecimalValue::from_integer(72))])
        );
        assert_eq!(state.values.get(&2), Some(&(1, DecimalValue::from_integer(72))));
    }

    #[test]
    fn test_supported_report() {
        let mut state = SetpointState::default();
        // bits 1 and 2 in the first byte, bit 0 (code 8) in the second
        state.handle(THERMOSTAT_SETPOINT_SUPPORTED_REPORT, &[0x06, 0x01]).expect("should handle");
        assert_eq!(state.supported, vec![SetpointType::Heating, SetpointType::Cooling, SetpointType::DryAir]);
    }

    #[test]
    fn test_lookup_by_label() {
        assert_eq!(SetpointType::from_label("AUTO_CHANGEOVER"), Some(SetpointType::AutoChangeover));
        assert_eq!(SetpointType::from_code(3), None);
    }
}
