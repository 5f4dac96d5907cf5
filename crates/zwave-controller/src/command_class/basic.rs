//! Single byte level classes: basic, binary switch, multilevel switch and
//! battery.

use super::{CommandDescriptor, Handled, COMMAND_CLASS_SWITCH_MULTILEVEL};
use crate::error::{ControllerError, ControllerResult};
use crate::event::ValueKind;
use crate::value::DecimalValue;

pub const LEVEL_SET: u8 = 0x01;
pub const LEVEL_GET: u8 = 0x02;
pub const LEVEL_REPORT: u8 = 0x03;

pub const BATTERY_GET: u8 = 0x02;
pub const BATTERY_REPORT: u8 = 0x03;

/// Battery level reported by a node whose battery is about to run out.
const BATTERY_LOW_WARNING: u8 = 0xFF;

/// Dimming duration meaning "use the device's factory default".
const DEFAULT_DURATION: u8 = 0xFF;

/// Last level reported by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelState {
    pub level: Option<u8>,
}

impl LevelState {
    pub(crate) fn handle_report(&mut self, kind: ValueKind, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        if command != LEVEL_REPORT {
            return Ok(Handled::Ignored);
        }
        let level = *data
            .first()
            .ok_or_else(|| ControllerError::too_short("level report", 1, 0))?;
        self.level = Some(level);
        Ok(Handled::Values(vec![(kind, DecimalValue::from(level))]))
    }
}

/// Last battery level reported by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatteryState {
    pub level: Option<u8>,
    pub low_warning: bool,
}

impl BatteryState {
    pub(crate) fn handle(&mut self, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        if command != BATTERY_REPORT {
            return Ok(Handled::Ignored);
        }
        let raw = *data
            .first()
            .ok_or_else(|| ControllerError::too_short("battery report", 1, 0))?;

        self.low_warning = raw == BATTERY_LOW_WARNING;
        let level = if self.low_warning { 0 } else { raw.min(100) };
        self.level = Some(level);
        Ok(Handled::Values(vec![(ValueKind::Battery, DecimalValue::from(level))]))
    }
}

pub(crate) fn encode_basic(key: u8, command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::Get => Some(vec![key, LEVEL_GET]),
        CommandDescriptor::Set { value } => Some(vec![key, LEVEL_SET, *value]),
        _ => None,
    }
}

pub(crate) fn encode_multilevel(version: u8, command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::Set { value } if version >= 2 => {
            Some(vec![COMMAND_CLASS_SWITCH_MULTILEVEL, LEVEL_SET, *value, DEFAULT_DURATION])
        }
        _ => encode_basic(COMMAND_CLASS_SWITCH_MULTILEVEL, command),
    }
}
