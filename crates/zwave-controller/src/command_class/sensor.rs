//! Binary and multilevel sensor command classes.

use super::{CommandDescriptor, Handled, COMMAND_CLASS_SENSOR_BINARY, COMMAND_CLASS_SENSOR_MULTILEVEL};
use crate::error::{ControllerError, ControllerResult};
use crate::event::ValueKind;
use crate::value::DecimalValue;
use std::collections::BTreeMap;

pub const SENSOR_BINARY_GET: u8 = 0x02;
pub const SENSOR_BINARY_REPORT: u8 = 0x03;

pub const SENSOR_MULTILEVEL_GET: u8 = 0x04;
pub const SENSOR_MULTILEVEL_REPORT: u8 = 0x05;

/// First version whose GET selects the sensor type and scale.
const SENSOR_GET_TYPED_VERSION: u8 = 5;

/// Last binary state reported per sensor type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorBinaryState {
    pub states: BTreeMap<u8, bool>,
}

impl SensorBinaryState {
    pub(crate) fn handle(&mut self, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        if command != SENSOR_BINARY_REPORT {
            return Ok(Handled::Ignored);
        }
        let value = *data
            .first()
            .ok_or_else(|| ControllerError::too_short("SENSOR_BINARY_REPORT", 1, 0))?;
        // Version 1 reports carry no sensor type.
        let sensor_type = data.get(1).copied().unwrap_or(0);
        self.states.insert(sensor_type, value != 0);
        Ok(Handled::Values(vec![(ValueKind::SensorBinary { sensor_type }, DecimalValue::from(value))]))
    }
}

/// Last reading and scale per sensor type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorMultilevelState {
    pub readings: BTreeMap<u8, (u8, DecimalValue)>,
}

impl SensorMultilevelState {
    pub(crate) fn handle(&mut self, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        if command != SENSOR_MULTILEVEL_REPORT {
            return Ok(Handled::Ignored);
        }
        let (&sensor_type, rest) = data
            .split_first()
            .ok_or_else(|| ControllerError::too_short("SENSOR_MULTILEVEL_REPORT", 3, data.len()))?;
        let (value, scale, _) = DecimalValue::decode(rest)?;

        tracing::trace!("Sensor type {} scale {} reading {}", sensor_type, scale, value);
        self.readings.insert(sensor_type, (scale, value));
        Ok(Handled::Values(vec![(ValueKind::Sensor { sensor_type, scale }, value)]))
    }
}

pub(crate) fn encode_binary(command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::Get => Some(vec![COMMAND_CLASS_SENSOR_BINARY, SENSOR_BINARY_GET]),
        _ => None,
    }
}

pub(crate) fn encode_multilevel(version: u8, command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::Get => Some(vec![COMMAND_CLASS_SENSOR_MULTILEVEL, SENSOR_MULTILEVEL_GET]),
        CommandDescriptor::SensorGet { sensor_type, scale } if version >= SENSOR_GET_TYPED_VERSION => Some(vec![
            COMMAND_CLASS_SENSOR_MULTILEVEL,
            SENSOR_MULTILEVEL_GET,
            *sensor_type,
            (*scale & 0x03) << 3,
        ]),
        CommandDescriptor::SensorGet { .. } => Some(vec![COMMAND_CLASS_SENSOR_MULTILEVEL, SENSOR_MULTILEVEL_GET]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multilevel_report() {
        let mut state = SensorMultilevelState::default();
        // temperature, precision 1, scale 0, size 2: 21.5
        let handled = state.handle(SENSOR_MULTILEVEL_REPORT, &[0x01, 0x22, 0x00, 0xD7]).expect("should handle");

        assert_eq!(
            handled,
            Handled::Values(vec![(ValueKind::Sensor { sensor_type: 1, scale: 0 }, DecimalValue::new(215, 1))])
        );
        assert_eq!(state.readings.get(&1), Some(&(0, DecimalValue::new(215, 1))));
    }

    #[test]
    fn test_typed_get_only_from_v5() {
        let get = CommandDescriptor::SensorGet { sensor_type: 1, scale: 1 };
        assert_eq!(encode_multilevel(4, &get), Some(vec![0x31, 0x04]));
        assert_eq!(encode_multilevel(5, &get), Some(vec![0x31, 0x04, 0x01, 0x08]));
    }

    #[test]
    fn test_binary_report_v1_and_v2() {
        let mut state = SensorBinaryState::default();
        state.handle(SENSOR_BINARY_REPORT, &[0xFF]).expect("should handle");
        state.handle(SENSOR_BINARY_REPORT, &[0x00, 0x06]).expect("should handle");
        assert_eq!(state.states.get(&0), Some(&true));
        assert_eq!(state.states.get(&6), Some(&false));
    }

    #[test]
    fn test_truncated_multilevel_report() {
        let mut state = SensorMultilevelState::default();
        assert!(state.handle(SENSOR_MULTILEVEL_REPORT, &[0x01, 0x22, 0x00]).is_err());
    }
}
