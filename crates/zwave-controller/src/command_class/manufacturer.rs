//! Manufacturer specific command class.

use super::Handled;
use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};

pub const MANUFACTURER_SPECIFIC_GET: u8 = 0x04;
pub const MANUFACTURER_SPECIFIC_REPORT: u8 = 0x05;

/// Manufacturer, product type and product id of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerInfo {
    pub manufacturer_id: u16,
    pub device_type: u16,
    pub device_id: u16,
}

pub(crate) fn handle(command: u8, data: &[u8]) -> ControllerResult<Handled> {
    if command != MANUFACTURER_SPECIFIC_REPORT {
        return Ok(Handled::Ignored);
    }
    if data.len() < 6 {
        return Err(ControllerError::too_short("MANUFACTURER_SPECIFIC_REPORT", 6, data.len()));
    }
    Ok(Handled::Manufacturer(ManufacturerInfo {
        manufacturer_id: u16::from_be_bytes([data[0], data[1]]),
        device_type: u16::from_be_bytes([data[2], data[3]]),
        device_id: u16::from_be_bytes([data[4], data[5]]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_report() {
        let handled = handle(MANUFACTURER_SPECIFIC_REPORT, &[0x00, 0x86, 0x00, 0x02, 0x00, 0x64]).expect("should handle");
        assert_eq!(
            handled,
            Handled::Manufacturer(ManufacturerInfo { manufacturer_id: 0x0086, device_type: 2, device_id: 100 })
        );
        assert!(handle(MANUFACTURER_SPECIFIC_REPORT, &[0x00]).is_err());
    }
}
