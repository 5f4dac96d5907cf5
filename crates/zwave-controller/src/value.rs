//! Fixed-point values used by sensor and setpoint command classes.
//!
//! Values are carried with a one byte header followed by a big-endian
//! two's complement integer of 1, 2 or 4 bytes:
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---+---+---+---+---+---+---+---+
//! | precision | scale |   size    |
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! The represented value is `mantissa / 10^precision`.

use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const PRECISION_SHIFT: u8 = 5;
const PRECISION_MASK: u8 = 0xE0;
const SCALE_SHIFT: u8 = 3;
const SCALE_MASK: u8 = 0x18;
const SIZE_MASK: u8 = 0x07;
const MAX_PRECISION: u8 = 7;

/// A decimal number in Z-Wave fixed-point form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalValue {
    /// Unscaled integer value.
    pub mantissa: i32,
    /// Number of decimal digits after the point.
    pub precision: u8,
}

impl DecimalValue {
    /// Create a value from its mantissa and precision.
    pub fn new(mantissa: i32, precision: u8) -> Self {
        DecimalValue { mantissa, precision: precision.min(MAX_PRECISION) }
    }

    /// A whole number.
    pub fn from_integer(value: i32) -> Self {
        DecimalValue { mantissa: value, precision: 0 }
    }

    /// Approximate floating point value.
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.precision as i32)
    }

    /// Decode a header byte and value.
    ///
    /// Returns the value, the scale bits from the header, and the number of
    /// bytes consumed.
    pub fn decode(data: &[u8]) -> ControllerResult<(Self, u8, usize)> {
        let header = *data
            .first()
            .ok_or_else(|| ControllerError::too_short("decimal value", 1, 0))?;
        let precision = (header & PRECISION_MASK) >> PRECISION_SHIFT;
        let scale = (header & SCALE_MASK) >> SCALE_SHIFT;
        let size = (header & SIZE_MASK) as usize;

        if data.len() < 1 + size {
            return Err(ControllerError::too_short("decimal value", 1 + size, data.len()));
        }
        let bytes = &data[1..1 + size];
        let mantissa = match size {
            1 => bytes[0] as i8 as i32,
            2 => i16::from_be_bytes([bytes[0], bytes[1]]) as i32,
            4 => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            other => return Err(ControllerError::malformed(format!("invalid decimal value size {}", other))),
        };

        Ok((DecimalValue { mantissa, precision }, scale, 1 + size))
    }

    /// Encode with the given scale, using the smallest size that holds the
    /// mantissa.
    pub fn encode(&self, scale: u8) -> Vec<u8> {
        let value_bytes: Vec<u8> = if let Ok(v) = i8::try_from(self.mantissa) {
            v.to_be_bytes().to_vec()
        } else if let Ok(v) = i16::try_from(self.mantissa) {
            v.to_be_bytes().to_vec()
        } else {
            self.mantissa.to_be_bytes().to_vec()
        };

        let header = ((self.precision << PRECISION_SHIFT) & PRECISION_MASK)
            | ((scale << SCALE_SHIFT) & SCALE_MASK)
            | (value_bytes.len() as u8 & SIZE_MASK);

        let mut out = Vec::with_capacity(1 + value_bytes.len());
        out.push(header);
        out.extend_from_slice(&value_bytes);
        out
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precision == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10i64.pow(self.precision as u32);
        let value = self.mantissa as i64;
        let sign = if value < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            value.abs() / divisor,
            value.abs() % divisor,
            width = self.precision as usize
        )
    }
}

impl From<u8> for DecimalValue {
    fn from(value: u8) -> Self {
        DecimalValue::from_integer(value as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_byte_celsius() {
        // precision 1, scale 0, size 2: 21.5
        let (value, scale, consumed) = DecimalValue::decode(&[0x22, 0x00, 0xD7]).expect("should decode");
        assert_eq!(value, DecimalValue::new(215, 1));
        assert_eq!(scale, 0);
        assert_eq!(consumed, 3);
        assert_eq!(value.to_string(), "21.5");
    }

    #[test]
    fn test_decode_negative_fahrenheit() {
        // precision 0, scale 1, size 1: -5
        let (value, scale, _) = DecimalValue::decode(&[0x09, 0xFB]).expect("should decode");
        assert_eq!(value.mantissa, -5);
        assert_eq!(scale, 1);
        assert_eq!(value.to_string(), "-5");
    }

    #[test]
    fn test_encode_picks_smallest_size() {
        assert_eq!(DecimalValue::new(215, 1).encode(0), vec![0x22, 0x00, 0xD7]);
        assert_eq!(DecimalValue::from_integer(20).encode(0), vec![0x01, 0x14]);
        assert_eq!(
            DecimalValue::from_integer(100_000).encode(0),
            vec![0x04, 0x00, 0x01, 0x86, 0xA0]
        );
    }

    #[test]
    fn test_display_small_negative_fraction() {
        assert_eq!(DecimalValue::new(-5, 2).to_string(), "-0.05");
        assert!((DecimalValue::new(-5, 2).to_f64() + 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_bad_size() {
        assert!(DecimalValue::decode(&[0x03, 0x00, 0x00, 0x00]).is_err());
        assert!(DecimalValue::decode(&[0x02, 0x00]).is_err());
        assert!(DecimalValue::decode(&[]).is_err());
    }
}
