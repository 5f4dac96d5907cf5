//! Multi instance / multi channel command class.
//!
//! Version 1 addresses instances of a single class with
//! `MULTI_INSTANCE_CMD_ENCAP`; version 2 addresses endpoints with
//! `MULTI_CHANNEL_CMD_ENCAP`:
//!
//! ```text
//! v1: 0x60 0x06 <instance> <class> <command> ...
//! v2: 0x60 0x0D <source endpoint> <destination endpoint> <class> <command> ...
//! ```

use super::{CommandDescriptor, Handled, COMMAND_CLASS_MULTI_INSTANCE};
use crate::error::{ControllerError, ControllerResult};

pub const MULTI_INSTANCE_REPORT: u8 = 0x05;
pub const MULTI_INSTANCE_CMD_ENCAP: u8 = 0x06;
pub const MULTI_CHANNEL_END_POINT_GET: u8 = 0x07;
pub const MULTI_CHANNEL_END_POINT_REPORT: u8 = 0x08;
pub const MULTI_CHANNEL_CMD_ENCAP: u8 = 0x0D;

const ENDPOINT_MASK: u8 = 0x7F;

/// Endpoint information reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiInstanceState {
    pub endpoint_count: Option<u8>,
}

impl MultiInstanceState {
    pub(crate) fn handle(&mut self, command: u8, data: &[u8]) -> ControllerResult<Handled> {
        match command {
            MULTI_INSTANCE_REPORT => {
                if data.len() < 2 {
                    return Err(ControllerError::too_short("MULTI_INSTANCE_REPORT", 2, data.len()));
                }
                let instances = data[1] & ENDPOINT_MASK;
                self.endpoint_count = Some(self.endpoint_count.unwrap_or(0).max(instances));
            }
            MULTI_CHANNEL_END_POINT_REPORT => {
                if data.len() < 2 {
                    return Err(ControllerError::too_short("MULTI_CHANNEL_END_POINT_REPORT", 2, data.len()));
                }
                self.endpoint_count = Some(data[1] & ENDPOINT_MASK);
            }
            _ => {}
        }
        Ok(Handled::Ignored)
    }
}

pub(crate) fn encode(version: u8, command: &CommandDescriptor) -> Option<Vec<u8>> {
    match command {
        CommandDescriptor::Get if version >= 2 => Some(vec![COMMAND_CLASS_MULTI_INSTANCE, MULTI_CHANNEL_END_POINT_GET]),
        _ => None,
    }
}

/// Wrap an application payload for `endpoint`.
pub fn encapsulate(version: u8, endpoint: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    if version >= 2 {
        out.extend_from_slice(&[COMMAND_CLASS_MULTI_INSTANCE, MULTI_CHANNEL_CMD_ENCAP, 0x00, endpoint]);
    } else {
        out.extend_from_slice(&[COMMAND_CLASS_MULTI_INSTANCE, MULTI_INSTANCE_CMD_ENCAP, endpoint]);
    }
    out.extend_from_slice(payload);
    out
}

/// Strip one level of multi instance encapsulation.
///
/// Returns the source endpoint and the inner payload, or `None` if `data`
/// is not encapsulated.
pub fn unwrap_encapsulation(data: &[u8]) -> ControllerResult<Option<(u8, &[u8])>> {
    match data {
        [COMMAND_CLASS_MULTI_INSTANCE, MULTI_INSTANCE_CMD_ENCAP, rest @ ..] => match rest {
            [instance, inner @ ..] if !inner.is_empty() => Ok(Some((*instance & ENDPOINT_MASK, inner))),
            _ => Err(ControllerError::too_short("MULTI_INSTANCE_CMD_ENCAP", 4, data.len())),
        },
        [COMMAND_CLASS_MULTI_INSTANCE, MULTI_CHANNEL_CMD_ENCAP, rest @ ..] => match rest {
            [source, _destination, inner @ ..] if !inner.is_empty() => Ok(Some((*source & ENDPOINT_MASK, inner))),
            _ => Err(ControllerError::too_short("MULTI_CHANNEL_CMD_ENCAP", 5, data.len())),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encapsulate_by_version() {
        assert_eq!(encapsulate(2, 3, &[0x25, 0x02]), vec![0x60, 0x0D, 0x00, 0x03, 0x25, 0x02]);
        assert_eq!(encapsulate(1, 3, &[0x25, 0x02]), vec![0x60, 0x06, 0x03, 0x25, 0x02]);
    }

    #[test]
    fn test_unwrap_multi_channel() {
        let data = [0x60, 0x0D, 0x02, 0x00, 0x25, 0x03, 0xFF];
        let (endpoint, inner) = unwrap_encapsulation(&data).expect("should parse").expect("should be encapsulated");
        assert_eq!(endpoint, 2);
        assert_eq!(inner, &[0x25, 0x03, 0xFF]);
    }

    #[test]
    fn test_unwrap_multi_instance() {
        let data = [0x60, 0x06, 0x01, 0x31, 0x05];
        let (endpoint, inner) = unwrap_encapsulation(&data).expect("should parse").expect("should be encapsulated");
        assert_eq!(endpoint, 1);
        assert_eq!(inner, &[0x31, 0x05]);
    }

    #[test]
    fn test_plain_and_truncated_payloads() {
        assert_eq!(unwrap_encapsulation(&[0x25, 0x03, 0x00]).expect("should parse"), None);
        assert!(unwrap_encapsulation(&[0x60, 0x0D, 0x01]).is_err());
    }

    #[test]
    fn test_endpoint_report() {
        let mut state = MultiInstanceState::default();
        state.handle(MULTI_CHANNEL_END_POINT_REPORT, &[0x00, 0x04]).expect("should handle");
        assert_eq!(state.endpoint_count, Some(4));
    }
}
