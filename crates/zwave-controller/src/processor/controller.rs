//! Controller-level serial API functions used during initialisation.

use super::{FollowUp, MessageProcessor, ProcessorContext};
use crate::command_class::LibraryType;
use crate::error::{ControllerError, ControllerResult};
use crate::transaction::Transaction;
use tracing::{debug, info, warn};
use zwave_serial::{MessageClass, SerialMessage, MAX_NODE_ID};

/// Listening flag in the IdentifyNode capability byte.
const NODE_CAPABILITY_LISTENING: u8 = 0x80;

/// Offset of the function bitmap in the SerialApiGetCapabilities response.
const FUNCTION_BITMAP_OFFSET: usize = 8;

/// Ids for every set bit of a bitmap whose bit 0 stands for id 1.
fn bitmap_ids(bitmap: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bitmap.iter().enumerate().flat_map(|(index, &byte)| {
        (0..8usize)
            .filter(move |bit| byte & (1 << bit) != 0)
            .map(move |bit| index * 8 + bit + 1)
    })
}

// ============================================================================
// GetVersion
// ============================================================================

/// `RESPONSE ["Z-Wave x.yy", 0x00, library type]`
pub struct GetVersionProcessor;

impl MessageProcessor for GetVersionProcessor {
    fn name(&self) -> &'static str {
        "GetVersion"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let payload = &incoming.payload;
        let nul = payload
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ControllerError::malformed("GetVersion string is not terminated"))?;
        let version = String::from_utf8_lossy(&payload[..nul]).trim().to_string();
        let library_type = LibraryType::from_code(payload.get(nul + 1).copied().unwrap_or(0));

        info!("Controller library {} ({})", version, library_type);
        ctx.info.library_version = Some(version);
        ctx.info.library_type = Some(library_type);

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// MemoryGetId
// ============================================================================

/// `RESPONSE [home id (4 bytes, big endian), controller node id]`
pub struct MemoryGetIdProcessor;

impl MessageProcessor for MemoryGetIdProcessor {
    fn name(&self) -> &'static str {
        "MemoryGetId"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let payload = &incoming.payload;
        if payload.len() < 5 {
            return Err(ControllerError::too_short("MemoryGetId", 5, payload.len()));
        }
        let home_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let own_node_id = payload[4];

        info!("Home id 0x{:08X}, controller node id {}", home_id, own_node_id);
        ctx.info.home_id = Some(home_id);
        ctx.info.own_node_id = Some(own_node_id);

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// SerialApiGetInitData
// ============================================================================

/// `RESPONSE [api version, capabilities, bitmap length, node bitmap.., chip type, chip version]`
///
/// Registers every node in the bitmap and, when interviewing is enabled,
/// queues an IdentifyNode for each of them.
pub struct SerialApiGetInitDataProcessor;

impl MessageProcessor for SerialApiGetInitDataProcessor {
    fn name(&self) -> &'static str {
        "SerialApiGetInitData"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let payload = &incoming.payload;
        if payload.len() < 3 {
            return Err(ControllerError::too_short("SerialApiGetInitData", 3, payload.len()));
        }
        let bitmap_len = payload[2] as usize;
        let bitmap = payload
            .get(3..3 + bitmap_len)
            .ok_or_else(|| ControllerError::too_short("SerialApiGetInitData node bitmap", 3 + bitmap_len, payload.len()))?;

        ctx.info.serial_api_version = Some(payload[0]);
        ctx.info.serial_api_capabilities = payload[1];

        let node_ids: Vec<u8> = bitmap_ids(bitmap)
            .filter(|&id| id <= MAX_NODE_ID as usize)
            .map(|id| id as u8)
            .collect();
        debug!("Init data: API version {}, {} nodes", payload[0], node_ids.len());

        for node_id in node_ids {
            ctx.nodes.get_or_insert(node_id)?;
            if ctx.info.own_node_id == Some(node_id) || !ctx.config.interview_nodes {
                continue;
            }
            ctx.follow_up(FollowUp::Send(SerialMessage::request(
                node_id,
                MessageClass::IdentifyNode,
                vec![node_id],
                MessageClass::IdentifyNode,
            )));
        }

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// SerialApiGetCapabilities
// ============================================================================

/// `RESPONSE [app version, app revision, manufacturer (2), product type (2), product id (2), function bitmap..]`
pub struct SerialApiGetCapabilitiesProcessor;

impl MessageProcessor for SerialApiGetCapabilitiesProcessor {
    fn name(&self) -> &'static str {
        "SerialApiGetCapabilities"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let payload = &incoming.payload;
        if payload.len() < FUNCTION_BITMAP_OFFSET {
            return Err(ControllerError::too_short("SerialApiGetCapabilities", FUNCTION_BITMAP_OFFSET, payload.len()));
        }

        let info = &mut *ctx.info;
        info.application_version = Some(format!("{}.{}", payload[0], payload[1]));
        info.manufacturer_id = Some(u16::from_be_bytes([payload[2], payload[3]]));
        info.product_type = Some(u16::from_be_bytes([payload[4], payload[5]]));
        info.product_id = Some(u16::from_be_bytes([payload[6], payload[7]]));
        info.supported_functions = bitmap_ids(&payload[FUNCTION_BITMAP_OFFSET..])
            .filter(|&id| id <= u8::MAX as usize)
            .map(|id| id as u8)
            .collect();

        debug!(
            "Controller manufacturer 0x{:04X}, {} supported functions",
            info.manufacturer_id.unwrap_or(0),
            info.supported_functions.len()
        );

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// GetControllerCapabilities
// ============================================================================

/// `RESPONSE [capability flags]`
pub struct GetControllerCapabilitiesProcessor;

impl MessageProcessor for GetControllerCapabilitiesProcessor {
    fn name(&self) -> &'static str {
        "GetControllerCapabilities"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let flags = incoming
            .payload_byte(0)
            .ok_or_else(|| ControllerError::too_short("GetControllerCapabilities", 1, 0))?;
        ctx.info.controller_capabilities = Some(flags);
        let info = &*ctx.info;
        info!(
            "Controller capabilities 0x{:02X}: secondary={}, real primary={}, SUC={}, SIS present={}",
            flags,
            info.is_secondary(),
            info.is_real_primary(),
            info.is_suc(),
            info.has_sis()
        );

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// IdentifyNode
// ============================================================================

/// `RESPONSE [capabilities, security, reserved, basic, generic, specific]`
///
/// The response does not name the node; it belongs to the node of the
/// request in flight.
pub struct IdentifyNodeProcessor;

impl MessageProcessor for IdentifyNodeProcessor {
    fn name(&self) -> &'static str {
        "IdentifyNode"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let Some(transaction) = last_sent else {
            warn!("IdentifyNode response with no request in flight");
            return Ok(false);
        };
        if transaction.message.message_class != MessageClass::IdentifyNode {
            warn!(
                "NODE {}: Ignoring IdentifyNode response while {} is in flight",
                transaction.node_id(),
                transaction.message.message_class
            );
            return Ok(false);
        }
        let payload = &incoming.payload;
        if payload.len() < 6 {
            return Err(ControllerError::too_short("IdentifyNode", 6, payload.len()));
        }
        let node_id = transaction.node_id();
        let listening = payload[0] & NODE_CAPABILITY_LISTENING != 0;

        let node = ctx.nodes.get_or_insert(node_id)?;
        node.set_protocol_info(listening, payload[3], payload[4], payload[5]);
        debug!(
            "NODE {}: Listening={}, device class {:02X}/{:02X}/{:02X}",
            node_id, listening, payload[3], payload[4], payload[5]
        );

        if listening && ctx.config.interview_nodes {
            ctx.follow_up(FollowUp::Send(SerialMessage::request(
                node_id,
                MessageClass::RequestNodeInfo,
                vec![node_id],
                MessageClass::ApplicationUpdate,
            )));
        }

        incoming.node_id = node_id;
        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// GetSucNodeId
// ============================================================================

/// `RESPONSE [SUC node id]`, 0 when the network has no SUC.
pub struct GetSucNodeIdProcessor;

impl MessageProcessor for GetSucNodeIdProcessor {
    fn name(&self) -> &'static str {
        "GetSucNodeId"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let suc = incoming
            .payload_byte(0)
            .ok_or_else(|| ControllerError::too_short("GetSucNodeId", 1, 0))?;
        if suc == 0 {
            debug!("Network has no SUC");
            ctx.info.suc_node_id = None;
        } else {
            debug!("SUC node id {}", suc);
            ctx.info.suc_node_id = Some(suc);
        }

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{acked, inbound, Harness};
    use zwave_serial::MessageType;

    #[test]
    fn test_get_version_response() {
        let mut harness = Harness::new();
        let transaction = acked(SerialMessage::controller_request(MessageClass::GetVersion, vec![]));
        let mut payload = b"Z-Wave 4.05\0".to_vec();
        payload.push(0x01);
        let mut incoming = inbound(MessageType::Response, MessageClass::GetVersion, payload);
        let mut ctx = harness.ctx();

        GetVersionProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        assert!(ctx.is_transaction_complete());
        drop(ctx);

        assert_eq!(harness.info.library_version.as_deref(), Some("Z-Wave 4.05"));
        assert_eq!(harness.info.library_type, Some(LibraryType::StaticController));
    }

    #[test]
    fn test_memory_get_id_response() {
        let mut harness = Harness::new();
        let mut incoming = inbound(MessageType::Response, MessageClass::MemoryGetId, vec![0xC0, 0xFF, 0xEE, 0x01, 0x01]);

        MemoryGetIdProcessor
            .handle_response(&mut harness.ctx(), None, &mut incoming)
            .expect("should handle");

        assert_eq!(harness.info.home_id, Some(0xC0FF_EE01));
        assert_eq!(harness.info.own_node_id, Some(1));
    }

    #[test]
    fn test_init_data_registers_nodes_and_identifies_others() {
        let mut harness = Harness::new();
        harness.info.own_node_id = Some(1);
        let mut payload = vec![0x05, 0x08, 29];
        let mut bitmap = [0u8; 29];
        bitmap[0] = 0b0001_0011; // nodes 1, 2, 5
        payload.extend_from_slice(&bitmap);
        payload.extend_from_slice(&[0x03, 0x01]);
        let mut incoming = inbound(MessageType::Response, MessageClass::SerialApiGetInitData, payload);
        let mut ctx = harness.ctx();

        SerialApiGetInitDataProcessor
            .handle_response(&mut ctx, None, &mut incoming)
            .expect("should handle");
        let outcome = ctx.finish();

        assert_eq!(harness.nodes.ids(), vec![1, 2, 5]);
        let identified: Vec<u8> = outcome
            .follow_ups
            .iter()
            .filter_map(|f| match f {
                FollowUp::Send(m) if m.message_class == MessageClass::IdentifyNode => Some(m.node_id),
                _ => None,
            })
            .collect();
        assert_eq!(identified, vec![2, 5]);
        assert_eq!(harness.info.serial_api_version, Some(5));
    }

    #[test]
    fn test_capabilities_response() {
        let mut harness = Harness::new();
        let mut payload = vec![0x01, 0x02, 0x00, 0x86, 0x00, 0x01, 0x00, 0x5A];
        payload.extend_from_slice(&[0b0000_0110]); // functions 2 and 3

        let mut incoming = inbound(MessageType::Response, MessageClass::SerialApiGetCapabilities, payload);
        SerialApiGetCapabilitiesProcessor
            .handle_response(&mut harness.ctx(), None, &mut incoming)
            .expect("should handle");

        assert_eq!(harness.info.application_version.as_deref(), Some("1.2"));
        assert_eq!(harness.info.manufacturer_id, Some(0x0086));
        assert_eq!(harness.info.product_id, Some(0x005A));
        assert_eq!(harness.info.supported_functions, vec![2, 3]);
    }

    #[test]
    fn test_controller_capabilities_response() {
        let mut harness = Harness::new();
        let transaction = acked(SerialMessage::controller_request(MessageClass::GetControllerCapabilities, vec![]));
        let mut incoming = inbound(MessageType::Response, MessageClass::GetControllerCapabilities, vec![0x1C]);
        let mut ctx = harness.ctx();

        GetControllerCapabilitiesProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        assert!(ctx.is_transaction_complete());
        drop(ctx);

        assert_eq!(harness.info.controller_capabilities, Some(0x1C));
        assert!(harness.info.is_real_primary());
        assert!(harness.info.is_suc());
        assert!(harness.info.has_sis());
        assert!(!harness.info.is_secondary());
        assert!(!harness.info.is_on_other_network());
    }

    #[test]
    fn test_identify_listening_node_requests_node_info() {
        let mut harness = Harness::new();
        let transaction = acked(SerialMessage::request(7, MessageClass::IdentifyNode, vec![7], MessageClass::IdentifyNode));
        let mut incoming = inbound(
            MessageType::Response,
            MessageClass::IdentifyNode,
            vec![0xD3, 0x9C, 0x00, 0x04, 0x10, 0x01],
        );
        let mut ctx = harness.ctx();

        IdentifyNodeProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        let outcome = ctx.finish();

        assert!(outcome.transaction_complete);
        assert!(matches!(
            outcome.follow_ups.as_slice(),
            [FollowUp::Send(m)] if m.message_class == MessageClass::RequestNodeInfo && m.payload == vec![7]
        ));
        assert!(harness.nodes.get(7).expect("node should exist").is_listening());
    }

    #[test]
    fn test_identify_sleeping_node() {
        let mut harness = Harness::new();
        let transaction = acked(SerialMessage::request(8, MessageClass::IdentifyNode, vec![8], MessageClass::IdentifyNode));
        let mut incoming = inbound(
            MessageType::Response,
            MessageClass::IdentifyNode,
            vec![0x53, 0x9C, 0x00, 0x04, 0x21, 0x01],
        );
        let mut ctx = harness.ctx();

        IdentifyNodeProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");

        assert!(ctx.finish().follow_ups.is_empty());
    }

    #[test]
    fn test_identify_response_for_other_request_is_ignored() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(4).expect("should insert");
        let mut send_data =
            SerialMessage::request(4, MessageClass::SendData, vec![4, 2, 0x20, 0x02, 0x25, 0x01], MessageClass::SendData);
        send_data.callback_id = Some(0x01);
        let transaction = acked(send_data);
        let mut incoming = inbound(
            MessageType::Response,
            MessageClass::IdentifyNode,
            vec![0x80, 0x00, 0x00, 0x02, 0x10, 0x01],
        );
        let mut ctx = harness.ctx();

        let handled = IdentifyNodeProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should not fail");
        let outcome = ctx.finish();

        assert!(!handled);
        assert!(!outcome.transaction_complete);
        assert!(outcome.follow_ups.is_empty());
        let node = harness.nodes.get(4).expect("node should exist").snapshot();
        assert!(!node.listening);
        assert_eq!(node.generic_class, 0);
    }

    #[test]
    fn test_suc_node_id() {
        let mut harness = Harness::new();
        let mut incoming = inbound(MessageType::Response, MessageClass::GetSucNodeId, vec![0x01]);

        GetSucNodeIdProcessor
            .handle_response(&mut harness.ctx(), None, &mut incoming)
            .expect("should handle");

        assert_eq!(harness.info.suc_node_id, Some(1));
    }
}
