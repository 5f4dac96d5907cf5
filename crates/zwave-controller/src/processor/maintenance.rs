//! Stick maintenance: serial timeouts, restarts, factory reset and the
//! failed node list.

use super::{FollowUp, MessageProcessor, ProcessorContext};
use crate::error::{ControllerError, ControllerResult};
use crate::event::ZWaveEvent;
use crate::transaction::Transaction;
use tracing::{debug, info, warn};
use zwave_serial::{MessageClass, SerialMessage};

// ============================================================================
// SerialApiSetTimeouts
// ============================================================================

/// `RESPONSE [previous ACK timeout, previous byte timeout]`, in 10 ms units.
pub struct SerialApiSetTimeoutsProcessor;

impl MessageProcessor for SerialApiSetTimeoutsProcessor {
    fn name(&self) -> &'static str {
        "SerialApiSetTimeouts"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let (Some(ack), Some(byte)) = (incoming.payload_byte(0), incoming.payload_byte(1)) else {
            return Err(ControllerError::too_short("SerialApiSetTimeouts", 2, incoming.payload.len()));
        };
        info!(
            "Serial timeouts updated, previous ACK timeout {} ms, byte timeout {} ms",
            u32::from(ack) * 10,
            u32::from(byte) * 10
        );

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// SerialApiSoftReset
// ============================================================================

/// The stick restarts without replying; the transaction completes on ACK.
/// A frame of this class only shows up from firmware that echoes it.
pub struct SerialApiSoftResetProcessor;

impl MessageProcessor for SerialApiSoftResetProcessor {
    fn name(&self) -> &'static str {
        "SerialApiSoftReset"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        debug!("Stick confirmed soft reset");
        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// SetDefault
// ============================================================================

/// `REQUEST [callback id]` once the stick has erased its network.
///
/// Every known node is forgotten and the controller ids are read again.
pub struct SetDefaultProcessor;

impl MessageProcessor for SetDefaultProcessor {
    fn name(&self) -> &'static str {
        "SetDefault"
    }

    fn handle_request(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let callback_id = incoming
            .payload_byte(0)
            .ok_or_else(|| ControllerError::too_short("SetDefault", 1, 0))?;
        incoming.callback_id = Some(callback_id);

        let Some(transaction) = last_sent else {
            warn!("SetDefault callback 0x{:02X} with no transaction in flight", callback_id);
            return Ok(false);
        };
        if transaction.message.message_class != MessageClass::SetDefault
            || transaction.message.callback_id != Some(callback_id)
        {
            warn!(
                "SetDefault callback 0x{:02X} does not belong to {} in flight",
                callback_id, transaction.message.message_class
            );
            return Ok(false);
        }

        warn!("Controller reset to factory defaults, forgetting {} nodes", ctx.nodes.len());
        ctx.nodes.clear();
        ctx.info.home_id = None;
        ctx.info.own_node_id = None;
        ctx.info.suc_node_id = None;
        ctx.info.controller_capabilities = None;

        for class in [MessageClass::MemoryGetId, MessageClass::SerialApiGetInitData] {
            ctx.follow_up(FollowUp::Send(SerialMessage::controller_request(class, Vec::new())));
        }
        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

// ============================================================================
// IsFailedNodeId
// ============================================================================

/// `RESPONSE [failed]` for the node of the request in flight.
pub struct IsFailedNodeIdProcessor;

impl MessageProcessor for IsFailedNodeIdProcessor {
    fn name(&self) -> &'static str {
        "IsFailedNodeId"
    }

    fn handle_response(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let status = incoming
            .payload_byte(0)
            .ok_or_else(|| ControllerError::too_short("IsFailedNodeId", 1, 0))?;

        let Some(transaction) = last_sent else {
            warn!("IsFailedNodeId response with no transaction in flight");
            return Ok(false);
        };
        if transaction.message.message_class != MessageClass::IsFailedNodeId {
            warn!(
                "NODE {}: Ignoring IsFailedNodeId response while {} is in flight",
                transaction.node_id(),
                transaction.message.message_class
            );
            return Ok(false);
        }
        let node_id = transaction.node_id();
        incoming.node_id = node_id;

        let failed = status != 0;
        let node = ctx.nodes.get_mut(node_id).ok_or(ControllerError::UnknownNode(node_id))?;
        node.set_failed(failed);
        if failed {
            warn!("NODE {}: Controller lists node as failed", node_id);
        } else {
            debug!("NODE {}: Node is not on the failed list", node_id);
        }
        ctx.emit(ZWaveEvent::NodeFailureStatus { node_id, failed });

        ctx.check_transaction_complete(last_sent, incoming);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_support::{acked, inbound, Harness};
    use zwave_serial::MessageType;

    fn is_failed_request(node_id: u8) -> SerialMessage {
        SerialMessage::request(node_id, MessageClass::IsFailedNodeId, vec![node_id], MessageClass::IsFailedNodeId)
    }

    #[test]
    fn test_set_timeouts_response() {
        let mut harness = Harness::new();
        let transaction = acked(SerialMessage::controller_request(MessageClass::SerialApiSetTimeouts, vec![150, 15]));
        let mut incoming = inbound(MessageType::Response, MessageClass::SerialApiSetTimeouts, vec![0x96, 0x0F]);
        let mut ctx = harness.ctx();

        let handled = SerialApiSetTimeoutsProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        assert!(handled);
        assert!(ctx.is_transaction_complete());
    }

    #[test]
    fn test_set_timeouts_short_response() {
        let mut harness = Harness::new();
        let mut incoming = inbound(MessageType::Response, MessageClass::SerialApiSetTimeouts, vec![0x96]);
        let mut ctx = harness.ctx();

        let result = SerialApiSetTimeoutsProcessor.handle_response(&mut ctx, None, &mut incoming);
        assert!(matches!(result, Err(ControllerError::MalformedPayload(_))));
    }

    #[test]
    fn test_set_default_forgets_nodes_and_rereads_ids() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(1).expect("should insert");
        harness.nodes.get_or_insert(6).expect("should insert");
        harness.info.home_id = Some(0xC0FFEE01);
        harness.info.own_node_id = Some(1);

        let mut request = SerialMessage::controller_request(MessageClass::SetDefault, vec![0x0A]);
        request.callback_id = Some(0x0A);
        let transaction = acked(request);
        let mut incoming = inbound(MessageType::Request, MessageClass::SetDefault, vec![0x0A]);
        let mut ctx = harness.ctx();

        SetDefaultProcessor
            .handle_request(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        assert!(ctx.is_transaction_complete());
        let outcome = ctx.finish();

        assert_eq!(
            outcome.follow_ups,
            vec![
                FollowUp::Send(SerialMessage::controller_request(MessageClass::MemoryGetId, vec![])),
                FollowUp::Send(SerialMessage::controller_request(MessageClass::SerialApiGetInitData, vec![])),
            ]
        );
        assert!(harness.nodes.is_empty());
        assert_eq!(harness.info.home_id, None);
        assert_eq!(harness.info.own_node_id, None);
    }

    #[test]
    fn test_set_default_with_wrong_callback_id_changes_nothing() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(6).expect("should insert");

        let mut request = SerialMessage::controller_request(MessageClass::SetDefault, vec![0x0A]);
        request.callback_id = Some(0x0A);
        let transaction = acked(request);
        let mut incoming = inbound(MessageType::Request, MessageClass::SetDefault, vec![0x0B]);
        let mut ctx = harness.ctx();

        let handled = SetDefaultProcessor
            .handle_request(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should not error");
        assert!(!handled);
        assert!(!ctx.is_transaction_complete());
        drop(ctx);
        assert_eq!(harness.nodes.ids(), vec![6]);
    }

    #[test]
    fn test_is_failed_marks_node() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(6).expect("should insert");
        let transaction = acked(is_failed_request(6));
        let mut incoming = inbound(MessageType::Response, MessageClass::IsFailedNodeId, vec![0x01]);
        let mut ctx = harness.ctx();

        IsFailedNodeIdProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        assert!(ctx.is_transaction_complete());
        let outcome = ctx.finish();

        assert_eq!(outcome.events, vec![ZWaveEvent::NodeFailureStatus { node_id: 6, failed: true }]);
        assert!(harness.nodes.get(6).map(|node| node.is_failed()).unwrap_or(false));
    }

    #[test]
    fn test_is_failed_clears_flag() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(6).expect("should insert").set_failed(true);
        let transaction = acked(is_failed_request(6));
        let mut incoming = inbound(MessageType::Response, MessageClass::IsFailedNodeId, vec![0x00]);
        let mut ctx = harness.ctx();

        IsFailedNodeIdProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should handle");
        drop(ctx);

        assert_eq!(harness.nodes.get(6).map(|node| node.is_failed()), Some(false));
    }

    #[test]
    fn test_is_failed_response_for_other_request_is_ignored() {
        let mut harness = Harness::new();
        harness.nodes.get_or_insert(6).expect("should insert");
        let transaction = acked(SerialMessage::controller_request(MessageClass::GetSucNodeId, vec![]));
        let mut incoming = inbound(MessageType::Response, MessageClass::IsFailedNodeId, vec![0x01]);
        let mut ctx = harness.ctx();

        let handled = IsFailedNodeIdProcessor
            .handle_response(&mut ctx, Some(&transaction), &mut incoming)
            .expect("should not error");
        assert!(!handled);
        drop(ctx);
        assert_eq!(harness.nodes.get(6).map(|node| node.is_failed()), Some(false));
    }
}
