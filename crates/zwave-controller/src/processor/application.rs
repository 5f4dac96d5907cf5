//! Frames that carry data from nodes: application commands, node
//! information updates and the node info request that triggers them.

use super::{FollowUp, MessageProcessor, ProcessorContext};
use crate::error::{ControllerError, ControllerResult};
use crate::event::ZWaveEvent;
use crate::transaction::Transaction;
use tracing::{debug, trace, warn};
use zwave_serial::{
    SerialMessage, UPDATE_STATE_DELETE_DONE, UPDATE_STATE_NEW_ID_ASSIGNED, UPDATE_STATE_NODE_INFO_RECEIVED,
    UPDATE_STATE_NODE_INFO_REQ_DONE, UPDATE_STATE_NODE_INFO_REQ_FAILED, UPDATE_STATE_SUC_ID,
};

// ============================================================================
// ApplicationCommandHandler
// ============================================================================

/// Application commands sent by a node.
///
/// ```text
/// REQUEST [status, node, length, class, command, ...]
/// ```
pub struct ApplicationCommandProcessor;

impl MessageProcessor for ApplicationCommandProcessor {
    fn name(&self) -> &'static str {
        "ApplicationCommandHandler"
    }

    fn handle_request(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let payload = &incoming.payload;
        if payload.len() < 4 {
            return Err(ControllerError::too_short("ApplicationCommandHandler", 4, payload.len()));
        }
        let node_id = payload[1];
        let length = payload[2] as usize;
        let end = (3 + length).min(payload.len());
        let data = payload[3..end].to_vec();
        incoming.node_id = node_id;

        let node = ctx.nodes.get_mut(node_id).ok_or(ControllerError::UnknownNode(node_id))?;
        trace!("NODE {}: Application command {:02X?}", node_id, data);

        // A class the node model cannot interpret only loses this command.
        match node.handle_command(0, &data) {
            Ok(events) => {
                for event in events {
                    ctx.emit(event);
                }
            }
            Err(e) => warn!("NODE {}: {}", node_id, e),
        }

        if last_sent.map(|t| t.node_id()) == Some(node_id) {
            ctx.check_transaction_complete(last_sent, incoming);
        }
        Ok(true)
    }
}

// ============================================================================
// ApplicationUpdate
// ============================================================================

/// Node information and network updates.
///
/// ```text
/// REQUEST [state, node, length, basic, generic, specific, classes...]
/// ```
pub struct ApplicationUpdateProcessor;

impl MessageProcessor for ApplicationUpdateProcessor {
    fn name(&self) -> &'static str {
        "ApplicationUpdate"
    }

    fn handle_request(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let state = incoming
            .payload_byte(0)
            .ok_or_else(|| ControllerError::too_short("ApplicationUpdate", 2, 0))?;
        let node_id = incoming.payload_byte(1).unwrap_or(0);
        incoming.node_id = node_id;

        match state {
            UPDATE_STATE_NODE_INFO_RECEIVED => {
                let payload = &incoming.payload;
                if payload.len() < 6 {
                    return Err(ControllerError::too_short("node information frame", 6, payload.len()));
                }
                let length = payload[2] as usize;
                let end = (3 + length).min(payload.len());
                let classes = payload.get(6..end).unwrap_or(&[]).to_vec();

                let node = ctx.nodes.get_or_insert(node_id)?;
                node.set_device_classes(payload[3], payload[4], payload[5]);
                let command_classes = node.register_command_classes(&classes);
                let can_negotiate = node.supports_version_queries();
                debug!("NODE {}: Node information received, {} command classes", node_id, command_classes.len());

                ctx.emit(ZWaveEvent::NodeInfoReceived { node_id, command_classes });
                if ctx.config.auto_negotiate_versions && can_negotiate {
                    ctx.follow_up(FollowUp::NegotiateVersions(node_id));
                }
                if last_sent.map(|t| t.node_id()) == Some(node_id) {
                    ctx.check_transaction_complete(last_sent, incoming);
                }
            }
            UPDATE_STATE_NODE_INFO_REQ_FAILED => {
                warn!("NODE {}: Node information request failed", node_id);
                incoming.set_transaction_canceled();
            }
            UPDATE_STATE_NODE_INFO_REQ_DONE => debug!("NODE {}: Node information request done", node_id),
            UPDATE_STATE_NEW_ID_ASSIGNED => debug!("NODE {}: New id assigned", node_id),
            UPDATE_STATE_DELETE_DONE => debug!("NODE {}: Deleted", node_id),
            UPDATE_STATE_SUC_ID => debug!("NODE {}: SUC id updated", node_id),
            other => {
                warn!("NODE {}: Unknown application update state 0x{:02X}", node_id, other);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// ============================================================================
// RequestNodeInfo
// ============================================================================

/// The stick's answer to a node information request. The node information
/// itself arrives later as an ApplicationUpdate.
pub struct RequestNodeInfoProcessor;

impl MessageProcessor for RequestNodeInfoProcessor {
    fn name(&self) -> &'static str {
        "RequestNodeInfo"
    }

    fn handle_response(
        &self,
        _ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let node_id = last_sent.map(|t| t.node_id()).unwrap_or(0);
        incoming.node_id = node_id;

        if incoming.payload_byte(0).unwrap_or(0) != 0 {
            debug!("NODE {}: Node information request accepted", node_id);
        } else {
            warn!("NODE {}: Node information request rejected", node_id);
            incoming.set_transaction_canceled();
        }
        Ok(true)
    }
}
