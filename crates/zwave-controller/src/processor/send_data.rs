//! SendData.
//!
//! Sending application data to a node is a three step exchange:
//!
//! ```text
//! host  ── REQUEST  SendData [node, len, data.., tx options, callback id] ──► stick
//! stick ── RESPONSE SendData [accepted]                                   ──► host
//! stick ── REQUEST  SendData [callback id, tx status]                     ──► host
//! ```
//!
//! The callback reports whether the node acknowledged the frame. A report
//! (ApplicationCommandHandler) may follow for GET-style commands.

use super::{MessageProcessor, ProcessorContext};
use crate::error::ControllerResult;
use crate::transaction::Transaction;
use tracing::{debug, warn};
use zwave_serial::{
    SerialMessage, TRANSMIT_COMPLETE_FAIL, TRANSMIT_COMPLETE_NOROUTE, TRANSMIT_COMPLETE_NOT_IDLE,
    TRANSMIT_COMPLETE_NO_ACK, TRANSMIT_COMPLETE_OK,
};

pub struct SendDataProcessor;

fn transmit_status_label(status: u8) -> &'static str {
    match status {
        TRANSMIT_COMPLETE_OK => "OK",
        TRANSMIT_COMPLETE_NO_ACK => "no ACK from node",
        TRANSMIT_COMPLETE_FAIL => "transmission failed",
        TRANSMIT_COMPLETE_NOT_IDLE => "network busy",
        TRANSMIT_COMPLETE_NOROUTE => "no route",
        _ => "unknown status",
    }
}

impl MessageProcessor for SendDataProcessor {
    fn name(&self) -> &'static str {
        "SendData"
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
            debug!("NODE {}: SendData accepted by controller", node_id);
        } else {
            warn!("NODE {}: SendData rejected by controller", node_id);
            incoming.set_transaction_canceled();
        }
        Ok(true)
    }

    fn handle_request(
        &self,
        ctx: &mut ProcessorContext<'_>,
        last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        let (Some(callback_id), Some(status)) = (incoming.payload_byte(0), incoming.payload_byte(1)) else {
            warn!("SendData callback too short: {}", incoming);
            return Ok(false);
        };
        incoming.callback_id = Some(callback_id);

        let Some(transaction) = last_sent else {
            warn!("SendData callback 0x{:02X} with no transaction in flight", callback_id);
            return Ok(false);
        };
        incoming.node_id = transaction.node_id();

        if transaction.message.callback_id != Some(callback_id) {
            warn!(
                "NODE {}: SendData callback id 0x{:02X} does not match 0x{:02X}",
                transaction.node_id(),
                callback_id,
                transaction.message.callback_id.unwrap_or(0)
            );
            return Ok(false);
        }

        if status == TRANSMIT_COMPLETE_OK {
            debug!("NODE {}: SendData transmitted", transaction.node_id());
            ctx.check_transaction_complete(last_sent, incoming);
        } else {
            warn!(
                "NODE {}: SendData failed: {} (0x{:02X})",
                transaction.node_id(),
                transmit_status_label(status),
                status
            );
            incoming.set_transaction_canceled();
        }
        Ok(true)
    }
}
