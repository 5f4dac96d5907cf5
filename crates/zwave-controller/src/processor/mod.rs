//! Message processors.
//!
//! Every serial API function the engine understands has a processor that
//! interprets its RESPONSE (the stick's synchronous reply) and/or its
//! REQUEST (an unsolicited or callback frame). Lookup is a closed match on
//! [`MessageClass`]; a class without a processor is reported and its frame
//! dropped.

mod application;
mod controller;
mod maintenance;
mod send_data;

pub use application::{ApplicationCommandProcessor, ApplicationUpdateProcessor, RequestNodeInfoProcessor};
pub use controller::{
    GetControllerCapabilitiesProcessor, GetSucNodeIdProcessor, GetVersionProcessor, IdentifyNodeProcessor,
    MemoryGetIdProcessor, SerialApiGetCapabilitiesProcessor, SerialApiGetInitDataProcessor,
};
pub use maintenance::{
    IsFailedNodeIdProcessor, SerialApiSetTimeoutsProcessor, SerialApiSoftResetProcessor, SetDefaultProcessor,
};
pub use send_data::SendDataProcessor;

use crate::config::ControllerConfig;
use crate::controller::ControllerInfo;
use crate::error::ControllerResult;
use crate::event::ZWaveEvent;
use crate::node::NodeRegistry;
use crate::transaction::Transaction;
use zwave_serial::{MessageClass, SerialMessage};

/// Work a processor asks the controller to do once the frame is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Queue a message.
    Send(SerialMessage),
    /// Start version negotiation with a node.
    NegotiateVersions(u8),
}

/// State a processor may read and update while handling one frame.
pub struct ProcessorContext<'a> {
    pub nodes: &'a mut NodeRegistry,
    pub info: &'a mut ControllerInfo,
    pub config: &'a ControllerConfig,
    events: Vec<ZWaveEvent>,
    follow_ups: Vec<FollowUp>,
    transaction_complete: bool,
}

/// What handling one frame produced.
#[derive(Debug, Default)]
pub struct ProcessorOutcome {
    pub events: Vec<ZWaveEvent>,
    pub follow_ups: Vec<FollowUp>,
    pub transaction_complete: bool,
}

impl<'a> ProcessorContext<'a> {
    pub fn new(nodes: &'a mut NodeRegistry, info: &'a mut ControllerInfo, config: &'a ControllerConfig) -> Self {
        ProcessorContext {
            nodes,
            info,
            config,
            events: Vec::new(),
            follow_ups: Vec::new(),
            transaction_complete: false,
        }
    }

    /// Publish an event once the frame is handled.
    pub fn emit(&mut self, event: ZWaveEvent) {
        self.events.push(event);
    }

    /// Queue follow-up work.
    pub fn follow_up(&mut self, follow_up: FollowUp) {
        self.follow_ups.push(follow_up);
    }

    /// Mark the transaction complete if `incoming` is the reply it waits
    /// for. Returns whether it did.
    pub fn check_transaction_complete(&mut self, last_sent: Option<&Transaction>, incoming: &SerialMessage) -> bool {
        let Some(transaction) = last_sent else {
            return false;
        };
        if transaction.is_completed_by(incoming) {
            tracing::trace!(
                "NODE {}: {} completes transaction {}",
                transaction.node_id(),
                incoming.message_class,
                transaction.id
            );
            self.transaction_complete = true;
        }
        self.transaction_complete
    }

    pub fn is_transaction_complete(&self) -> bool {
        self.transaction_complete
    }

    /// Release the borrowed state and return what was produced.
    pub fn finish(self) -> ProcessorOutcome {
        ProcessorOutcome {
            events: self.events,
            follow_ups: self.follow_ups,
            transaction_complete: self.transaction_complete,
        }
    }
}

/// Interprets frames of one message class.
///
/// Both handlers return whether the frame was understood. The default
/// implementations log a warning and return `false`.
pub trait MessageProcessor: Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle a RESPONSE frame.
    fn handle_response(
        &self,
        _ctx: &mut ProcessorContext<'_>,
        _last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        tracing::warn!("{} has no RESPONSE handler: {}", self.name(), incoming);
        Ok(false)
    }

    /// Handle a REQUEST frame.
    fn handle_request(
        &self,
        _ctx: &mut ProcessorContext<'_>,
        _last_sent: Option<&Transaction>,
        incoming: &mut SerialMessage,
    ) -> ControllerResult<bool> {
        tracing::warn!("{} has no REQUEST handler: {}", self.name(), incoming);
        Ok(false)
    }
}

/// The processor registered for `class`, if any.
pub fn processor_for(class: MessageClass) -> Option<&'static dyn MessageProcessor> {
    match class {
        MessageClass::SendData => Some(&SendDataProcessor),
        MessageClass::ApplicationCommandHandler => Some(&ApplicationCommandProcessor),
        MessageClass::ApplicationUpdate => Some(&ApplicationUpdateProcessor),
        MessageClass::RequestNodeInfo => Some(&RequestNodeInfoProcessor),
        MessageClass::GetVersion => Some(&GetVersionProcessor),
        MessageClass::MemoryGetId => Some(&MemoryGetIdProcessor),
        MessageClass::SerialApiGetInitData => Some(&SerialApiGetInitDataProcessor),
        MessageClass::SerialApiGetCapabilities => Some(&SerialApiGetCapabilitiesProcessor),
        MessageClass::IdentifyNode => Some(&IdentifyNodeProcessor),
        MessageClass::GetSucNodeId => Some(&GetSucNodeIdProcessor),
        MessageClass::GetControllerCapabilities => Some(&GetControllerCapabilitiesProcessor),
        MessageClass::SerialApiSetTimeouts => Some(&SerialApiSetTimeoutsProcessor),
        MessageClass::SerialApiSoftReset => Some(&SerialApiSoftResetProcessor),
        MessageClass::SetDefault => Some(&SetDefaultProcessor),
        MessageClass::IsFailedNodeId => Some(&IsFailedNodeIdProcessor),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_classes() {
        for class in [
            MessageClass::SendData,
            MessageClass::ApplicationCommandHandler,
            MessageClass::ApplicationUpdate,
            MessageClass::RequestNodeInfo,
            MessageClass::GetVersion,
            MessageClass::MemoryGetId,
            MessageClass::SerialApiGetInitData,
            MessageClass::SerialApiGetCapabilities,
            MessageClass::IdentifyNode,
            MessageClass::GetSucNodeId,
            MessageClass::GetControllerCapabilities,
            MessageClass::SerialApiSetTimeouts,
            MessageClass::SerialApiSoftReset,
            MessageClass::SetDefault,
            MessageClass::IsFailedNodeId,
        ] {
            assert!(processor_for(class).is_some(), "{} should have a processor", class);
        }
    }

    #[test]
    fn test_unregistered_classes() {
        // SUC and topology management are not handled
        assert!(processor_for(MessageClass::SetSucNodeId).is_none());
        assert!(processor_for(MessageClass::EnableSuc).is_none());
        assert!(processor_for(MessageClass::Unknown(0xF0)).is_none());
    }
}
