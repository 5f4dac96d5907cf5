//! The controller facade.
//!
//! [`Controller`] owns the link layer, the transaction manager and the node
//! registry. It does no I/O: the caller passes received bytes and the
//! current time in, and writes out whatever [`Controller::take_outbound`]
//! returns.

use crate::command_class::{
    CommandClassKind, CommandDescriptor, LibraryType, COMMAND_CLASS_VERSION, VERSION_COMMAND_CLASS_GET,
};
use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::event::ZWaveEvent;
use crate::node::{NodeRegistry, NodeSnapshot};
use crate::processor::{processor_for, FollowUp, ProcessorContext};
use crate::telemetry::metric_defs;
use crate::transaction::{RetryOutcome, Transaction, TransactionId, TransactionManager};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use zwave_serial::{
    Frame, LinkEvent, LinkLayer, LinkStats, MessageClass, MessageType, SerialMessage, CONTROLLER_CAPABILITY_ON_OTHER_NETWORK,
    CONTROLLER_CAPABILITY_REAL_PRIMARY, CONTROLLER_CAPABILITY_SECONDARY, CONTROLLER_CAPABILITY_SIS_PRESENT,
    CONTROLLER_CAPABILITY_SUC,
};

/// What the stick reported about itself during initialisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Library version string, e.g. `Z-Wave 4.05`.
    pub library_version: Option<String>,
    pub library_type: Option<LibraryType>,
    pub home_id: Option<u32>,
    /// Node id of the controller itself.
    pub own_node_id: Option<u8>,
    pub serial_api_version: Option<u8>,
    pub serial_api_capabilities: u8,
    /// Serial API application version as `major.minor`.
    pub application_version: Option<String>,
    pub manufacturer_id: Option<u16>,
    pub product_type: Option<u16>,
    pub product_id: Option<u16>,
    /// Serial API function ids the stick implements.
    pub supported_functions: Vec<u8>,
    pub suc_node_id: Option<u8>,
    /// Flags from GetControllerCapabilities.
    pub controller_capabilities: Option<u8>,
}

impl ControllerInfo {
    /// Whether the stick reported support for `class`.
    pub fn supports_function(&self, class: MessageClass) -> bool {
        self.supported_functions.contains(&class.code())
    }

    fn has_capability(&self, flag: u8) -> bool {
        self.controller_capabilities.map_or(false, |flags| flags & flag != 0)
    }

    pub fn is_secondary(&self) -> bool {
        self.has_capability(CONTROLLER_CAPABILITY_SECONDARY)
    }

    pub fn is_on_other_network(&self) -> bool {
        self.has_capability(CONTROLLER_CAPABILITY_ON_OTHER_NETWORK)
    }

    /// A SUC id server is present in the network.
    pub fn has_sis(&self) -> bool {
        self.has_capability(CONTROLLER_CAPABILITY_SIS_PRESENT)
    }

    pub fn is_real_primary(&self) -> bool {
        self.has_capability(CONTROLLER_CAPABILITY_REAL_PRIMARY)
    }

    pub fn is_suc(&self) -> bool {
        self.has_capability(CONTROLLER_CAPABILITY_SUC)
    }
}

/// SendData payload: `[node, len, data.., tx options, callback id]`.
fn send_data_payload(node_id: u8, data: &[u8], tx_options: u8, callback_id: u8) -> ControllerResult<Vec<u8>> {
    let len = u8::try_from(data.len()).map_err(|_| {
        ControllerError::malformed(format!("NODE {}: command of {} bytes does not fit in SendData", node_id, data.len()))
    })?;
    let mut payload = Vec::with_capacity(data.len() + 4);
    payload.push(node_id);
    payload.push(len);
    payload.extend_from_slice(data);
    payload.push(tx_options);
    payload.push(callback_id);
    Ok(payload)
}

/// The command class key of a SendData carrying VERSION_COMMAND_CLASS_GET.
fn version_query_key(message: &SerialMessage) -> Option<u8> {
    if message.message_class != MessageClass::SendData {
        return None;
    }
    match message.payload.get(2..5)? {
        [COMMAND_CLASS_VERSION, VERSION_COMMAND_CLASS_GET, key] => Some(*key),
        _ => None,
    }
}

/// Timeouts are sent in units of 10 ms.
fn timeout_units(timeout: Duration) -> u8 {
    u8::try_from(timeout.as_millis() / 10).unwrap_or(u8::MAX)
}

/// A command to encode and send to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    pub node_id: u8,
    /// Command class key.
    pub command_class: u8,
    /// Endpoint, 0 for the root device.
    pub endpoint: u8,
    pub descriptor: CommandDescriptor,
}

impl EncodeRequest {
    /// A command for the root device of `node_id`.
    pub fn new(node_id: u8, command_class: u8, descriptor: CommandDescriptor) -> Self {
        EncodeRequest { node_id, command_class, endpoint: 0, descriptor }
    }

    /// Address an endpoint instead of the root device.
    pub fn with_endpoint(mut self, endpoint: u8) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// Sans-IO Z-Wave controller engine.
pub struct Controller {
    config: ControllerConfig,
    link: LinkLayer,
    transactions: TransactionManager,
    nodes: NodeRegistry,
    info: ControllerInfo,
    /// Encoded frames waiting to be written.
    outbound: Vec<u8>,
    subscribers: Vec<Sender<ZWaveEvent>>,
    next_callback_id: u8,
}

impl Controller {
    /// Create a controller.
    pub fn new(config: ControllerConfig) -> Self {
        Controller {
            link: LinkLayer::new(config.frame_timeout()),
            transactions: TransactionManager::new(config.transaction_timeout(), config.max_retries),
            nodes: NodeRegistry::new(),
            info: ControllerInfo::default(),
            outbound: Vec::new(),
            subscribers: Vec::new(),
            next_callback_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ========================================================================
    // Submitting Work
    // ========================================================================

    /// Queue the initialisation sequence.
    pub fn initialize(&mut self) -> Vec<TransactionId> {
        info!("Initialising controller");
        [
            MessageClass::GetVersion,
            MessageClass::MemoryGetId,
            MessageClass::SerialApiGetCapabilities,
            MessageClass::SerialApiGetInitData,
            MessageClass::GetControllerCapabilities,
            MessageClass::GetSucNodeId,
        ]
        .into_iter()
        .map(|class| self.submit(SerialMessage::controller_request(class, Vec::new())))
        .collect()
    }

    /// Queue a message. It is transmitted by the next [`poll`](Self::poll)
    /// or [`receive`](Self::receive) once the link is free.
    pub fn submit(&mut self, message: SerialMessage) -> TransactionId {
        self.transactions.enqueue(message)
    }

    /// Encode a command class command and queue it inside a SendData.
    pub fn send_command(&mut self, request: EncodeRequest) -> ControllerResult<TransactionId> {
        let node = self
            .nodes
            .get(request.node_id)
            .ok_or(ControllerError::UnknownNode(request.node_id))?;
        let data = node.encode_command(request.endpoint, request.command_class, &request.descriptor)?;

        let expected = if request.descriptor.expects_report() {
            MessageClass::ApplicationCommandHandler
        } else {
            MessageClass::SendData
        };
        let callback_id = self.next_callback_id();
        let payload = send_data_payload(request.node_id, &data, self.config.tx_options, callback_id)?;

        let mut message = SerialMessage::request(request.node_id, MessageClass::SendData, payload, expected);
        message.callback_id = Some(callback_id);

        debug!(
            "NODE {}: Queueing {} for command class 0x{:02X} endpoint {}",
            request.node_id,
            request.descriptor.name(),
            request.command_class,
            request.endpoint
        );
        Ok(self.submit(message))
    }

    /// Ask a node for its library type and protocol/application versions.
    pub fn request_version(&mut self, node_id: u8) -> ControllerResult<TransactionId> {
        self.send_command(EncodeRequest::new(node_id, COMMAND_CLASS_VERSION, CommandDescriptor::VersionGet))
    }

    /// Ask a node which version of one command class it implements.
    pub fn request_command_class_version(&mut self, node_id: u8, key: u8) -> ControllerResult<TransactionId> {
        CommandClassKind::from_key(key).ok_or(ControllerError::UnknownCommandClass(key))?;
        let node = self.nodes.get(node_id).ok_or(ControllerError::UnknownNode(node_id))?;
        if !node.supports(key) {
            return Err(ControllerError::UnsupportedCommandClass { node_id, key });
        }

        let id = self.send_command(EncodeRequest::new(
            node_id,
            COMMAND_CLASS_VERSION,
            CommandDescriptor::CommandClassVersionGet { command_class: key },
        ))?;
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.mark_version_requested(key);
        }
        Ok(id)
    }

    /// Queue a version query for every class of the node that is worth
    /// negotiating and has not been queried yet.
    pub fn negotiate_versions(&mut self, node_id: u8) -> ControllerResult<Vec<TransactionId>> {
        let node = self.nodes.get(node_id).ok_or(ControllerError::UnknownNode(node_id))?;
        if !node.supports_version_queries() {
            warn!("NODE {}: No VERSION command class, all command classes stay at version 1", node_id);
            return Ok(Vec::new());
        }

        let keys = node.classes_needing_negotiation();
        debug!("NODE {}: Negotiating versions of {} command classes", node_id, keys.len());
        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            match self.request_command_class_version(node_id, key) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("NODE {}: Cannot query version of 0x{:02X}: {}", node_id, key, e),
            }
        }
        Ok(ids)
    }

    /// Ask the stick for its controller capability flags.
    pub fn request_controller_capabilities(&mut self) -> TransactionId {
        self.submit(SerialMessage::controller_request(MessageClass::GetControllerCapabilities, Vec::new()))
    }

    /// Set the stick's ACK and inter-byte timeouts. Each is sent in 10 ms
    /// units and saturates at 2.55 s.
    pub fn set_serial_timeouts(&mut self, ack: Duration, byte: Duration) -> TransactionId {
        let payload = vec![timeout_units(ack), timeout_units(byte)];
        self.submit(SerialMessage::controller_request(MessageClass::SerialApiSetTimeouts, payload))
    }

    /// Restart the stick's firmware. The stick sends no reply, so the
    /// transaction completes on ACK.
    pub fn soft_reset(&mut self) -> TransactionId {
        let mut message = SerialMessage::controller_request(MessageClass::SerialApiSoftReset, Vec::new());
        message.expected_reply = None;
        self.submit(message)
    }

    /// Erase the stick's network and return it to factory defaults.
    pub fn set_default(&mut self) -> TransactionId {
        let callback_id = self.next_callback_id();
        let mut message = SerialMessage::controller_request(MessageClass::SetDefault, vec![callback_id]);
        message.callback_id = Some(callback_id);
        warn!("Resetting controller to factory defaults");
        self.submit(message)
    }

    /// Ask the stick whether it has `node_id` on its failed node list.
    pub fn check_node_failed(&mut self, node_id: u8) -> ControllerResult<TransactionId> {
        if self.nodes.get(node_id).is_none() {
            return Err(ControllerError::UnknownNode(node_id));
        }
        Ok(self.submit(SerialMessage::request(
            node_id,
            MessageClass::IsFailedNodeId,
            vec![node_id],
            MessageClass::IsFailedNodeId,
        )))
    }

    // ========================================================================
    // Driving the Link
    // ========================================================================

    /// Process bytes received from the stick.
    pub fn receive(&mut self, data: &[u8], now: Instant) {
        for event in self.link.push(data, now) {
            match event {
                LinkEvent::Ack => {
                    let awaiting_reply = self.transactions.in_flight().and_then(Transaction::expected_reply).is_some();
                    if self.transactions.on_ack() && !awaiting_reply {
                        self.finish_transaction();
                    }
                }
                LinkEvent::Nak | LinkEvent::Can => {
                    debug!("Stick rejected the last frame");
                    if let Some(outcome) = self.transactions.on_nak_or_can(now) {
                        self.apply_retry(outcome);
                    }
                }
                LinkEvent::Frame(frame) => self.handle_frame(frame),
                LinkEvent::FrameError(e) => {
                    let error = ControllerError::from(e);
                    warn!("Dropping frame: {}", error);
                    metrics::counter!(metric_defs::FRAME_ERRORS.name).increment(1);
                }
            }
        }
        self.pump(now);
    }

    /// Apply frame and transaction timeouts and start queued work.
    pub fn poll(&mut self, now: Instant) {
        if let Some(e) = self.link.expire(now) {
            warn!("Dropping partial frame: {}", e);
            metrics::counter!(metric_defs::FRAME_ERRORS.name).increment(1);
        }
        if let Some(outcome) = self.transactions.poll_timeout(now) {
            self.apply_retry(outcome);
        }
        self.pump(now);
    }

    /// Bytes to write to the stick: pending ACK/NAK replies, then frames.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        let mut bytes = self.link.take_control_replies();
        bytes.append(&mut self.outbound);
        bytes
    }

    /// Subscribe to events. Disconnected receivers are dropped on the next
    /// publish.
    pub fn subscribe(&mut self) -> Receiver<ZWaveEvent> {
        let (tx, rx) = crossbeam_channel::bounded(self.config.event_channel_capacity);
        self.subscribers.push(tx);
        rx
    }

    // ========================================================================
    // Snapshot Reads
    // ========================================================================

    /// Copy of a node's state.
    pub fn node(&self, node_id: u8) -> Option<NodeSnapshot> {
        self.nodes.get(node_id).map(|node| node.snapshot())
    }

    /// Ids of all known nodes.
    pub fn node_ids(&self) -> Vec<u8> {
        self.nodes.ids()
    }

    pub fn controller_info(&self) -> &ControllerInfo {
        &self.info
    }

    pub fn in_flight(&self) -> Option<&Transaction> {
        self.transactions.in_flight()
    }

    /// Number of transactions waiting behind the in-flight one.
    pub fn queued(&self) -> usize {
        self.transactions.queued()
    }

    pub fn is_idle(&self) -> bool {
        self.transactions.is_idle()
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.stats()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn next_callback_id(&mut self) -> u8 {
        let id = self.next_callback_id;
        self.next_callback_id = if id == u8::MAX { 1 } else { id + 1 };
        id
    }

    fn handle_frame(&mut self, frame: Frame) {
        let mut incoming = SerialMessage::from_frame(frame);
        let class = incoming.message_class;
        metrics::counter!(metric_defs::FRAMES_RECEIVED.name, "message_class" => class.label()).increment(1);

        let Some(processor) = processor_for(class) else {
            let error = ControllerError::UnhandledMessageClass(class);
            warn!("{}: {}", error, incoming);
            metrics::counter!(metric_defs::UNHANDLED_MESSAGES.name, "message_class" => class.label()).increment(1);
            return;
        };

        trace!("Dispatching {} to {}", incoming, processor.name());
        let last_sent = self.transactions.in_flight();
        let mut ctx = ProcessorContext::new(&mut self.nodes, &mut self.info, &self.config);
        let result = match incoming.message_type {
            MessageType::Response => processor.handle_response(&mut ctx, last_sent, &mut incoming),
            MessageType::Request => processor.handle_request(&mut ctx, last_sent, &mut incoming),
        };
        let outcome = ctx.finish();

        if let Err(e) = result {
            warn!("NODE {}: {} failed: {}", incoming.node_id, processor.name(), e);
        }

        if outcome.transaction_complete {
            self.finish_transaction();
        }

        for event in outcome.events {
            self.publish(event);
        }

        for follow_up in outcome.follow_ups {
            match follow_up {
                FollowUp::Send(message) => {
                    self.submit(message);
                }
                FollowUp::NegotiateVersions(node_id) => {
                    if let Err(e) = self.negotiate_versions(node_id) {
                        warn!("NODE {}: Version negotiation not started: {}", node_id, e);
                    }
                }
            }
        }
    }

    fn finish_transaction(&mut self) {
        if let Some(transaction) = self.transactions.complete() {
            debug!("NODE {}: Transaction {} complete", transaction.node_id(), transaction.id);
            metrics::counter!(
                metric_defs::TRANSACTIONS_COMPLETED.name,
                "message_class" => transaction.message.message_class.label()
            )
            .increment(1);
            self.publish(ZWaveEvent::TransactionCompleted {
                id: transaction.id,
                node_id: transaction.node_id(),
                message_class: transaction.message.message_class,
            });
        }
    }

    fn apply_retry(&mut self, outcome: RetryOutcome) {
        match outcome {
            RetryOutcome::Retransmit(id) => {
                if let Some(transaction) = self.transactions.in_flight() {
                    debug!("NODE {}: Retransmitting transaction {}", transaction.node_id(), id);
                    let frame = transaction.message.to_frame();
                    self.write_frame(&frame);
                    metrics::counter!(metric_defs::RETRANSMISSIONS.name).increment(1);
                }
            }
            RetryOutcome::Failed(transaction) => {
                let error = ControllerError::TransactionTimeout { id: transaction.id, retries: transaction.retries };
                warn!("NODE {}: {}", transaction.node_id(), error);
                metrics::counter!(
                    metric_defs::TRANSACTION_TIMEOUTS.name,
                    "message_class" => transaction.message.message_class.label()
                )
                .increment(1);
                if let Some(key) = version_query_key(&transaction.message) {
                    if let Some(node) = self.nodes.get_mut(transaction.node_id()) {
                        node.reset_version_request(key);
                    }
                }
                self.publish(ZWaveEvent::TransactionFailed {
                    id: transaction.id,
                    node_id: transaction.node_id(),
                    message_class: transaction.message.message_class,
                    reason: error.to_string(),
                });
            }
        }
    }

    /// Transmit the next queued transaction if nothing is in flight.
    fn pump(&mut self, now: Instant) {
        if let Some(transaction) = self.transactions.start_next(now) {
            let frame = transaction.message.to_frame();
            self.write_frame(&frame);
        }
    }

    fn write_frame(&mut self, frame: &Frame) {
        trace!("Sending {} ({} bytes)", frame.message_class, frame.payload.len());
        metrics::counter!(metric_defs::FRAMES_SENT.name, "message_class" => frame.message_class.label()).increment(1);
        self.outbound.extend_from_slice(&frame.encode());
    }

    fn publish(&mut self, event: ZWaveEvent) {
        trace!("Publishing {:?}", event);
        self.subscribers.retain(|subscriber| match subscriber.try_send(event.clone()) {
            Ok(()) => {
                metrics::counter!(metric_defs::EVENTS_PUBLISHED.name).increment(1);
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber channel full, dropping event");
                metrics::counter!(metric_defs::EVENTS_DROPPED.name).increment(1);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
