//! Message types, message classes and the serial message wrapper.

use crate::constants::*;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction/kind of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A request (host to stick, or unsolicited stick to host).
    Request,
    /// A synchronous response to a request.
    Response,
}

impl MessageType {
    /// Wire code of this type.
    pub fn code(&self) -> u8 {
        match self {
            MessageType::Request => MESSAGE_TYPE_REQUEST,
            MessageType::Response => MESSAGE_TYPE_RESPONSE,
        }
    }

    /// Look up a type by wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            MESSAGE_TYPE_REQUEST => Some(MessageType::Request),
            MESSAGE_TYPE_RESPONSE => Some(MessageType::Response),
            _ => None,
        }
    }
}

/// Serial API function id carried in the class byte of a frame.
///
/// Codes that are not in the table decode to [`MessageClass::Unknown`] so
/// that an unexpected function id never prevents a frame from being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageClass {
    SerialApiGetInitData,
    ApplicationCommandHandler,
    GetControllerCapabilities,
    SerialApiSetTimeouts,
    SerialApiGetCapabilities,
    SerialApiSoftReset,
    SendData,
    GetVersion,
    MemoryGetId,
    IdentifyNode,
    SetDefault,
    AssignReturnRoute,
    DeleteReturnRoute,
    RequestNodeNeighborUpdate,
    ApplicationUpdate,
    AddNodeToNetwork,
    RemoveNodeFromNetwork,
    AssignSucReturnRoute,
    EnableSuc,
    SetSucNodeId,
    GetSucNodeId,
    RequestNodeInfo,
    RemoveFailedNodeId,
    IsFailedNodeId,
    GetRoutingInfo,
    /// A function id not in the table.
    Unknown(u8),
}

/// Immutable code/label table for every known message class.
const MESSAGE_CLASSES: &[(MessageClass, u8, &str)] = &[
    (MessageClass::SerialApiGetInitData, FUNC_SERIAL_API_GET_INIT_DATA, "SerialApiGetInitData"),
    (MessageClass::ApplicationCommandHandler, FUNC_APPLICATION_COMMAND_HANDLER, "ApplicationCommandHandler"),
    (MessageClass::GetControllerCapabilities, FUNC_GET_CONTROLLER_CAPABILITIES, "GetControllerCapabilities"),
    (MessageClass::SerialApiSetTimeouts, FUNC_SERIAL_API_SET_TIMEOUTS, "SerialApiSetTimeouts"),
    (MessageClass::SerialApiGetCapabilities, FUNC_SERIAL_API_GET_CAPABILITIES, "SerialApiGetCapabilities"),
    (MessageClass::SerialApiSoftReset, FUNC_SERIAL_API_SOFT_RESET, "SerialApiSoftReset"),
    (MessageClass::SendData, FUNC_SEND_DATA, "SendData"),
    (MessageClass::GetVersion, FUNC_GET_VERSION, "GetVersion"),
    (MessageClass::MemoryGetId, FUNC_MEMORY_GET_ID, "MemoryGetId"),
    (MessageClass::IdentifyNode, FUNC_IDENTIFY_NODE, "IdentifyNode"),
    (MessageClass::SetDefault, FUNC_SET_DEFAULT, "SetDefault"),
    (MessageClass::AssignReturnRoute, FUNC_ASSIGN_RETURN_ROUTE, "AssignReturnRoute"),
    (MessageClass::DeleteReturnRoute, FUNC_DELETE_RETURN_ROUTE, "DeleteReturnRoute"),
    (MessageClass::RequestNodeNeighborUpdate, FUNC_REQUEST_NODE_NEIGHBOR_UPDATE, "RequestNodeNeighborUpdate"),
    (MessageClass::ApplicationUpdate, FUNC_APPLICATION_UPDATE, "ApplicationUpdate"),
    (MessageClass::AddNodeToNetwork, FUNC_ADD_NODE_TO_NETWORK, "AddNodeToNetwork"),
    (MessageClass::RemoveNodeFromNetwork, FUNC_REMOVE_NODE_FROM_NETWORK, "RemoveNodeFromNetwork"),
    (MessageClass::AssignSucReturnRoute, FUNC_ASSIGN_SUC_RETURN_ROUTE, "AssignSucReturnRoute"),
    (MessageClass::EnableSuc, FUNC_ENABLE_SUC, "EnableSuc"),
    (MessageClass::SetSucNodeId, FUNC_SET_SUC_NODE_ID, "SetSucNodeId"),
    (MessageClass::GetSucNodeId, FUNC_GET_SUC_NODE_ID, "GetSucNodeId"),
    (MessageClass::RequestNodeInfo, FUNC_REQUEST_NODE_INFO, "RequestNodeInfo"),
    (MessageClass::RemoveFailedNodeId, FUNC_REMOVE_FAILED_NODE_ID, "RemoveFailedNodeId"),
    (MessageClass::IsFailedNodeId, FUNC_IS_FAILED_NODE_ID, "IsFailedNodeId"),
    (MessageClass::GetRoutingInfo, FUNC_GET_ROUTING_INFO, "GetRoutingInfo"),
];

impl MessageClass {
    /// Look up a class by function id.
    pub fn from_code(code: u8) -> Self {
        MESSAGE_CLASSES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(class, _, _)| *class)
            .unwrap_or(MessageClass::Unknown(code))
    }

    /// Look up a class by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        MESSAGE_CLASSES
            .iter()
            .find(|(_, _, l)| *l == label)
            .map(|(class, _, _)| *class)
    }

    /// Function id of this class.
    pub fn code(&self) -> u8 {
        match self {
            MessageClass::Unknown(code) => *code,
            known => MESSAGE_CLASSES
                .iter()
                .find(|(class, _, _)| class == known)
                .map(|(_, code, _)| *code)
                .unwrap_or_default(),
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        MESSAGE_CLASSES
            .iter()
            .find(|(class, _, _)| class == self)
            .map(|(_, _, label)| *label)
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageClass::Unknown(code) => write!(f, "Unknown(0x{:02X})", code),
            known => f.write_str(known.label()),
        }
    }
}

/// A frame together with the bookkeeping the engine needs to correlate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialMessage {
    /// Node the message is about (0 when it targets the controller itself).
    pub node_id: u8,
    /// Request or response.
    pub message_type: MessageType,
    /// Serial API function id.
    pub message_class: MessageClass,
    /// Function specific payload.
    pub payload: Vec<u8>,
    /// Class of the frame that completes the transaction started by this
    /// message. `None` for inbound messages.
    pub expected_reply: Option<MessageClass>,
    /// Callback id carried in the payload, if any.
    pub callback_id: Option<u8>,
    transaction_canceled: bool,
}

impl SerialMessage {
    /// Create an outbound request.
    pub fn request(node_id: u8, message_class: MessageClass, payload: Vec<u8>, expected_reply: MessageClass) -> Self {
        SerialMessage {
            node_id,
            message_type: MessageType::Request,
            message_class,
            payload,
            expected_reply: Some(expected_reply),
            callback_id: None,
            transaction_canceled: false,
        }
    }

    /// Create a controller-level request that completes on its own response.
    pub fn controller_request(message_class: MessageClass, payload: Vec<u8>) -> Self {
        Self::request(0, message_class, payload, message_class)
    }

    /// Wrap a decoded inbound frame.
    pub fn from_frame(frame: Frame) -> Self {
        SerialMessage {
            node_id: 0,
            message_type: frame.message_type,
            message_class: frame.message_class,
            payload: frame.payload,
            expected_reply: None,
            callback_id: None,
            transaction_canceled: false,
        }
    }

    /// Build the wire frame for this message.
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.message_type, self.message_class, self.payload.clone())
    }

    /// Payload byte at `offset`, if present.
    pub fn payload_byte(&self, offset: usize) -> Option<u8> {
        self.payload.get(offset).copied()
    }

    /// Whether a processor flagged this message as reporting a failed
    /// transmission.
    pub fn is_transaction_canceled(&self) -> bool {
        self.transaction_canceled
    }

    /// Flag this message as reporting a failed transmission.
    pub fn set_transaction_canceled(&mut self) {
        self.transaction_canceled = true;
    }
}

impl fmt::Display for SerialMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node={} type={:?} class={} payload=[",
            self.node_id, self.message_type, self.message_class
        )?;
        for (i, byte) in self.payload.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_str("]")
    }
}
