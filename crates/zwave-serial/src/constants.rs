//! Protocol constants
//!
//! These constants define the control bytes, frame layout limits and
//! message class codes used on the Z-Wave serial API.

// ============================================================================
// Control Bytes
// ============================================================================

/// Start of a data frame.
pub const SOF: u8 = 0x01;
/// Frame received and accepted.
pub const ACK: u8 = 0x06;
/// Frame received but rejected (bad checksum or length).
pub const NAK: u8 = 0x15;
/// Frame dropped because of a collision; the sender should retransmit.
pub const CAN: u8 = 0x18;

// ============================================================================
// Frame Layout
// ============================================================================

/// Smallest legal value of the length byte (type + class + checksum).
pub const MIN_LENGTH_BYTE: u8 = 3;
/// Number of bytes in a frame that are not covered by the length byte.
pub const FRAME_OVERHEAD: usize = 2;
/// Smallest complete frame on the wire.
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD + MIN_LENGTH_BYTE as usize;
/// Largest payload that still fits in a single length byte.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - MIN_LENGTH_BYTE as usize;
/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + u8::MAX as usize;

// ============================================================================
// Message Types
// ============================================================================

/// Host to stick request, or unsolicited stick to host request.
pub const MESSAGE_TYPE_REQUEST: u8 = 0x00;
/// Synchronous reply to a request.
pub const MESSAGE_TYPE_RESPONSE: u8 = 0x01;

// ============================================================================
// Message Class Codes (serial API function ids)
// ============================================================================

/// Get the init data (API version, capabilities, node bitmap).
pub const FUNC_SERIAL_API_GET_INIT_DATA: u8 = 0x02;
/// Application command received from a node.
pub const FUNC_APPLICATION_COMMAND_HANDLER: u8 = 0x04;
/// Get the controller capability flags.
pub const FUNC_GET_CONTROLLER_CAPABILITIES: u8 = 0x05;
/// Set the serial API RX timeouts.
pub const FUNC_SERIAL_API_SET_TIMEOUTS: u8 = 0x06;
/// Get the serial API capabilities (application version, manufacturer).
pub const FUNC_SERIAL_API_GET_CAPABILITIES: u8 = 0x07;
/// Soft reset of the stick.
pub const FUNC_SERIAL_API_SOFT_RESET: u8 = 0x08;
/// Send data to a node.
pub const FUNC_SEND_DATA: u8 = 0x13;
/// Get the controller library version.
pub const FUNC_GET_VERSION: u8 = 0x15;
/// Get the home id and controller node id.
pub const FUNC_MEMORY_GET_ID: u8 = 0x20;
/// Get the protocol info of a node.
pub const FUNC_IDENTIFY_NODE: u8 = 0x41;
/// Reset the controller to factory defaults.
pub const FUNC_SET_DEFAULT: u8 = 0x42;
/// Assign a return route to a node.
pub const FUNC_ASSIGN_RETURN_ROUTE: u8 = 0x46;
/// Delete the return routes of a node.
pub const FUNC_DELETE_RETURN_ROUTE: u8 = 0x47;
/// Ask a node to update its neighbour list.
pub const FUNC_REQUEST_NODE_NEIGHBOR_UPDATE: u8 = 0x48;
/// Application update notification (node info frames).
pub const FUNC_APPLICATION_UPDATE: u8 = 0x49;
/// Start or stop inclusion.
pub const FUNC_ADD_NODE_TO_NETWORK: u8 = 0x4A;
/// Start or stop exclusion.
pub const FUNC_REMOVE_NODE_FROM_NETWORK: u8 = 0x4B;
/// Assign the SUC return route to a node.
pub const FUNC_ASSIGN_SUC_RETURN_ROUTE: u8 = 0x51;
/// Enable the SUC functionality.
pub const FUNC_ENABLE_SUC: u8 = 0x52;
/// Set the SUC node id.
pub const FUNC_SET_SUC_NODE_ID: u8 = 0x54;
/// Get the SUC node id.
pub const FUNC_GET_SUC_NODE_ID: u8 = 0x56;
/// Request the node information frame of a node.
pub const FUNC_REQUEST_NODE_INFO: u8 = 0x60;
/// Remove a failed node.
pub const FUNC_REMOVE_FAILED_NODE_ID: u8 = 0x61;
/// Check whether a node is marked as failed.
pub const FUNC_IS_FAILED_NODE_ID: u8 = 0x62;
/// Get the routing table line of a node.
pub const FUNC_GET_ROUTING_INFO: u8 = 0x80;

// ============================================================================
// SendData
// ============================================================================

/// Request an ACK from the destination node.
pub const TRANSMIT_OPTION_ACK: u8 = 0x01;
/// Allow the stick to use automatic routing.
pub const TRANSMIT_OPTION_AUTO_ROUTE: u8 = 0x04;
/// Allow explorer frames as a last resort.
pub const TRANSMIT_OPTION_EXPLORE: u8 = 0x20;
/// Default transmit options used for SendData.
pub const DEFAULT_TRANSMIT_OPTIONS: u8 =
    TRANSMIT_OPTION_ACK | TRANSMIT_OPTION_AUTO_ROUTE | TRANSMIT_OPTION_EXPLORE;

/// Transmission completed and acknowledged by the node.
pub const TRANSMIT_COMPLETE_OK: u8 = 0x00;
/// Transmission completed but the node did not acknowledge.
pub const TRANSMIT_COMPLETE_NO_ACK: u8 = 0x01;
/// Transmission failed.
pub const TRANSMIT_COMPLETE_FAIL: u8 = 0x02;
/// Transmission not possible because the routing is busy.
pub const TRANSMIT_COMPLETE_NOT_IDLE: u8 = 0x03;
/// Transmission failed, no route.
pub const TRANSMIT_COMPLETE_NOROUTE: u8 = 0x04;

// ============================================================================
// ApplicationUpdate
// ============================================================================

/// Node information frame received.
pub const UPDATE_STATE_NODE_INFO_RECEIVED: u8 = 0x84;
/// Node information request accepted, frame not received yet.
pub const UPDATE_STATE_NODE_INFO_REQ_DONE: u8 = 0x82;
/// Node information request failed.
pub const UPDATE_STATE_NODE_INFO_REQ_FAILED: u8 = 0x81;
/// A node was added to the network.
pub const UPDATE_STATE_NEW_ID_ASSIGNED: u8 = 0x40;
/// A node was removed from the network.
pub const UPDATE_STATE_DELETE_DONE: u8 = 0x20;
/// SUC id changed.
pub const UPDATE_STATE_SUC_ID: u8 = 0x10;

// ============================================================================
// GetControllerCapabilities
// ============================================================================

/// The controller is a secondary controller.
pub const CONTROLLER_CAPABILITY_SECONDARY: u8 = 0x01;
/// The controller was included in a network it did not create.
pub const CONTROLLER_CAPABILITY_ON_OTHER_NETWORK: u8 = 0x02;
/// A SUC id server (SIS) is present in the network.
pub const CONTROLLER_CAPABILITY_SIS_PRESENT: u8 = 0x04;
/// The controller created the network.
pub const CONTROLLER_CAPABILITY_REAL_PRIMARY: u8 = 0x08;
/// The controller is the static update controller.
pub const CONTROLLER_CAPABILITY_SUC: u8 = 0x10;

// ============================================================================
// Network
// ============================================================================

/// Largest node id in a classic Z-Wave network.
pub const MAX_NODE_ID: u8 = 232;
/// Size of the node bitmap in SerialApiGetInitData.
pub const NODE_BITMAP_SIZE: usize = 29;
