//! Node model.
//!
//! Nodes live in a [`NodeRegistry`] arena indexed by node id. Each node owns
//! its command class entries, keyed by command class key, together with the
//! version negotiation state of every entry.

use crate::command_class::{
    encapsulate, unwrap_encapsulation, CommandClass, CommandClassKind, CommandDescriptor, Handled,
    ManufacturerInfo, NodeVersion, COMMAND_CLASS_MARK, COMMAND_CLASS_MULTI_INSTANCE, COMMAND_CLASS_VERSION,
};
use crate::error::{ControllerError, ControllerResult};
use crate::event::{ValueEvent, ZWaveEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, trace};
use zwave_serial::MAX_NODE_ID;

// ============================================================================
// Command Class Entries
// ============================================================================

/// Version negotiation state of one command class on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationState {
    /// Not queried yet; the class is used at version 1.
    VersionUnknown,
    /// A version query is queued or in flight.
    VersionRequested,
    /// The node answered; the effective version is stored.
    VersionNegotiated(u8),
}

/// A command class supported by a node.
#[derive(Debug, Clone)]
pub struct CommandClassEntry {
    pub kind: CommandClassKind,
    /// Effective version, 1 until negotiated.
    pub version: u8,
    pub negotiation: NegotiationState,
    /// The node answered the version query with 0.
    pub version_zero_reported: bool,
    pub capability: CommandClass,
}

impl CommandClassEntry {
    fn new(kind: CommandClassKind) -> Self {
        CommandClassEntry {
            kind,
            version: 1,
            negotiation: NegotiationState::VersionUnknown,
            version_zero_reported: false,
            capability: kind.capability(),
        }
    }

    /// Highest version this crate implements for the class.
    pub fn max_version(&self) -> u8 {
        self.kind.max_version()
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node on the network.
#[derive(Debug, Clone)]
pub struct Node {
    id: u8,
    listening: bool,
    basic_class: u8,
    generic_class: u8,
    specific_class: u8,
    node_info_received: bool,
    failed: bool,
    version: Option<NodeVersion>,
    manufacturer: Option<ManufacturerInfo>,
    command_classes: BTreeMap<u8, CommandClassEntry>,
}

impl Node {
    /// Create a node that supports only NO_OPERATION.
    pub fn new(id: u8) -> Self {
        let mut command_classes = BTreeMap::new();
        let no_op = CommandClassEntry::new(CommandClassKind::NoOperation);
        command_classes.insert(no_op.kind.key(), no_op);

        Node {
            id,
            listening: false,
            basic_class: 0,
            generic_class: 0,
            specific_class: 0,
            node_info_received: false,
            failed: false,
            version: None,
            manufacturer: None,
            command_classes,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Whether the node keeps its receiver on.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Whether the controller considers the node failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    /// Library and firmware versions, once reported.
    pub fn version(&self) -> Option<&NodeVersion> {
        self.version.as_ref()
    }

    /// Record the protocol info returned by IdentifyNode.
    pub fn set_protocol_info(&mut self, listening: bool, basic: u8, generic: u8, specific: u8) {
        self.listening = listening;
        self.basic_class = basic;
        self.generic_class = generic;
        self.specific_class = specific;
    }

    /// Record the device classes carried by a node information frame.
    pub fn set_device_classes(&mut self, basic: u8, generic: u8, specific: u8) {
        self.basic_class = basic;
        self.generic_class = generic;
        self.specific_class = specific;
        self.node_info_received = true;
    }

    /// Register the command classes listed in a node information frame.
    ///
    /// Keys after the support/control mark are controlled, not supported,
    /// and are skipped. Returns the supported keys as announced.
    pub fn register_command_classes(&mut self, keys: &[u8]) -> Vec<u8> {
        let supported: Vec<u8> = keys.iter().copied().take_while(|&k| k != COMMAND_CLASS_MARK).collect();

        for &key in &supported {
            match CommandClassKind::from_key(key) {
                Some(kind) => {
                    if !self.command_classes.contains_key(&key) {
                        trace!("NODE {}: Adding command class {}", self.id, kind);
                        self.command_classes.insert(key, CommandClassEntry::new(kind));
                    }
                }
                None => debug!("NODE {}: Skipping unknown command class 0x{:02X}", self.id, key),
            }
        }
        supported
    }

    pub fn supports(&self, key: u8) -> bool {
        self.command_classes.contains_key(&key)
    }

    pub fn command_class(&self, key: u8) -> Option<&CommandClassEntry> {
        self.command_classes.get(&key)
    }

    /// Keys of classes whose version is worth negotiating and that have not
    /// been queried yet.
    pub fn classes_needing_negotiation(&self) -> Vec<u8> {
        self.command_classes
            .iter()
            .filter(|(_, entry)| entry.max_version() > 1 && entry.negotiation == NegotiationState::VersionUnknown)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Note that a version query for `key` has been queued.
    pub fn mark_version_requested(&mut self, key: u8) {
        if let Some(entry) = self.command_classes.get_mut(&key) {
            entry.negotiation = NegotiationState::VersionRequested;
        }
    }

    /// Allow a class whose version query failed to be queried again.
    pub fn reset_version_request(&mut self, key: u8) {
        if let Some(entry) = self.command_classes.get_mut(&key) {
            if entry.negotiation == NegotiationState::VersionRequested {
                entry.negotiation = NegotiationState::VersionUnknown;
            }
        }
    }

    /// Apply a command class version report.
    ///
    /// A reported version of 0 keeps the class at version 1. Versions above
    /// what this crate implements are clamped. Returns the effective version.
    pub fn negotiate_version(&mut self, key: u8, reported: u8) -> ControllerResult<u8> {
        let kind = CommandClassKind::from_key(key).ok_or(ControllerError::UnknownCommandClass(key))?;
        let node_id = self.id;
        let entry = self
            .command_classes
            .get_mut(&key)
            .ok_or(ControllerError::UnsupportedCommandClass { node_id, key })?;

        let max = kind.max_version();
        let version = if reported == 0 {
            info!(
                "NODE {}: Reported version 0 for {}, keeping it at version 1",
                node_id, kind
            );
            entry.version_zero_reported = true;
            1
        } else if reported > max {
            debug!(
                "NODE {}: {} version {} is above implemented version {}, extra functionality not enabled",
                node_id, kind, reported, max
            );
            max
        } else {
            reported
        };

        debug!("NODE {}: {} negotiated at version {}", node_id, kind, version);
        entry.version = version;
        entry.negotiation = NegotiationState::VersionNegotiated(version);
        Ok(version)
    }

    /// Interpret an application command received from this node.
    ///
    /// `data` starts with the command class key. Multi instance
    /// encapsulation is removed and the source endpoint carried into the
    /// events.
    pub fn handle_command(&mut self, endpoint: u8, data: &[u8]) -> ControllerResult<Vec<ZWaveEvent>> {
        if let Some((source, inner)) = unwrap_encapsulation(data)? {
            trace!("NODE {}: Unwrapped command for endpoint {}", self.id, source);
            return self.handle_command(source, inner);
        }

        let (&key, rest) = data
            .split_first()
            .ok_or_else(|| ControllerError::too_short("application command", 2, data.len()))?;
        let kind = CommandClassKind::from_key(key).ok_or(ControllerError::UnknownCommandClass(key))?;
        let node_id = self.id;
        let entry = self
            .command_classes
            .get_mut(&key)
            .ok_or(ControllerError::UnsupportedCommandClass { node_id, key })?;

        let events = match entry.capability.handle(rest)? {
            Handled::Values(values) => values
                .into_iter()
                .map(|(kind, value)| {
                    ZWaveEvent::ValueChanged(ValueEvent { node_id, command_class: key, endpoint, kind, value })
                })
                .collect(),
            Handled::VersionReport(version) => {
                debug!(
                    "NODE {}: Library {}, protocol {}, application {}",
                    node_id, version.library_type, version.protocol_version, version.application_version
                );
                self.version = Some(version.clone());
                vec![ZWaveEvent::VersionReport {
                    node_id,
                    library_type: version.library_type,
                    protocol_version: version.protocol_version,
                    application_version: version.application_version,
                }]
            }
            Handled::CommandClassVersion { key: reported_key, version } => {
                let version = self.negotiate_version(reported_key, version)?;
                vec![ZWaveEvent::CommandClassVersion { node_id, command_class: reported_key, version }]
            }
            Handled::Manufacturer(manufacturer) => {
                debug!(
                    "NODE {}: Manufacturer 0x{:04X}, type 0x{:04X}, id 0x{:04X}",
                    node_id, manufacturer.manufacturer_id, manufacturer.device_type, manufacturer.device_id
                );
                self.manufacturer = Some(manufacturer);
                Vec::new()
            }
            Handled::Ignored => {
                trace!("NODE {}: {} command handled without events", node_id, kind);
                Vec::new()
            }
        };
        Ok(events)
    }

    /// Build the application payload for a command, wrapped for `endpoint`
    /// when it is not the root device.
    pub fn encode_command(&self, endpoint: u8, key: u8, command: &CommandDescriptor) -> ControllerResult<Vec<u8>> {
        CommandClassKind::from_key(key).ok_or(ControllerError::UnknownCommandClass(key))?;
        let entry = self
            .command_classes
            .get(&key)
            .ok_or(ControllerError::UnsupportedCommandClass { node_id: self.id, key })?;
        let payload = entry.capability.encode(entry.version, command)?;

        if endpoint == 0 {
            return Ok(payload);
        }
        let multi = self.command_classes.get(&COMMAND_CLASS_MULTI_INSTANCE).ok_or(
            ControllerError::UnsupportedCommandClass { node_id: self.id, key: COMMAND_CLASS_MULTI_INSTANCE },
        )?;
        Ok(encapsulate(multi.version, endpoint, &payload))
    }

    /// Whether the node can answer version queries.
    pub fn supports_version_queries(&self) -> bool {
        self.supports(COMMAND_CLASS_VERSION)
    }

    /// Read-only copy of the node's state.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            listening: self.listening,
            basic_class: self.basic_class,
            generic_class: self.generic_class,
            specific_class: self.specific_class,
            node_info_received: self.node_info_received,
            failed: self.failed,
            version: self.version.clone(),
            manufacturer: self.manufacturer,
            command_classes: self
                .command_classes
                .iter()
                .map(|(key, entry)| CommandClassSnapshot {
                    key: *key,
                    kind: entry.kind,
                    version: entry.version,
                    max_version: entry.max_version(),
                    negotiation: entry.negotiation,
                    version_zero_reported: entry.version_zero_reported,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Read-only view of a command class entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandClassSnapshot {
    pub key: u8,
    pub kind: CommandClassKind,
    pub version: u8,
    pub max_version: u8,
    pub negotiation: NegotiationState,
    pub version_zero_reported: bool,
}

/// Read-only view of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: u8,
    pub listening: bool,
    pub basic_class: u8,
    pub generic_class: u8,
    pub specific_class: u8,
    pub node_info_received: bool,
    pub failed: bool,
    pub version: Option<NodeVersion>,
    pub manufacturer: Option<ManufacturerInfo>,
    pub command_classes: Vec<CommandClassSnapshot>,
}

impl NodeSnapshot {
    pub fn command_class(&self, key: u8) -> Option<&CommandClassSnapshot> {
        self.command_classes.iter().find(|cc| cc.key == key)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Arena of nodes indexed by node id.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Option<Node>>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        NodeRegistry {
            nodes: (0..=MAX_NODE_ID).map(|_| None).collect(),
        }
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u8) -> Option<&Node> {
        self.nodes.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Node> {
        self.nodes.get_mut(id as usize)?.as_mut()
    }

    /// The node with `id`, created if it does not exist yet.
    pub fn get_or_insert(&mut self, id: u8) -> ControllerResult<&mut Node> {
        if id == 0 {
            return Err(ControllerError::UnknownNode(id));
        }
        let slot = self.nodes.get_mut(id as usize).ok_or(ControllerError::UnknownNode(id))?;
        Ok(slot.get_or_insert_with(|| {
            debug!("NODE {}: Created", id);
            Node::new(id)
        }))
    }

    /// Ids of all registered nodes in ascending order.
    pub fn ids(&self) -> Vec<u8> {
        self.iter().map(|node| node.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    /// Forget every node.
    pub fn clear(&mut self) {
        self.nodes.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
