//! Event printing.

use crossbeam_channel::Receiver;
use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use tracing::warn;
use zwave_controller::{ValueKind, ZWaveEvent};

/// Output format for [`spawn_event_printer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

fn describe_kind(kind: &ValueKind) -> String {
    match kind {
        ValueKind::Basic => "basic".to_string(),
        ValueKind::Switch => "switch".to_string(),
        ValueKind::Level => "level".to_string(),
        ValueKind::SensorBinary { sensor_type } => format!("binary sensor {}", sensor_type),
        ValueKind::Sensor { sensor_type, scale } => format!("sensor {} (scale {})", sensor_type, scale),
        ValueKind::Setpoint { setpoint_type, scale } => format!("setpoint {} (scale {})", setpoint_type, scale),
        ValueKind::Battery => "battery".to_string(),
    }
}

/// Render one event as a single line.
pub fn format_event(event: &ZWaveEvent, format: EventFormat) -> String {
    if format == EventFormat::Json {
        match serde_json::to_string(event) {
            Ok(line) => return line,
            Err(e) => warn!("Cannot serialize event: {}", e),
        }
    }

    match event {
        ZWaveEvent::ValueChanged(value) => format!(
            "node {} endpoint {}: {} = {}",
            value.node_id,
            value.endpoint,
            describe_kind(&value.kind),
            value.value
        ),
        ZWaveEvent::TransactionCompleted { id, node_id, message_class } => {
            format!("node {}: transaction {} ({}) completed", node_id, id, message_class)
        }
        ZWaveEvent::TransactionFailed { id, node_id, message_class, reason } => {
            format!("node {}: transaction {} ({}) failed: {}", node_id, id, message_class, reason)
        }
        ZWaveEvent::NodeInfoReceived { node_id, command_classes } => {
            format!("node {}: command classes {:02X?}", node_id, command_classes)
        }
        ZWaveEvent::VersionReport { node_id, library_type, protocol_version, application_version } => format!(
            "node {}: library {}, protocol {}, application {}",
            node_id, library_type, protocol_version, application_version
        ),
        ZWaveEvent::CommandClassVersion { node_id, command_class, version } => {
            format!("node {}: command class 0x{:02X} at version {}", node_id, command_class, version)
        }
        ZWaveEvent::NodeFailureStatus { node_id, failed } => {
            format!("node {}: {}", node_id, if *failed { "failed" } else { "alive" })
        }
    }
}

/// Print events on a dedicated thread until every sender is gone.
///
/// The handle yields the number of events printed.
pub fn spawn_event_printer(events: Receiver<ZWaveEvent>, format: EventFormat) -> io::Result<JoinHandle<usize>> {
    thread::Builder::new().name("zwave-events".to_string()).spawn(move || {
        let stdout = io::stdout();
        let mut printed = 0;
        for event in events.iter() {
            let mut out = stdout.lock();
            if writeln!(out, "{}", format_event(&event, format)).is_err() {
                break;
            }
            printed += 1;
        }
        printed
    })
}
