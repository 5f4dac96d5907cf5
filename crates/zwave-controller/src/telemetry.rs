//! Metric definitions.
//!
//! Counters are recorded through the `metrics` facade; nothing is exported
//! unless the embedding application installs a recorder. Call
//! [`describe_metrics`] once at startup to register descriptions.

use metrics::{describe_counter, Unit};

/// A counter declaration with its description.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub description: &'static str,
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn counter(name: &'static str, description: &'static str) -> Self {
        Metric { name, description, labels: &[] }
    }

    const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, Unit::Count, self.description);
    }
}

pub mod metric_defs {
    use super::Metric;

    // ========================================================================
    // Link
    // ========================================================================

    pub const FRAMES_RECEIVED: Metric =
        Metric::counter("zwave.link.frames_received", "Valid frames received from the stick")
            .with_labels(&["message_class"]);

    pub const FRAMES_SENT: Metric =
        Metric::counter("zwave.link.frames_sent", "Frames written to the stick, retransmissions included")
            .with_labels(&["message_class"]);

    pub const FRAME_ERRORS: Metric =
        Metric::counter("zwave.link.frame_errors", "Malformed frames answered with a NAK");

    // ========================================================================
    // Transactions
    // ========================================================================

    pub const RETRANSMISSIONS: Metric =
        Metric::counter("zwave.transaction.retransmissions", "Frames retransmitted after NAK, CAN or timeout");

    pub const TRANSACTIONS_COMPLETED: Metric =
        Metric::counter("zwave.transaction.completed", "Transactions completed by their expected reply")
            .with_labels(&["message_class"]);

    pub const TRANSACTION_TIMEOUTS: Metric =
        Metric::counter("zwave.transaction.timeouts", "Transactions failed after exhausting their retries")
            .with_labels(&["message_class"]);

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub const UNHANDLED_MESSAGES: Metric =
        Metric::counter("zwave.dispatch.unhandled", "Frames dropped because no processor handles their class")
            .with_labels(&["message_class"]);

    pub const EVENTS_PUBLISHED: Metric = Metric::counter("zwave.events.published", "Events delivered to subscribers");

    pub const EVENTS_DROPPED: Metric =
        Metric::counter("zwave.events.dropped", "Events dropped because a subscriber channel was full");

    /// Every metric in this module.
    pub const ALL: &[Metric] = &[
        FRAMES_RECEIVED,
        FRAMES_SENT,
        FRAME_ERRORS,
        RETRANSMISSIONS,
        TRANSACTIONS_COMPLETED,
        TRANSACTION_TIMEOUTS,
        UNHANDLED_MESSAGES,
        EVENTS_PUBLISHED,
        EVENTS_DROPPED,
    ];
}

/// Register descriptions for every metric.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique() {
        for (i, a) in metric_defs::ALL.iter().enumerate() {
            for b in &metric_defs::ALL[i + 1..] {
                assert_ne!(a.name, b.name);
            }
            assert!(a.name.starts_with("zwave."));
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
