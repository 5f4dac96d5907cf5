//! Transaction lifecycle.
//!
//! The serial link is half duplex and the stick cannot pipeline requests, so
//! exactly one transaction is in flight at a time. Everything else waits in
//! a FIFO queue.
//!
//! ```text
//!  enqueue ──► queue ──► start_next ──► in flight (ack_pending)
//!                                          │
//!                       ACK ──► on_ack ────┤ (ack_pending cleared)
//!                                          │
//!            reply frame ──► is_completed_by ──► complete
//!                                          │
//!     NAK/CAN/timeout ──► retry ───────────┴─► retransmit, or fail after N
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use zwave_serial::{MessageClass, SerialMessage};

/// Identifier assigned to a transaction when it is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An outbound message and its correlation state.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Transaction id.
    pub id: TransactionId,
    /// The message that was (or will be) sent.
    pub message: SerialMessage,
    /// When the message was last transmitted.
    pub sent_at: Option<Instant>,
    /// Retransmissions performed so far.
    pub retries: u32,
    /// True from transmission until the stick's link-level ACK.
    pub ack_pending: bool,
    /// Set once the expected reply has arrived.
    pub complete: bool,
}

impl Transaction {
    fn new(id: TransactionId, message: SerialMessage) -> Self {
        Transaction {
            id,
            message,
            sent_at: None,
            retries: 0,
            ack_pending: false,
            complete: false,
        }
    }

    /// Node the transaction addresses (0 for the controller itself).
    pub fn node_id(&self) -> u8 {
        self.message.node_id
    }

    /// Class of the frame that completes this transaction.
    pub fn expected_reply(&self) -> Option<MessageClass> {
        self.message.expected_reply
    }

    /// Whether `incoming` completes this transaction.
    ///
    /// Nothing completes a transaction while its ACK is pending. After that
    /// only a frame of the expected reply class that was not flagged as
    /// canceled does.
    pub fn is_completed_by(&self, incoming: &SerialMessage) -> bool {
        if self.ack_pending {
            return false;
        }
        match self.message.expected_reply {
            Some(expected) if expected == incoming.message_class => !incoming.is_transaction_canceled(),
            _ => false,
        }
    }
}

/// Result of applying the retry policy to the in-flight transaction.
#[derive(Debug)]
pub enum RetryOutcome {
    /// The in-flight transaction must be retransmitted.
    Retransmit(TransactionId),
    /// Retries are exhausted; the transaction has been removed.
    Failed(Transaction),
}

/// Serialises outbound requests and applies the retry policy.
#[derive(Debug)]
pub struct TransactionManager {
    queue: VecDeque<Transaction>,
    in_flight: Option<Transaction>,
    timeout: Duration,
    max_retries: u32,
    next_id: u64,
}

impl TransactionManager {
    /// Create a manager with the given reply timeout and retry limit.
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        TransactionManager {
            queue: VecDeque::new(),
            in_flight: None,
            timeout,
            max_retries,
            next_id: 1,
        }
    }

    /// Queue a message and return the id of its transaction.
    pub fn enqueue(&mut self, message: SerialMessage) -> TransactionId {
        let id = TransactionId(self.next_id);
        self.next_id += 1;
        tracing::trace!("Queueing transaction {}: {}", id, message);
        self.queue.push_back(Transaction::new(id, message));
        id
    }

    /// The transaction currently in flight.
    pub fn in_flight(&self) -> Option<&Transaction> {
        self.in_flight.as_ref()
    }

    /// Number of transactions waiting behind the in-flight one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is in flight and nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    /// Move the head of the queue in flight if the link is free.
    ///
    /// Returns the transaction that must now be transmitted.
    pub fn start_next(&mut self, now: Instant) -> Option<&Transaction> {
        if self.in_flight.is_some() {
            return None;
        }
        let mut transaction = self.queue.pop_front()?;
        transaction.sent_at = Some(now);
        transaction.ack_pending = true;
        tracing::debug!(
            "NODE {}: Starting transaction {} ({})",
            transaction.node_id(),
            transaction.id,
            transaction.message.message_class
        );
        self.in_flight = Some(transaction);
        self.in_flight.as_ref()
    }

    /// The stick acknowledged the in-flight frame.
    ///
    /// Returns false if no ACK was expected.
    pub fn on_ack(&mut self) -> bool {
        match self.in_flight.as_mut() {
            Some(transaction) if transaction.ack_pending => {
                transaction.ack_pending = false;
                true
            }
            _ => {
                tracing::debug!("Unexpected ACK with no frame awaiting acknowledgement");
                false
            }
        }
    }

    /// The stick rejected the in-flight frame (NAK) or dropped it (CAN).
    pub fn on_nak_or_can(&mut self, now: Instant) -> Option<RetryOutcome> {
        self.retry(now)
    }

    /// Apply the timeout to the in-flight transaction.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<RetryOutcome> {
        let sent_at = self.in_flight.as_ref()?.sent_at?;
        if now.duration_since(sent_at) < self.timeout {
            return None;
        }
        self.retry(now)
    }

    /// Whether `incoming` completes the in-flight transaction.
    pub fn is_completed_by(&self, incoming: &SerialMessage) -> bool {
        self.in_flight
            .as_ref()
            .map(|transaction| transaction.is_completed_by(incoming))
            .unwrap_or(false)
    }

    /// Finish the in-flight transaction so the next one can start.
    pub fn complete(&mut self) -> Option<Transaction> {
        let mut transaction = self.in_flight.take()?;
        transaction.complete = true;
        Some(transaction)
    }

    fn retry(&mut self, now: Instant) -> Option<RetryOutcome> {
        let transaction = self.in_flight.as_mut()?;
        if transaction.retries < self.max_retries {
            transaction.retries += 1;
            transaction.sent_at = Some(now);
            transaction.ack_pending = true;
            tracing::debug!(
                "NODE {}: Retransmitting transaction {} (retry {}/{})",
                transaction.node_id(),
                transaction.id,
                transaction.retries,
                self.max_retries
            );
            return Some(RetryOutcome::Retransmit(transaction.id));
        }

        let failed = self.in_flight.take()?;
        tracing::warn!(
            "NODE {}: Transaction {} failed after {} retries",
            failed.node_id(),
            failed.id,
            failed.retries
        );
        Some(RetryOutcome::Failed(failed))
    }
}
