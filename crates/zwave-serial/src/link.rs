//! Byte-stream link layer.
//!
//! The link layer accumulates bytes read from the UART into frames, reports
//! the single-byte ACK/NAK/CAN control bytes, and queues the control replies
//! the host owes the stick: an ACK for every valid frame and a NAK for every
//! malformed one. After a malformed frame it discards what it has buffered
//! and waits for the next start-of-frame byte.

use crate::constants::*;
use crate::error::FrameError;
use crate::frame::Frame;
use bytes::BytesMut;
use std::time::{Duration, Instant};

/// Default time a partially received frame may sit in the buffer.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(1500);

/// Receive state of the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Waiting for SOF or a control byte.
    AwaitingStartOfFrame,
    /// SOF seen, collecting the rest of the frame.
    AccumulatingFrame,
    /// All bytes of a frame are buffered and it is being validated.
    FrameComplete,
}

/// Something the link layer observed on the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The stick accepted our last frame.
    Ack,
    /// The stick rejected our last frame.
    Nak,
    /// The stick dropped our last frame because of a collision.
    Can,
    /// A valid frame was received (an ACK has been queued).
    Frame(Frame),
    /// A malformed frame was received (a NAK has been queued).
    FrameError(FrameError),
}

/// Link layer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Valid frames received.
    pub frames_received: u64,
    /// Malformed frames rejected with a NAK.
    pub frame_errors: u64,
    /// Partial frames dropped by the inter-byte timeout.
    pub frame_timeouts: u64,
    /// Stray bytes discarded while waiting for SOF.
    pub discarded_bytes: u64,
}

/// Frame assembler and control-byte detector.
#[derive(Debug)]
pub struct LinkLayer {
    state: LinkState,
    /// Bytes of the frame being accumulated, SOF included.
    buffer: BytesMut,
    /// When the current frame started arriving.
    frame_started: Option<Instant>,
    frame_timeout: Duration,
    /// ACK/NAK bytes waiting to be written.
    control_replies: Vec<u8>,
    stats: LinkStats,
}

impl Default for LinkLayer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TIMEOUT)
    }
}

impl LinkLayer {
    /// Create a link layer with the given inter-byte frame timeout.
    pub fn new(frame_timeout: Duration) -> Self {
        LinkLayer {
            state: LinkState::AwaitingStartOfFrame,
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
            frame_started: None,
            frame_timeout,
            control_replies: Vec::new(),
            stats: LinkStats::default(),
        }
    }

    /// Current receive state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Counters since creation.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Number of bytes of the partial frame currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed received bytes and return what they contained, in arrival order.
    pub fn push(&mut self, data: &[u8], now: Instant) -> Vec<LinkEvent> {
        let mut events = Vec::new();

        for &byte in data {
            match self.state {
                LinkState::AwaitingStartOfFrame | LinkState::FrameComplete => match byte {
                    SOF => {
                        self.buffer.clear();
                        self.buffer.extend_from_slice(&[byte]);
                        self.frame_started = Some(now);
                        self.state = LinkState::AccumulatingFrame;
                    }
                    ACK => events.push(LinkEvent::Ack),
                    NAK => events.push(LinkEvent::Nak),
                    CAN => events.push(LinkEvent::Can),
                    other => {
                        log::trace!("Discarding stray byte 0x{:02X} while awaiting SOF", other);
                        self.stats.discarded_bytes += 1;
                    }
                },
                LinkState::AccumulatingFrame => {
                    self.buffer.extend_from_slice(&[byte]);

                    if self.buffer.len() == 2 && byte < MIN_LENGTH_BYTE {
                        let error = FrameError::LengthMismatch {
                            declared: byte as usize,
                            actual: MIN_LENGTH_BYTE as usize,
                        };
                        events.push(self.reject(error));
                        continue;
                    }

                    if self.buffer.len() >= 2 && self.buffer.len() == self.buffer[1] as usize + FRAME_OVERHEAD {
                        self.state = LinkState::FrameComplete;
                        events.push(self.complete_frame());
                    }
                }
            }
        }

        events
    }

    /// Drop a partial frame whose bytes stopped arriving.
    ///
    /// Returns the error reported for the dropped frame, if any.
    pub fn expire(&mut self, now: Instant) -> Option<FrameError> {
        let started = self.frame_started?;
        if self.state != LinkState::AccumulatingFrame || now.duration_since(started) < self.frame_timeout {
            return None;
        }

        log::debug!(
            "Frame timeout after {:?} with {} bytes buffered, resynchronising",
            self.frame_timeout,
            self.buffer.len()
        );
        self.stats.frame_timeouts += 1;
        let declared = self.buffer.get(1).map(|&b| b as usize).unwrap_or(0);
        let actual = self.buffer.len().saturating_sub(FRAME_OVERHEAD);
        self.resync();
        self.control_replies.push(NAK);
        Some(FrameError::LengthMismatch { declared, actual })
    }

    /// Take the ACK/NAK bytes queued for transmission.
    pub fn take_control_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.control_replies)
    }

    /// Discard any partial frame and wait for the next SOF.
    pub fn resync(&mut self) {
        self.buffer.clear();
        self.frame_started = None;
        self.state = LinkState::AwaitingStartOfFrame;
    }

    fn complete_frame(&mut self) -> LinkEvent {
        let len = self.buffer.len();
        let raw = self.buffer.split_to(len);
        match Frame::decode(&raw) {
            Ok(frame) => {
                log::trace!(
                    "Received frame: type={:?} class={} len={}",
                    frame.message_type,
                    frame.message_class,
                    frame.payload.len()
                );
                self.stats.frames_received += 1;
                self.control_replies.push(ACK);
                self.resync();
                LinkEvent::Frame(frame)
            }
            Err(error) => self.reject(error),
        }
    }

    fn reject(&mut self, error: FrameError) -> LinkEvent {
        log::warn!("Rejecting malformed frame: {}", error);
        self.stats.frame_errors += 1;
        self.resync();
        self.control_replies.push(NAK);
        LinkEvent::FrameError(error)
    }
}
