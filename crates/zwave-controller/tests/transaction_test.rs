//! Integration tests for transaction sequencing, retries and timeouts.

use std::time::{Duration, Instant};
use zwave_controller::{Controller, ControllerConfig, ZWaveEvent};
use zwave_serial::{Frame, MessageClass, MessageType, SerialMessage, ACK, NAK};

fn config(max_retries: u32) -> ControllerConfig {
    ControllerConfig {
        transaction_timeout_ms: 100,
        max_retries,
        ..Default::default()
    }
}

fn request_bytes(class: MessageClass) -> Vec<u8> {
    Frame::new(MessageType::Request, class, vec![]).encode()
}

fn response_bytes(class: MessageClass, payload: Vec<u8>) -> Vec<u8> {
    Frame::new(MessageType::Response, class, payload).encode()
}

// ============================================================================
// Retries
// ============================================================================

#[test]
fn test_timeout_retransmits_then_fails() {
    let mut controller = Controller::new(config(2));
    let events = controller.subscribe();
    let id = controller.submit(SerialMessage::controller_request(MessageClass::GetVersion, vec![]));

    let start = Instant::now();
    controller.poll(start);
    let first = controller.take_outbound();
    assert_eq!(first, request_bytes(MessageClass::GetVersion));

    // Each timeout retransmits the same frame.
    for step in 1..=2 {
        controller.poll(start + Duration::from_millis(100 * step));
        assert_eq!(controller.take_outbound(), first, "retry {} should resend the frame", step);
        assert!(events.try_recv().is_err());
    }

    controller.poll(start + Duration::from_millis(300));
    assert!(controller.take_outbound().is_empty());
    assert!(controller.is_idle());

    match events.try_recv().expect("should publish a failure") {
        ZWaveEvent::TransactionFailed { id: failed, message_class, reason, .. } => {
            assert_eq!(failed, id);
            assert_eq!(message_class, MessageClass::GetVersion);
            assert!(reason.contains("2 retries"), "unexpected reason: {}", reason);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_poll_before_timeout_does_nothing() {
    let mut controller = Controller::new(config(3));
    controller.submit(SerialMessage::controller_request(MessageClass::GetVersion, vec![]));

    let start = Instant::now();
    controller.poll(start);
    controller.take_outbound();
    controller.poll(start + Duration::from_millis(99));

    assert!(controller.take_outbound().is_empty());
    assert_eq!(controller.in_flight().map(|t| t.retries), Some(0));
}

#[test]
fn test_nak_retransmits_immediately() {
    let mut controller = Controller::new(config(3));
    controller.submit(SerialMessage::controller_request(MessageClass::MemoryGetId, vec![]));

    let now = Instant::now();
    controller.poll(now);
    let first = controller.take_outbound();

    controller.receive(&[NAK], now);

    assert_eq!(controller.take_outbound(), first);
    let transaction = controller.in_flight().expect("transaction should stay in flight");
    assert_eq!(transaction.retries, 1);
    assert!(transaction.ack_pending);
}

#[test]
fn test_failure_starts_next_transaction() {
    let mut controller = Controller::new(config(0));
    controller.submit(SerialMessage::controller_request(MessageClass::GetVersion, vec![]));
    controller.submit(SerialMessage::controller_request(MessageClass::MemoryGetId, vec![]));

    let start = Instant::now();
    controller.poll(start);
    controller.take_outbound();
    controller.poll(start + Duration::from_millis(100));

    assert_eq!(controller.take_outbound(), request_bytes(MessageClass::MemoryGetId));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_transactions_run_in_fifo_order() {
    let mut controller = Controller::new(config(3));
    let events = controller.subscribe();
    let ids = vec![
        controller.submit(SerialMessage::controller_request(MessageClass::GetVersion, vec![])),
        controller.submit(SerialMessage::controller_request(MessageClass::MemoryGetId, vec![])),
        controller.submit(SerialMessage::controller_request(MessageClass::GetSucNodeId, vec![])),
    ];

    let now = Instant::now();
    controller.poll(now);
    assert_eq!(controller.take_outbound(), request_bytes(MessageClass::GetVersion));
    assert_eq!(controller.queued(), 2);

    let mut version = b"Z-Wave 4.05\0".to_vec();
    version.push(0x01);
    let replies = [
        response_bytes(MessageClass::GetVersion, version),
        response_bytes(MessageClass::MemoryGetId, vec![0xC0, 0xFF, 0xEE, 0x01, 0x01]),
        response_bytes(MessageClass::GetSucNodeId, vec![0x00]),
    ];
    let next = [Some(MessageClass::MemoryGetId), Some(MessageClass::GetSucNodeId), None];

    for (reply, next) in replies.iter().zip(next) {
        let mut bytes = vec![ACK];
        bytes.extend_from_slice(reply);
        controller.receive(&bytes, now);

        let mut expected = vec![ACK];
        if let Some(class) = next {
            expected.extend(request_bytes(class));
        }
        assert_eq!(controller.take_outbound(), expected);
    }

    let completed: Vec<_> = events
        .try_iter()
        .filter_map(|event| match event {
            ZWaveEvent::TransactionCompleted { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(completed, ids);
    assert_eq!(controller.controller_info().home_id, Some(0xC0FF_EE01));
    assert!(controller.is_idle());
}

#[test]
fn test_response_before_ack_does_not_complete() {
    let mut controller = Controller::new(config(3));
    controller.submit(SerialMessage::controller_request(MessageClass::GetSucNodeId, vec![]));

    let now = Instant::now();
    controller.poll(now);
    controller.take_outbound();
    controller.receive(&response_bytes(MessageClass::GetSucNodeId, vec![0x01]), now);

    assert!(controller.in_flight().is_some());
    assert_eq!(controller.controller_info().suc_node_id, Some(1));
}

#[test]
fn test_unrelated_response_does_not_complete() {
    let mut controller = Controller::new(config(3));
    controller.submit(SerialMessage::controller_request(MessageClass::MemoryGetId, vec![]));

    let now = Instant::now();
    controller.poll(now);
    controller.take_outbound();

    let mut bytes = vec![ACK];
    bytes.extend(response_bytes(MessageClass::GetSucNodeId, vec![0x01]));
    controller.receive(&bytes, now);

    let transaction = controller.in_flight().expect("transaction should stay in flight");
    assert_eq!(transaction.message.message_class, MessageClass::MemoryGetId);
}
