//! End-to-end tests: complete exchanges between the controller and a
//! scripted stick, from initialisation to node reports.

use std::time::Instant;
use zwave_controller::{
    CommandDescriptor, Controller, ControllerConfig, DecimalValue, EncodeRequest, LibraryType, ValueEvent,
    ValueKind, ZWaveEvent,
};
use zwave_serial::{Frame, MessageClass, MessageType, ACK};

fn frame(message_type: MessageType, class: MessageClass, payload: Vec<u8>) -> Vec<u8> {
    Frame::new(message_type, class, payload).encode()
}

fn with_ack(bytes: Vec<u8>) -> Vec<u8> {
    let mut out = vec![ACK];
    out.extend(bytes);
    out
}

fn node_info(node_id: u8, classes: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x84, node_id, (classes.len() + 3) as u8, 0x04, 0x10, 0x01];
    payload.extend_from_slice(classes);
    frame(MessageType::Request, MessageClass::ApplicationUpdate, payload)
}

fn manual_config() -> ControllerConfig {
    ControllerConfig {
        auto_negotiate_versions: false,
        interview_nodes: false,
        ..Default::default()
    }
}

#[test]
fn test_version_get_round_trip() {
    let mut controller = Controller::new(manual_config());
    let events = controller.subscribe();
    let now = Instant::now();

    controller.receive(&node_info(5, &[0x86]), now);
    assert_eq!(controller.take_outbound(), vec![ACK]);

    let id = controller.request_version(5).expect("should queue VERSION_GET");
    controller.poll(now);
    let callback_id = 1;
    assert_eq!(
        controller.take_outbound(),
        frame(
            MessageType::Request,
            MessageClass::SendData,
            vec![0x05, 0x02, 0x86, 0x11, 0x25, callback_id]
        )
    );

    controller.receive(&[ACK], now);
    controller.receive(&frame(MessageType::Response, MessageClass::SendData, vec![0x01]), now);
    controller.receive(&frame(MessageType::Request, MessageClass::SendData, vec![callback_id, 0x00]), now);
    assert!(controller.in_flight().is_some(), "GET waits for the report");

    controller.receive(
        &frame(
            MessageType::Request,
            MessageClass::ApplicationCommandHandler,
            vec![0x00, 0x05, 0x07, 0x86, 0x12, 0x02, 0x04, 0x05, 0x01, 0x02],
        ),
        now,
    );
    assert!(controller.is_idle());

    let version = controller
        .node(5)
        .and_then(|node| node.version)
        .expect("version should be recorded");
    assert_eq!(version.library_type, LibraryType::Controller);
    assert_eq!(version.protocol_version, "4.5");
    assert_eq!(version.application_version, "1.2");

    let received: Vec<ZWaveEvent> = events.try_iter().collect();
    assert!(received.contains(&ZWaveEvent::TransactionCompleted {
        id,
        node_id: 5,
        message_class: MessageClass::SendData,
    }));
    assert!(received
        .iter()
        .any(|event| matches!(event, ZWaveEvent::VersionReport { node_id: 5, .. })));
}

#[test]
fn test_set_completes_on_callback() {
    let mut controller = Controller::new(manual_config());
    let now = Instant::now();
    controller.receive(&node_info(7, &[0x25]), now);
    controller.take_outbound();

    controller
        .send_command(EncodeRequest::new(7, 0x25, CommandDescriptor::Set { value: 0xFF }))
        .expect("should queue SET");
    controller.poll(now);
    assert_eq!(
        controller.take_outbound(),
        frame(
            MessageType::Request,
            MessageClass::SendData,
            vec![0x07, 0x03, 0x25, 0x01, 0xFF, 0x25, 0x01]
        )
    );

    controller.receive(&[ACK], now);
    controller.receive(&frame(MessageType::Response, MessageClass::SendData, vec![0x01]), now);
    controller.receive(&frame(MessageType::Request, MessageClass::SendData, vec![0x01, 0x00]), now);

    assert!(controller.is_idle());
}

#[test]
fn test_endpoint_command_and_report() {
    let mut controller = Controller::new(manual_config());
    let events = controller.subscribe();
    let now = Instant::now();
    controller.receive(&node_info(9, &[0x25, 0x60]), now);
    controller.take_outbound();
    events.try_iter().for_each(drop);

    controller
        .send_command(EncodeRequest::new(9, 0x25, CommandDescriptor::Get).with_endpoint(2))
        .expect("should queue encapsulated GET");
    controller.poll(now);
    let sent = controller.take_outbound();
    let decoded = Frame::decode(&sent).expect("should decode");
    assert_eq!(decoded.payload, vec![0x09, 0x05, 0x60, 0x06, 0x02, 0x25, 0x02, 0x25, 0x01]);

    controller.receive(
        &frame(
            MessageType::Request,
            MessageClass::ApplicationCommandHandler,
            vec![0x00, 0x09, 0x07, 0x60, 0x0D, 0x02, 0x01, 0x25, 0x03, 0xFF],
        ),
        now,
    );

    assert_eq!(
        events.try_recv().expect("should publish the value"),
        ZWaveEvent::ValueChanged(ValueEvent {
            node_id: 9,
            command_class: 0x25,
            endpoint: 2,
            kind: ValueKind::Switch,
            value: DecimalValue::from(0xFF),
        })
    );
}

#[test]
fn test_initialisation_interviews_nodes() {
    let mut controller = Controller::new(ControllerConfig {
        auto_negotiate_versions: false,
        ..Default::default()
    });
    let now = Instant::now();
    controller.initialize();
    controller.poll(now);
    controller.take_outbound();

    let mut version = b"Z-Wave 4.05\0".to_vec();
    version.push(0x01);
    let mut capabilities = vec![0x01, 0x02, 0x00, 0x86, 0x00, 0x01, 0x00, 0x5A];
    capabilities.extend_from_slice(&[0x00, 0x00, 0x04]);
    // Nodes 1 (the controller) and 3.
    let mut init_data = vec![0x05, 0x08, 29, 0b0000_0101];
    init_data.extend_from_slice(&[0; 28]);
    let replies = [
        (MessageClass::GetVersion, version),
        (MessageClass::MemoryGetId, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01]),
        (MessageClass::SerialApiGetCapabilities, capabilities),
        (MessageClass::SerialApiGetInitData, init_data),
        (MessageClass::GetControllerCapabilities, vec![0x1C]),
        (MessageClass::GetSucNodeId, vec![0x00]),
    ];
    for (class, payload) in replies {
        controller.receive(&with_ack(frame(MessageType::Response, class, payload)), now);
    }

    let info = controller.controller_info().clone();
    assert_eq!(info.library_type, Some(LibraryType::StaticController));
    assert_eq!(info.home_id, Some(0xDEAD_BEEF));
    assert_eq!(info.own_node_id, Some(1));
    assert_eq!(info.application_version.as_deref(), Some("1.2"));
    assert_eq!(info.manufacturer_id, Some(0x0086));
    assert!(info.supports_function(MessageClass::SendData));
    assert_eq!(info.suc_node_id, None);
    assert!(info.is_real_primary() && info.is_suc());
    assert!(!info.is_secondary());
    assert_eq!(controller.node_ids(), vec![1, 3]);

    // Only node 3 is identified.
    let out = controller.take_outbound();
    let identify = frame(MessageType::Request, MessageClass::IdentifyNode, vec![0x03]);
    assert!(out.ends_with(&identify));

    controller.receive(
        &with_ack(frame(
            MessageType::Response,
            MessageClass::IdentifyNode,
            vec![0x80, 0x00, 0x00, 0x04, 0x10, 0x01],
        )),
        now,
    );
    assert!(controller.node(3).expect("node 3").listening);
    let out = controller.take_outbound();
    assert!(out.ends_with(&frame(MessageType::Request, MessageClass::RequestNodeInfo, vec![0x03])));

    controller.receive(&with_ack(frame(MessageType::Response, MessageClass::RequestNodeInfo, vec![0x01])), now);
    controller.receive(&node_info(3, &[0x25, 0x86]), now);

    assert!(controller.is_idle());
    assert!(controller.node(3).expect("node 3").node_info_received);
}

#[test]
fn test_dropped_subscriber_does_not_block_others() {
    let mut controller = Controller::new(manual_config());
    let first = controller.subscribe();
    let second = controller.subscribe();
    drop(first);

    controller.receive(&node_info(4, &[0x20]), Instant::now());

    assert!(matches!(
        second.try_recv(),
        Ok(ZWaveEvent::NodeInfoReceived { node_id: 4, .. })
    ));
}

#[test]
fn test_full_subscriber_drops_events() {
    let mut controller = Controller::new(ControllerConfig {
        event_channel_capacity: 1,
        ..manual_config()
    });
    let events = controller.subscribe();
    let now = Instant::now();

    controller.receive(&node_info(4, &[0x20]), now);
    controller.receive(&node_info(6, &[0x20]), now);

    assert!(matches!(events.try_recv(), Ok(ZWaveEvent::NodeInfoReceived { node_id: 4, .. })));
    assert!(events.try_recv().is_err());
    assert!(controller.node(6).is_some());
}
