//! Lifecycle tests for the connection manager, driven through the mock
//! transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{sleep, timeout};

use magswipe_core::{ConnectionState, ErrorKind, ReaderConfig};
use magswipe_device::mock::{MockOpenFailure, MockReadFailure, MockTransport, TransportCall};
use magswipe_device::{ConnectionManager, ReaderEvent};

const SWIPE: &str = "%B4111111111111111^DOE/JOHN^2512101000000000000?";

/// Shrunk intervals so suites finish quickly; ratios match the defaults.
fn test_config() -> ReaderConfig {
    ReaderConfig {
        poll_interval_ms: 5,
        read_timeout_ms: 1,
        ..ReaderConfig::default()
    }
}

fn manager() -> (ConnectionManager, magswipe_device::mock::MockTransportHandle) {
    let (transport, handle) = MockTransport::new();
    let manager = ConnectionManager::new(transport, test_config()).expect("valid config");
    (manager, handle)
}

async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<ReaderEvent>,
) -> ReaderEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event within deadline")
        .expect("bus open")
}

async fn wait_for_disconnected(manager: &ConnectionManager) {
    timeout(Duration::from_secs(2), async {
        while manager.state().await != ConnectionState::Disconnected {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("manager settled into Disconnected");
}

#[tokio::test]
async fn connect_starts_monitoring() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, Some("B123"), "mock/0");
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert_eq!(manager.state().await, ConnectionState::Monitoring);
    assert!(manager.is_connected().await);

    let ReaderEvent::DeviceConnected(descriptor) = next_event(&mut events).await else {
        panic!("expected connected event");
    };
    assert_eq!(descriptor.id, device_id);
    assert!(descriptor.connected);

    let active = manager.active_device().await.expect("active device");
    assert_eq!(active.id, device_id);

    manager.disconnect().await;
}

#[tokio::test]
async fn connect_unknown_id_fails_cleanly() {
    let (manager, _bus) = manager();
    let mut events = manager.subscribe();

    assert!(!manager.connect("801:2:missing").await);
    assert_eq!(manager.state().await, ConnectionState::Disconnected);

    let ReaderEvent::Error { kind, message } = next_event(&mut events).await else {
        panic!("expected error event");
    };
    assert_eq!(kind, ErrorKind::DeviceNotFound);
    assert!(message.contains("801:2:missing"));
}

#[tokio::test]
async fn connect_surfaces_permission_denied() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");
    bus.fail_next_open(MockOpenFailure::PermissionDenied);
    let mut events = manager.subscribe();

    assert!(!manager.connect(&device_id).await);
    assert_eq!(manager.state().await, ConnectionState::Disconnected);

    let ReaderEvent::Error { kind, .. } = next_event(&mut events).await else {
        panic!("expected error event");
    };
    assert_eq!(kind, ErrorKind::DevicePermissionDenied);
}

#[tokio::test]
async fn swipes_are_decoded_and_published() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, Some("B123"), "mock/0");
    bus.push_swipe(SWIPE);
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));

    let ReaderEvent::CardSwipe(record) = next_event(&mut events).await else {
        panic!("expected swipe event");
    };
    assert!(record.has_valid_data);
    assert_eq!(record.primary_account_number(), Some("4111111111111111"));
    assert_eq!(record.device_id.as_deref(), Some(device_id.as_str()));

    manager.disconnect().await;
}

#[tokio::test]
async fn reports_without_track_data_are_discarded() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");
    // Keyboard noise first, then a real swipe. Only the swipe may surface.
    bus.push_report(vec![0x00, 0x41, 0x42, 0x43, 0x0d]);
    bus.push_swipe(SWIPE);
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));
    let ReaderEvent::CardSwipe(record) = next_event(&mut events).await else {
        panic!("expected swipe event");
    };
    assert!(record.has_valid_data);

    manager.disconnect().await;
}

#[tokio::test]
async fn failed_track_publishes_parse_error_and_swipe() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");
    // Track 1 span with too few fields: located but undecodable.
    bus.push_swipe("%B4111111111111111?");
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));

    let ReaderEvent::Error { kind, message } = next_event(&mut events).await else {
        panic!("expected parse error event");
    };
    assert_eq!(kind, ErrorKind::CardDataParsingError);
    assert!(message.contains("track 1"));

    let ReaderEvent::CardSwipe(record) = next_event(&mut events).await else {
        panic!("expected swipe event");
    };
    assert!(!record.has_valid_data);
    assert!(record.has_track_data());

    manager.disconnect().await;
}

#[tokio::test]
async fn disconnect_is_idempotent_and_closes_the_handle() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");

    assert!(manager.connect(&device_id).await);
    manager.disconnect().await;
    manager.disconnect().await;

    assert_eq!(manager.state().await, ConnectionState::Disconnected);
    assert_eq!(bus.open_handle_count(), 0);
    assert_eq!(bus.reads_after_close(), 0);
    assert!(matches!(bus.calls().last(), Some(TransportCall::Close(_))));
}

#[tokio::test]
async fn reconnect_tears_down_the_previous_device_first() {
    let (manager, bus) = manager();
    let first = bus.add_device(0x0801, 0x0001, Some("A1"), "mock/0");
    let second = bus.add_device(0x0801, 0x0003, Some("A2"), "mock/1");

    assert!(manager.connect(&first).await);
    assert!(manager.connect(&second).await);

    assert_eq!(bus.open_handle_count(), 1);
    assert_eq!(bus.reads_after_close(), 0);
    let calls = bus.calls();
    let close_first = calls
        .iter()
        .position(|call| *call == TransportCall::Close(1))
        .expect("first handle closed");
    let open_second = calls
        .iter()
        .position(|call| *call == TransportCall::Open(2))
        .expect("second handle opened");
    assert!(close_first < open_second);

    let active = manager.active_device().await.expect("active device");
    assert_eq!(active.id, second);

    manager.disconnect().await;
}

#[tokio::test]
async fn detach_notification_stops_monitoring_silently() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, Some("B123"), "mock/0");
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));

    manager.notify_detached(&device_id).await;
    assert_eq!(manager.state().await, ConnectionState::Disconnected);
    assert_eq!(bus.open_handle_count(), 0);
    // Teardown publishes nothing; the caller already observed the detach.
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn detach_notification_for_other_device_is_a_noop() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, Some("B123"), "mock/0");

    assert!(manager.connect(&device_id).await);
    manager.notify_detached("801:1:other").await;
    assert_eq!(manager.state().await, ConnectionState::Monitoring);

    manager.disconnect().await;
}

#[tokio::test]
async fn fatal_read_error_tears_the_connection_down() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");
    bus.fail_next_read(MockReadFailure::Fatal);
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));

    let ReaderEvent::Error { kind, .. } = next_event(&mut events).await else {
        panic!("expected error event");
    };
    assert_eq!(kind, ErrorKind::UsbCommunicationError);

    wait_for_disconnected(&manager).await;
    assert_eq!(bus.open_handle_count(), 0);
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn transient_read_error_keeps_monitoring() {
    let (manager, bus) = manager();
    let device_id = bus.add_device(0x0801, 0x0002, None, "mock/0");
    bus.fail_next_read(MockReadFailure::Transient);
    bus.push_swipe(SWIPE);
    let mut events = manager.subscribe();

    assert!(manager.connect(&device_id).await);
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::DeviceConnected(_)
    ));

    let ReaderEvent::Error { kind, .. } = next_event(&mut events).await else {
        panic!("expected transient error event");
    };
    assert_eq!(kind, ErrorKind::UsbCommunicationError);

    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::CardSwipe(_)
    ));
    assert_eq!(manager.state().await, ConnectionState::Monitoring);

    manager.disconnect().await;
}

#[tokio::test]
async fn connected_devices_flags_the_active_reader() {
    let (manager, bus) = manager();
    let first = bus.add_device(0x0801, 0x0001, Some("A1"), "mock/0");
    bus.add_device(0x0801, 0x0004, Some("A2"), "mock/1");
    bus.add_device(0x046d, 0xc534, None, "mock/2");

    assert!(manager.connect(&first).await);

    let devices = manager.connected_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    let flags: Vec<bool> = devices.iter().map(|d| d.connected).collect();
    assert_eq!(flags, vec![true, false]);

    manager.disconnect().await;
    let devices = manager.connected_devices().await.unwrap();
    assert!(devices.iter().all(|d| !d.connected));
}

#[tokio::test]
async fn interleaved_control_calls_never_race_the_poll_loop() {
    let (manager, bus) = manager();
    let first = bus.add_device(0x0801, 0x0001, Some("A1"), "mock/0");
    let second = bus.add_device(0x0801, 0x0002, Some("A2"), "mock/1");

    for _ in 0..5 {
        assert!(manager.connect(&first).await);
        assert!(manager.connect(&second).await);
        manager.disconnect().await;
        assert!(manager.connect(&first).await);
        manager.notify_detached(&first).await;
    }

    assert_eq!(manager.state().await, ConnectionState::Disconnected);
    assert_eq!(bus.open_handle_count(), 0);
    assert_eq!(bus.reads_after_close(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_control_calls_never_race_the_poll_loop() {
    let (transport, bus) = MockTransport::new();
    let config = ReaderConfig {
        poll_interval_ms: 2,
        read_timeout_ms: 1,
        ..ReaderConfig::default()
    };
    let manager = Arc::new(ConnectionManager::new(transport, config).expect("valid config"));
    let first = bus.add_device(0x0801, 0x0001, Some("A1"), "mock/0");
    let second = bus.add_device(0x0801, 0x0002, Some("A2"), "mock/1");

    // Hammer the control surface from several tasks at once while poll
    // loops come and go underneath.
    let mut workers = Vec::new();
    for worker in 0..4u32 {
        let manager = Arc::clone(&manager);
        let first = first.clone();
        let second = second.clone();
        workers.push(tokio::spawn(async move {
            for round in 0..25u32 {
                match (worker + round) % 4 {
                    0 => {
                        manager.connect(&first).await;
                    }
                    1 => {
                        manager.connect(&second).await;
                    }
                    2 => manager.disconnect().await,
                    _ => manager.notify_detached(&first).await,
                }
            }
        }));
    }
    for worker in workers {
        worker.await.expect("control task completed");
    }

    manager.disconnect().await;
    assert_eq!(manager.state().await, ConnectionState::Disconnected);
    assert_eq!(bus.open_handle_count(), 0);
    assert_eq!(bus.reads_after_close(), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let (transport, _bus) = MockTransport::new();
    let config = ReaderConfig {
        poll_interval_ms: 10,
        read_timeout_ms: 20,
        ..ReaderConfig::default()
    };
    assert!(ConnectionManager::new(transport, config).is_err());
}
