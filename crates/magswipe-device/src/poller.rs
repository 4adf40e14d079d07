//! Background polling loop for a connected reader.
//!
//! The loop owns the device handle outright: nothing else can read from or
//! close the handle while the task is alive, and the task closes it itself
//! on every exit path. The connection layer steers the task through two
//! shared flags: `cancel` (set by teardown, checked each tick) and `dead`
//! (set by the task once the handle is closed and the loop has exited).
//! The task never touches the connection lock, so teardown can join it
//! while holding that lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use magswipe_core::{DeviceDescriptor, Error, ReaderConfig};
use magswipe_decode::decode_for_device;

use crate::events::{EventBus, ReaderEvent};
use crate::transport::{AnyDeviceHandle, AnyTransport, UsbTransport};

pub(crate) struct Poller {
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) dead: Arc<AtomicBool>,
    pub(crate) task: JoinHandle<()>,
}

pub(crate) fn spawn(
    transport: Arc<AnyTransport>,
    handle: AnyDeviceHandle,
    descriptor: DeviceDescriptor,
    bus: EventBus,
    config: ReaderConfig,
) -> Poller {
    let cancel = Arc::new(AtomicBool::new(false));
    let dead = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(run(
        transport,
        handle,
        descriptor,
        bus,
        config,
        Arc::clone(&cancel),
        Arc::clone(&dead),
    ));
    Poller { cancel, dead, task }
}

async fn run(
    transport: Arc<AnyTransport>,
    mut handle: AnyDeviceHandle,
    descriptor: DeviceDescriptor,
    bus: EventBus,
    config: ReaderConfig,
    cancel: Arc<AtomicBool>,
    dead: Arc<AtomicBool>,
) {
    let poll_interval = config.poll_interval();
    let read_timeout = config.read_timeout();
    debug!(device = %descriptor.id, ?poll_interval, "poll loop started");

    loop {
        if cancel.load(Ordering::Acquire) {
            break;
        }
        let tick_start = Instant::now();

        match transport.read(&mut handle, read_timeout).await {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => handle_report(&bytes, &descriptor, &bus),
            Err(error) if error.is_fatal() => {
                warn!(device = %descriptor.id, %error, "device gone, stopping poll loop");
                bus.publish_error(&error);
                if let Err(close_error) = transport.close(handle).await {
                    debug!(%close_error, "closing dead handle failed");
                }
                dead.store(true, Ordering::Release);
                return;
            }
            Err(error) => {
                debug!(device = %descriptor.id, %error, "transient read error");
                bus.publish_error(&error);
            }
        }

        // Hold the cadence steady regardless of how long the read took.
        let elapsed = tick_start.elapsed();
        if elapsed < poll_interval {
            sleep(poll_interval - elapsed).await;
        }
    }

    if let Err(error) = transport.close(handle).await {
        warn!(device = %descriptor.id, %error, "failed to close device handle");
    }
    dead.store(true, Ordering::Release);
    debug!(device = %descriptor.id, "poll loop stopped");
}

/// Decode a non-empty report and publish what it yielded. A swipe event is
/// emitted whenever at least one track span was located, even if every
/// located track failed its grammar; reports with no spans at all are
/// keyboard noise and are discarded.
fn handle_report(bytes: &[u8], descriptor: &DeviceDescriptor, bus: &EventBus) {
    let record = decode_for_device(bytes, Some(&descriptor.id));

    for track in [&record.track1, &record.track2, &record.track3]
        .into_iter()
        .flatten()
    {
        if let Some(reason) = &track.failure_reason {
            bus.publish_error(&Error::card_data_parsing(format!(
                "track {}: {}",
                track.number, reason
            )));
        }
    }

    if record.has_valid_data || record.has_track_data() {
        info!(device = %descriptor.id, valid = record.has_valid_data, "card swipe detected");
        bus.publish(ReaderEvent::CardSwipe(record));
    } else {
        debug!(device = %descriptor.id, len = bytes.len(), "report carried no track data");
    }
}
