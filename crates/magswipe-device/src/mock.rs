//! In-memory mock transport for tests and the demo CLI.
//!
//! [`MockTransport::new`] returns the transport together with a
//! [`MockTransportHandle`]. The transport side is handed to the connection
//! layer; the handle side stays with the test and scripts the bus: attach
//! devices, queue input reports, inject open/read failures, and inspect the
//! ordered call log afterwards.
//!
//! # Examples
//!
//! ```
//! use magswipe_device::mock::MockTransport;
//!
//! let (transport, handle) = MockTransport::new();
//! let id = handle.add_device(0x0801, 0x0002, Some("B123"), "mock/0");
//! assert_eq!(id, "801:2:B123");
//! handle.push_swipe("%B4111111111111111^DOE/JOHN^2512101?");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use magswipe_core::{DeviceDescriptor, Error, Result};

use crate::transport::{TransportDevice, UsbTransport};

/// How the next `open` call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOpenFailure {
    NotFound,
    PermissionDenied,
    Busy,
}

/// How a queued `read` call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReadFailure {
    /// Recoverable error; the poll loop keeps going.
    Transient,
    /// Device-gone error; the poll loop must shut down.
    Fatal,
}

/// One transport call, recorded in order against the handle it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCall {
    Open(u64),
    Read(u64),
    Close(u64),
}

#[derive(Default)]
struct MockState {
    devices: Vec<TransportDevice>,
    reports: VecDeque<Vec<u8>>,
    read_failures: VecDeque<MockReadFailure>,
    open_failure: Option<MockOpenFailure>,
    calls: Vec<TransportCall>,
    open_handles: Vec<u64>,
    next_handle: u64,
}

/// Transport side of the mock pair.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// An open handle on the mock bus.
pub struct MockDeviceHandle {
    id: u64,
}

/// Test-control side of the mock pair.
#[derive(Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().expect("mock transport state poisoned")
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockTransportHandle { state },
        )
    }
}

impl UsbTransport for MockTransport {
    type Handle = MockDeviceHandle;

    async fn enumerate(&self) -> Result<Vec<TransportDevice>> {
        Ok(lock(&self.state).devices.clone())
    }

    async fn open(&self, path: &str) -> Result<MockDeviceHandle> {
        let mut state = lock(&self.state);
        if let Some(failure) = state.open_failure.take() {
            return Err(match failure {
                MockOpenFailure::NotFound => Error::device_not_found(path),
                MockOpenFailure::PermissionDenied => Error::permission_denied(path),
                MockOpenFailure::Busy => Error::device_busy(path),
            });
        }
        if !state.devices.iter().any(|device| device.path == path) {
            return Err(Error::device_not_found(path));
        }
        state.next_handle += 1;
        let id = state.next_handle;
        state.open_handles.push(id);
        state.calls.push(TransportCall::Open(id));
        Ok(MockDeviceHandle { id })
    }

    async fn read(&self, handle: &mut MockDeviceHandle, _timeout: Duration) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::Read(handle.id));
        if !state.open_handles.contains(&handle.id) {
            return Err(Error::disconnected("read on closed handle"));
        }
        if let Some(failure) = state.read_failures.pop_front() {
            return Err(match failure {
                MockReadFailure::Transient => Error::communication("simulated transient failure"),
                MockReadFailure::Fatal => Error::disconnected("simulated device removal"),
            });
        }
        Ok(state.reports.pop_front().unwrap_or_default())
    }

    async fn close(&self, handle: MockDeviceHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::Close(handle.id));
        state.open_handles.retain(|id| *id != handle.id);
        Ok(())
    }
}

impl MockTransportHandle {
    /// Attach a device to the mock bus and return the id the registry will
    /// derive for it.
    pub fn add_device(
        &self,
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<&str>,
        path: &str,
    ) -> String {
        let serial = serial_number.map(str::to_owned);
        lock(&self.state).devices.push(TransportDevice {
            vendor_id,
            product_id,
            serial_number: serial.clone(),
            path: path.to_owned(),
        });
        DeviceDescriptor::new(vendor_id, product_id, serial, path.to_owned()).id
    }

    /// Detach the device at `path` from the bus. Open handles stay readable;
    /// queue a [`MockReadFailure::Fatal`] to simulate the handle dying too.
    pub fn remove_device(&self, path: &str) {
        lock(&self.state).devices.retain(|device| device.path != path);
    }

    /// Queue a raw input report for the next non-failing read.
    pub fn push_report(&self, bytes: Vec<u8>) {
        lock(&self.state).reports.push_back(bytes);
    }

    /// Queue a swipe payload as the firmware would report it: report id
    /// byte, ASCII payload, zero padding to 64 bytes.
    pub fn push_swipe(&self, payload: &str) {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(payload.as_bytes());
        if bytes.len() < 64 {
            bytes.resize(64, 0x00);
        }
        self.push_report(bytes);
    }

    /// Make the next `open` call fail.
    pub fn fail_next_open(&self, failure: MockOpenFailure) {
        lock(&self.state).open_failure = Some(failure);
    }

    /// Queue a read failure; failures are consumed before queued reports.
    pub fn fail_next_read(&self, failure: MockReadFailure) {
        lock(&self.state).read_failures.push_back(failure);
    }

    /// Ordered log of every transport call so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of handles currently open.
    pub fn open_handle_count(&self) -> usize {
        lock(&self.state).open_handles.len()
    }

    /// Count reads issued against a handle after it was closed. A non-zero
    /// count means the poll loop raced its own teardown.
    pub fn reads_after_close(&self) -> usize {
        let state = lock(&self.state);
        let mut closed = Vec::new();
        let mut violations = 0;
        for call in &state.calls {
            match call {
                TransportCall::Close(id) => closed.push(*id),
                TransportCall::Read(id) if closed.contains(id) => violations += 1,
                _ => {}
            }
        }
        violations
    }

    /// Number of reports still queued.
    pub fn pending_reports(&self) -> usize {
        lock(&self.state).reports.len()
    }
}
