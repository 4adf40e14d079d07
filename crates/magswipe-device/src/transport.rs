//! USB transport abstraction.
//!
//! [`UsbTransport`] is the seam between the connection layer and the actual
//! bus: it enumerates attached devices, opens them by platform path, performs
//! bounded reads, and closes handles. The connection layer only ever talks to
//! [`AnyTransport`], an enum wrapper that dispatches to the concrete
//! implementations without boxing (async trait methods are not object-safe).
//!
//! Two implementations exist: [`MockTransport`](crate::mock::MockTransport),
//! an in-memory bus scripted from tests via its control handle (always
//! available), and `HidTransport`, the real hidapi-backed transport behind
//! the `hardware-hid` feature.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use magswipe_core::Result;

#[cfg(feature = "hardware-hid")]
use crate::hid::{HidDeviceHandle, HidTransport};
use crate::mock::{MockDeviceHandle, MockTransport};

/// A device as seen on the bus, before any Magtek filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    /// Platform path used to open the device (e.g. `/dev/hidraw3`).
    pub path: String,
}

/// Low-level access to a USB HID bus.
///
/// `read` must return within roughly `timeout`; an empty buffer means no
/// report was available. `open` hands out an owned handle, and `close`
/// consumes it, so a handle cannot be read after it is closed.
pub trait UsbTransport: Send + Sync {
    type Handle: Send + 'static;

    async fn enumerate(&self) -> Result<Vec<TransportDevice>>;
    async fn open(&self, path: &str) -> Result<Self::Handle>;
    async fn read(&self, handle: &mut Self::Handle, timeout: Duration) -> Result<Vec<u8>>;
    async fn close(&self, handle: Self::Handle) -> Result<()>;
}

/// Enum dispatch over the available transports.
#[non_exhaustive]
pub enum AnyTransport {
    Mock(MockTransport),
    #[cfg(feature = "hardware-hid")]
    Hid(HidTransport),
}

/// An open device handle belonging to one of the transports.
#[non_exhaustive]
pub enum AnyDeviceHandle {
    Mock(MockDeviceHandle),
    #[cfg(feature = "hardware-hid")]
    Hid(HidDeviceHandle),
}

impl From<MockTransport> for AnyTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}

#[cfg(feature = "hardware-hid")]
impl From<HidTransport> for AnyTransport {
    fn from(transport: HidTransport) -> Self {
        Self::Hid(transport)
    }
}

impl UsbTransport for AnyTransport {
    type Handle = AnyDeviceHandle;

    async fn enumerate(&self) -> Result<Vec<TransportDevice>> {
        match self {
            Self::Mock(transport) => transport.enumerate().await,
            #[cfg(feature = "hardware-hid")]
            Self::Hid(transport) => transport.enumerate().await,
        }
    }

    async fn open(&self, path: &str) -> Result<AnyDeviceHandle> {
        match self {
            Self::Mock(transport) => Ok(AnyDeviceHandle::Mock(transport.open(path).await?)),
            #[cfg(feature = "hardware-hid")]
            Self::Hid(transport) => Ok(AnyDeviceHandle::Hid(transport.open(path).await?)),
        }
    }

    async fn read(&self, handle: &mut AnyDeviceHandle, timeout: Duration) -> Result<Vec<u8>> {
        match (self, handle) {
            (Self::Mock(transport), AnyDeviceHandle::Mock(handle)) => {
                transport.read(handle, timeout).await
            }
            #[cfg(feature = "hardware-hid")]
            (Self::Hid(transport), AnyDeviceHandle::Hid(handle)) => {
                transport.read(handle, timeout).await
            }
            #[cfg(feature = "hardware-hid")]
            _ => Err(magswipe_core::Error::communication(
                "device handle does not belong to this transport",
            )),
        }
    }

    async fn close(&self, handle: AnyDeviceHandle) -> Result<()> {
        match (self, handle) {
            (Self::Mock(transport), AnyDeviceHandle::Mock(handle)) => {
                transport.close(handle).await
            }
            #[cfg(feature = "hardware-hid")]
            (Self::Hid(transport), AnyDeviceHandle::Hid(handle)) => {
                transport.close(handle).await
            }
            #[cfg(feature = "hardware-hid")]
            _ => Err(magswipe_core::Error::communication(
                "device handle does not belong to this transport",
            )),
        }
    }
}
