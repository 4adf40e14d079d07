//! Device management for Magtek USB swipe readers.
//!
//! This crate owns everything between the USB bus and the event stream:
//! transport abstraction, device discovery, the connection state machine,
//! the background polling loop, and event fan-out. Decoding itself lives in
//! `magswipe-decode`; this crate feeds it raw input reports and publishes
//! the records it produces.
//!
//! # Examples
//!
//! ```
//! use magswipe_core::ReaderConfig;
//! use magswipe_device::{ConnectionManager, ReaderEvent};
//! use magswipe_device::mock::MockTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> magswipe_core::Result<()> {
//! let (transport, bus_handle) = MockTransport::new();
//! let device_id = bus_handle.add_device(0x0801, 0x0002, Some("B123"), "mock/0");
//! bus_handle.push_swipe("%B4111111111111111^DOE/JOHN^2512101?");
//!
//! let manager = ConnectionManager::new(transport, ReaderConfig {
//!     poll_interval_ms: 5,
//!     read_timeout_ms: 1,
//!     ..ReaderConfig::default()
//! })?;
//! let mut events = manager.subscribe();
//!
//! assert!(manager.connect(&device_id).await);
//! assert!(matches!(events.recv().await, Ok(ReaderEvent::DeviceConnected(_))));
//! assert!(matches!(events.recv().await, Ok(ReaderEvent::CardSwipe(_))));
//!
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod events;
#[cfg(feature = "hardware-hid")]
pub mod hid;
pub mod mock;
mod poller;
pub mod registry;
pub mod transport;

pub use connection::ConnectionManager;
pub use events::{EventBus, ReaderEvent};
#[cfg(feature = "hardware-hid")]
pub use hid::HidTransport;
pub use registry::DeviceRegistry;
pub use transport::{AnyDeviceHandle, AnyTransport, TransportDevice, UsbTransport};
