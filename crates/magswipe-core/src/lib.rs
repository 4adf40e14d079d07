//! Core types for the magswipe card reader stack.
//!
//! This crate holds the pieces shared by every other magswipe crate: the
//! error taxonomy surfaced on the event stream, the device descriptor and
//! connection lifecycle types, the Magtek vendor/product tables, and the
//! reader configuration.
//!
//! The crate is deliberately transport-free and runtime-free so that the
//! decoding engine can be used standalone (for example, to decode captured
//! report buffers offline).
//!
//! # Examples
//!
//! ```
//! use magswipe_core::{ConnectionState, DeviceDescriptor, ReaderConfig};
//! use magswipe_core::constants::is_magtek_device;
//!
//! let desc = DeviceDescriptor::new(0x0801, 0x0002, None, "/dev/hidraw0".into());
//! assert!(is_magtek_device(desc.vendor_id, desc.product_id));
//! assert!(!ConnectionState::Disconnected.is_connected());
//! assert!(ReaderConfig::default().validate().is_ok());
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::ReaderConfig;
pub use error::{Error, ErrorKind, Result};
pub use types::{ConnectionState, DeviceDescriptor};
