//! Error types shared across the magswipe crates.
//!
//! Errors are split into two layers: the structured [`Error`] enum used by
//! `Result`-returning operations, and the flat [`ErrorKind`] taxonomy that is
//! mirrored onto the error event stream for host consumption. Every `Error`
//! maps onto exactly one `ErrorKind` via [`Error::kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for magswipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing or reading a card reader.
#[derive(Debug, Error)]
pub enum Error {
    /// No attached device matched the requested device id.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The transport refused to open the device for permission reasons
    /// (typically missing udev rules or driver access on the host).
    #[error("Permission denied opening device: {0}")]
    PermissionDenied(String),

    /// The device is already claimed by another process or handle.
    #[error("Device busy: {0}")]
    DeviceBusy(String),

    /// The device handle is no longer valid; the hardware is gone.
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// Transient transport failure (a read or control call failed but the
    /// handle may still be usable).
    #[error("USB communication error: {0}")]
    Communication(String),

    /// A track payload violated the per-track grammar.
    #[error("Card data parsing error: {0}")]
    CardDataParsing(String),

    /// The requested transport is not available in this build or on this
    /// platform.
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    /// An operation exceeded its deadline.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Invalid reader configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new device-not-found error.
    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        Self::DeviceNotFound(device_id.into())
    }

    /// Create a new permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a new device-busy error.
    pub fn device_busy(message: impl Into<String>) -> Self {
        Self::DeviceBusy(message.into())
    }

    /// Create a new disconnected error.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected(message.into())
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication(message.into())
    }

    /// Create a new card data parsing error.
    pub fn card_data_parsing(message: impl Into<String>) -> Self {
        Self::CardDataParsing(message.into())
    }

    /// Create a new platform-not-supported error.
    pub fn platform_not_supported(message: impl Into<String>) -> Self {
        Self::PlatformNotSupported(message.into())
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The event-stream kind this error maps onto.
    ///
    /// `Disconnected` and `Io` collapse into `UsbCommunicationError`: by the
    /// time they reach the error stream both describe a transport failure.
    /// `Config` never reaches the event stream (it is rejected at
    /// construction time) and maps onto `PlatformNotSupported` as the closest
    /// host-visible category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            Self::PermissionDenied(_) => ErrorKind::DevicePermissionDenied,
            Self::DeviceBusy(_) => ErrorKind::DeviceBusy,
            Self::Disconnected(_) | Self::Communication(_) | Self::Io(_) => {
                ErrorKind::UsbCommunicationError
            }
            Self::CardDataParsing(_) => ErrorKind::CardDataParsingError,
            Self::PlatformNotSupported(_) | Self::Config(_) => ErrorKind::PlatformNotSupported,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Whether this error invalidates the device handle.
    ///
    /// A fatal read error terminates the polling loop; anything else is
    /// reported and polling continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Flat error taxonomy surfaced on the error event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Requested device id did not match any attached device.
    DeviceNotFound,

    /// The host denied access to the device.
    DevicePermissionDenied,

    /// The device is claimed elsewhere.
    DeviceBusy,

    /// Transient or fatal transport failure.
    UsbCommunicationError,

    /// Per-track grammar violation; local, never escalates.
    CardDataParsingError,

    /// Transport unavailable in this build or on this platform.
    PlatformNotSupported,

    /// Operation deadline exceeded.
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DeviceNotFound => "DeviceNotFound",
            Self::DevicePermissionDenied => "DevicePermissionDenied",
            Self::DeviceBusy => "DeviceBusy",
            Self::UsbCommunicationError => "UsbCommunicationError",
            Self::CardDataParsingError => "CardDataParsingError",
            Self::PlatformNotSupported => "PlatformNotSupported",
            Self::Timeout => "Timeout",
        };
        write!(f, "{}", name)
    }
}
