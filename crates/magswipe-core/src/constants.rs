//! Protocol and device constants for Magtek magnetic-stripe readers.

/// Magtek USB vendor id.
pub const MAGTEK_VENDOR_ID: u16 = 0x0801;

/// Known Magtek swipe reader product ids.
pub const MAGTEK_PRODUCT_IDS: [u16; 5] = [
    0x0001, // Mini Swipe Reader
    0x0002, // USB Swipe Reader
    0x0003, // eDynamo
    0x0004, // uDynamo
    0x0010, // SureSwipe Reader
];

/// Default polling cadence for the background read loop, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default bounded-read timeout per poll tick, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10;

/// Default capacity of the broadcast event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Size of the HID input report read buffer, in bytes.
pub const REPORT_BUFFER_SIZE: usize = 256;

/// Check whether a vendor/product id pair identifies a supported Magtek
/// swipe reader.
///
/// # Examples
///
/// ```
/// use magswipe_core::constants::is_magtek_device;
///
/// assert!(is_magtek_device(0x0801, 0x0002));
/// assert!(!is_magtek_device(0x0801, 0x9999));
/// assert!(!is_magtek_device(0x1234, 0x0002));
/// ```
pub fn is_magtek_device(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == MAGTEK_VENDOR_ID && MAGTEK_PRODUCT_IDS.contains(&product_id)
}

/// Human-readable product name for a vendor/product id pair.
///
/// Unknown Magtek product ids get a generic name carrying the PID; foreign
/// vendors get `"Unknown Device"`.
///
/// # Examples
///
/// ```
/// use magswipe_core::constants::product_name;
///
/// assert_eq!(product_name(0x0801, 0x0003), "Magtek eDynamo");
/// assert_eq!(product_name(0x0801, 0x0042), "Magtek Card Reader (PID: 0x0042)");
/// assert_eq!(product_name(0x1234, 0x0001), "Unknown Device");
/// ```
pub fn product_name(vendor_id: u16, product_id: u16) -> String {
    if vendor_id != MAGTEK_VENDOR_ID {
        return "Unknown Device".to_string();
    }

    match product_id {
        0x0001 => "Magtek Mini Swipe Reader".to_string(),
        0x0002 => "Magtek USB Swipe Reader".to_string(),
        0x0003 => "Magtek eDynamo".to_string(),
        0x0004 => "Magtek uDynamo".to_string(),
        0x0010 => "Magtek SureSwipe Reader".to_string(),
        _ => format!("Magtek Card Reader (PID: 0x{:04x})", product_id),
    }
}
