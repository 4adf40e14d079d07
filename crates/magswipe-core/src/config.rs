//! Reader configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_TIMEOUT_MS, REPORT_BUFFER_SIZE,
};
use crate::error::{Error, Result};

/// Tunable parameters for the polling loop and event delivery.
///
/// All fields have defaults matching the reader firmware's expectations, so
/// `ReaderConfig::default()` is the right choice for real hardware. Tests
/// shrink the intervals to keep suites fast.
///
/// # Examples
///
/// ```
/// use magswipe_core::ReaderConfig;
///
/// let config = ReaderConfig::default();
/// assert_eq!(config.poll_interval_ms, 50);
/// assert_eq!(config.read_timeout_ms, 10);
///
/// let config: ReaderConfig = toml::from_str("poll_interval_ms = 25").unwrap();
/// assert_eq!(config.poll_interval_ms, 25);
/// assert_eq!(config.read_timeout_ms, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Cadence of the background polling loop, in milliseconds.
    pub poll_interval_ms: u64,

    /// Bound on each HID read, in milliseconds. Must not exceed the poll
    /// interval; teardown latency is governed by the cadence, not the read.
    pub read_timeout_ms: u64,

    /// Capacity of the broadcast event channel. Slow subscribers lag and
    /// drop the oldest events rather than stalling the polling loop.
    pub event_capacity: usize,

    /// Size of the input report read buffer, in bytes.
    pub read_buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            read_buffer_size: REPORT_BUFFER_SIZE,
        }
    }
}

impl ReaderConfig {
    /// Polling cadence as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-tick read bound as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any interval or capacity is zero, or if
    /// the read timeout exceeds the poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be non-zero"));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::config("read_timeout_ms must be non-zero"));
        }
        if self.read_timeout_ms > self.poll_interval_ms {
            return Err(Error::config(format!(
                "read_timeout_ms ({}) must not exceed poll_interval_ms ({})",
                self.read_timeout_ms, self.poll_interval_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity must be non-zero"));
        }
        if self.read_buffer_size < 2 {
            return Err(Error::config("read_buffer_size must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ReaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.read_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let config = ReaderConfig {
            poll_interval_ms: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ReaderConfig {
            read_timeout_ms: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_read_timeout_above_cadence() {
        let config = ReaderConfig {
            poll_interval_ms: 10,
            read_timeout_ms: 20,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = ReaderConfig {
            event_capacity: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ReaderConfig = toml::from_str("event_capacity = 8").unwrap();
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.read_buffer_size, REPORT_BUFFER_SIZE);
    }
}
