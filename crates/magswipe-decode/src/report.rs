//! HID input report parsing.
//!
//! A Magtek swipe reader delivers card data as HID input reports. The first
//! byte is a report id/status byte; the remainder carries the magnetic
//! stripe payload interleaved with padding. This module strips a raw report
//! down to its printable-ASCII content and locates the ISO 7811 track spans
//! by their sentinel delimiters.
//!
//! # Sentinels
//!
//! - Track 1: starts at `%` (0x25), ends at the first `?` (0x3F) at or after it.
//! - Track 2: starts at `;` (0x3B), ends at the first `?` at or after it.
//! - Track 3: no universal sentinel convention across reader firmware; spans
//!   are never located here (see crate docs for the known gap).
//!
//! Both searches run independently over the full printable string; a span is
//! reported only when both its sentinels are present, so partial spans never
//! leak out.
//!
//! # Examples
//!
//! ```
//! use magswipe_decode::ReportParser;
//!
//! let mut report = vec![0x00]; // report id
//! report.extend_from_slice(b"%B4111111111111111^DOE/JOHN^2512101?;4111111111111111=2512101?");
//!
//! let parsed = ReportParser::parse(&report);
//! assert!(parsed.track1.as_deref().unwrap().starts_with('%'));
//! assert!(parsed.track2.as_deref().unwrap().starts_with(';'));
//! assert!(parsed.track3.is_none());
//! ```

/// Lower bound of the printable ASCII range kept from a report.
pub const PRINTABLE_MIN: u8 = 0x20;

/// Upper bound of the printable ASCII range kept from a report.
pub const PRINTABLE_MAX: u8 = 0x7e;

/// Track 1 start sentinel.
pub const TRACK1_START: char = '%';

/// Track 2 start sentinel.
pub const TRACK2_START: char = ';';

/// End sentinel shared by tracks 1 and 2.
pub const TRACK_END: char = '?';

/// Printable content and located track spans of one input report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedReport {
    /// The report's printable-ASCII payload (report id byte dropped).
    pub data_string: String,

    /// Track 1 span including both sentinels, when located.
    pub track1: Option<String>,

    /// Track 2 span including both sentinels, when located.
    pub track2: Option<String>,

    /// Track 3 span. Never located from a raw report; present in the type so
    /// callers that obtain track 3 data out of band can feed it through the
    /// same assembly path.
    pub track3: Option<String>,
}

impl ParsedReport {
    /// True when no track span was located.
    pub fn is_empty(&self) -> bool {
        self.track1.is_none() && self.track2.is_none() && self.track3.is_none()
    }
}

/// Stateless parser turning raw input reports into [`ParsedReport`]s.
pub struct ReportParser;

impl ReportParser {
    /// Parse a raw HID input report.
    ///
    /// Total for all inputs: buffers shorter than two bytes, or with no
    /// printable payload, produce an empty [`ParsedReport`].
    pub fn parse(bytes: &[u8]) -> ParsedReport {
        if bytes.len() < 2 {
            return ParsedReport::default();
        }

        // Byte 0 is the report id/status byte.
        let data_string: String = bytes[1..]
            .iter()
            .filter(|&&b| (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&b))
            .map(|&b| b as char)
            .collect();

        if data_string.is_empty() {
            return ParsedReport::default();
        }

        let track1 = locate_span(&data_string, TRACK1_START);
        let track2 = locate_span(&data_string, TRACK2_START);

        ParsedReport {
            data_string,
            track1,
            track2,
            track3: None,
        }
    }
}

/// Locate a sentinel-delimited span: first `start` through the first
/// [`TRACK_END`] at or after it, inclusive of both. `None` unless both
/// sentinels are present.
fn locate_span(data: &str, start: char) -> Option<String> {
    let begin = data.find(start)?;
    let end = begin + data[begin..].find(TRACK_END)?;
    Some(data[begin..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_empty_and_short_buffers() {
        assert_eq!(ReportParser::parse(&[]), ParsedReport::default());
        assert_eq!(ReportParser::parse(&[0x00]), ParsedReport::default());
    }

    #[test]
    fn test_report_id_byte_is_dropped() {
        // '%' as byte 0 must not be treated as a track sentinel.
        let parsed = ReportParser::parse(b"%ABC?");
        assert_eq!(parsed.data_string, "ABC?");
        assert!(parsed.track1.is_none());
    }

    #[test]
    fn test_non_printable_bytes_filtered() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x01, 0x1f]);
        payload.extend_from_slice(b"%AB?");
        payload.extend_from_slice(&[0x7f, 0xff, 0x00]);
        let parsed = ReportParser::parse(&report(&payload));
        assert_eq!(parsed.data_string, "%AB?");
        assert_eq!(parsed.track1.as_deref(), Some("%AB?"));
    }

    #[test]
    fn test_both_tracks_located_independently() {
        let parsed = ReportParser::parse(&report(b"%T1DATA?;T2DATA?"));
        assert_eq!(parsed.track1.as_deref(), Some("%T1DATA?"));
        assert_eq!(parsed.track2.as_deref(), Some(";T2DATA?"));
    }

    #[test]
    fn test_track2_located_on_original_string() {
        // Track 2 search is not confined to the remainder after track 1:
        // a ';' before '%' is still found.
        let parsed = ReportParser::parse(&report(b";22=99?%B1^N^12?"));
        assert_eq!(parsed.track2.as_deref(), Some(";22=99?"));
        assert_eq!(parsed.track1.as_deref(), Some("%B1^N^12?"));
    }

    #[test]
    fn test_missing_end_sentinel_yields_no_span() {
        let parsed = ReportParser::parse(&report(b"%B4111111111111111^DOE"));
        assert!(parsed.track1.is_none());
        assert!(!parsed.data_string.is_empty());
    }

    #[test]
    fn test_missing_start_sentinel_yields_no_span() {
        let parsed = ReportParser::parse(&report(b"garbage?data"));
        assert!(parsed.track1.is_none());
        assert!(parsed.track2.is_none());
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_track3_never_located() {
        let parsed = ReportParser::parse(&report(b"%A?;B?+C3DATA?"));
        assert!(parsed.track3.is_none());
    }

    #[test]
    fn test_end_sentinel_before_start_is_ignored() {
        // The '?' preceding '%' cannot terminate track 1.
        let parsed = ReportParser::parse(&report(b"??%AB?"));
        assert_eq!(parsed.track1.as_deref(), Some("%AB?"));
    }
}
