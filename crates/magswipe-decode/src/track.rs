//! Per-track grammar decoding.
//!
//! Decodes the sentinel-delimited spans located by the report parser into
//! structured track fields. Decoding is total: a grammar violation produces a
//! well-formed [`TrackRecord`] with a failure reason instead of an error, so
//! card assembly can always proceed.
//!
//! # Track grammars
//!
//! - **Track 1** (`%` ... `?`): fields separated by `^`: format code plus
//!   account number, cardholder name, then additional info packing the
//!   expiration date (4), service code (3), and discretionary data (rest).
//! - **Track 2** (`;` … `?`): PAN and additional info separated by the first
//!   `=`, with the same additional-info packing as track 1.
//! - **Track 3**: firmware-specific and unstandardized; carried verbatim.
//!
//! # Examples
//!
//! ```
//! use magswipe_decode::{TrackData, TrackDecoder};
//!
//! let record = TrackDecoder::decode_track2(";4111111111111111=2512101000000000000?");
//! assert!(record.is_decoded());
//!
//! match record.data.unwrap() {
//!     TrackData::Track2(fields) => {
//!         assert_eq!(fields.primary_account_number, "4111111111111111");
//!         assert_eq!(fields.expiration_date.as_deref(), Some("2512"));
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::report::{TRACK1_START, TRACK2_START, TRACK_END};

/// Failure reason reported when a track span has too few fields.
pub const FAILURE_INCOMPLETE: &str = "incomplete";

/// Structured fields of an ISO 7811 track 1 span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track1Fields {
    /// Account number, with the leading alphabetic format code stripped.
    pub account_number: String,

    /// Cardholder name as encoded (typically `SURNAME/FIRST`).
    pub cardholder_name: String,

    /// Expiration date (`YYMM`), when the additional info carries one.
    pub expiration_date: Option<String>,

    /// Three-digit service code, when present.
    pub service_code: Option<String>,

    /// Issuer discretionary data following the service code, when present.
    pub discretionary_data: Option<String>,
}

/// Structured fields of an ISO 7811 track 2 span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track2Fields {
    /// Primary account number.
    pub primary_account_number: String,

    /// Expiration date (`YYMM`), when the additional info carries one.
    pub expiration_date: Option<String>,

    /// Three-digit service code, when present.
    pub service_code: Option<String>,

    /// Issuer discretionary data following the service code, when present.
    pub discretionary_data: Option<String>,
}

/// Track 3 payload, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track3Fields {
    /// The entire span, unparsed.
    pub additional_data: String,
}

/// Decoded payload of a single track.
///
/// Structured fields only exist inside this enum, so a failed record (with
/// `data == None`) cannot carry partially-populated fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "track", rename_all = "snake_case")]
pub enum TrackData {
    /// Track 1 fields.
    Track1(Track1Fields),

    /// Track 2 fields.
    Track2(Track2Fields),

    /// Track 3 verbatim payload.
    Track3(Track3Fields),
}

/// Outcome of decoding one track span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Track number (1, 2 or 3).
    pub number: u8,

    /// The raw span as located in the report, sentinels included.
    pub raw: String,

    /// Structured fields, present only when decoding succeeded.
    pub data: Option<TrackData>,

    /// Grammar violation description, present only when decoding failed.
    pub failure_reason: Option<String>,
}

impl TrackRecord {
    /// Build a successfully decoded record.
    fn decoded(number: u8, raw: &str, data: TrackData) -> Self {
        Self {
            number,
            raw: raw.to_string(),
            data: Some(data),
            failure_reason: None,
        }
    }

    /// Build a failed record carrying only the raw span and a reason.
    fn failed(number: u8, raw: &str, reason: &str) -> Self {
        Self {
            number,
            raw: raw.to_string(),
            data: None,
            failure_reason: Some(reason.to_string()),
        }
    }

    /// Whether this track decoded successfully.
    pub fn is_decoded(&self) -> bool {
        self.data.is_some()
    }
}

/// Stateless per-track grammar decoder.
pub struct TrackDecoder;

impl TrackDecoder {
    /// Decode a track 1 span.
    ///
    /// Strips the `%`/`?` sentinels and splits on `^`. Fewer than three
    /// fields is a decode failure; missing sub-fields of the additional info
    /// are simply absent.
    pub fn decode_track1(span: &str) -> TrackRecord {
        let content = strip_sentinels(span, TRACK1_START);
        let parts: Vec<&str> = content.split('^').collect();
        if parts.len() < 3 {
            return TrackRecord::failed(1, span, FAILURE_INCOMPLETE);
        }

        let (expiration_date, service_code, discretionary_data) = split_additional_info(parts[2]);
        TrackRecord::decoded(
            1,
            span,
            TrackData::Track1(Track1Fields {
                account_number: strip_format_code(parts[0]).to_string(),
                cardholder_name: parts[1].to_string(),
                expiration_date,
                service_code,
                discretionary_data,
            }),
        )
    }

    /// Decode a track 2 span.
    ///
    /// Strips the `;`/`?` sentinels and splits on the first `=` into PAN and
    /// additional info. A span without `=` is a decode failure.
    pub fn decode_track2(span: &str) -> TrackRecord {
        let content = strip_sentinels(span, TRACK2_START);
        let Some((pan, additional)) = content.split_once('=') else {
            return TrackRecord::failed(2, span, FAILURE_INCOMPLETE);
        };

        let (expiration_date, service_code, discretionary_data) = split_additional_info(additional);
        TrackRecord::decoded(
            2,
            span,
            TrackData::Track2(Track2Fields {
                primary_account_number: pan.to_string(),
                expiration_date,
                service_code,
                discretionary_data,
            }),
        )
    }

    /// Decode a track 3 span.
    ///
    /// Track 3 has no cross-firmware grammar; the span is carried verbatim
    /// and always counts as decoded.
    pub fn decode_track3(span: &str) -> TrackRecord {
        TrackRecord::decoded(
            3,
            span,
            TrackData::Track3(Track3Fields {
                additional_data: span.to_string(),
            }),
        )
    }
}

/// Strip the start sentinel and the shared end sentinel when present.
fn strip_sentinels(span: &str, start: char) -> &str {
    let span = span.strip_prefix(start).unwrap_or(span);
    span.strip_suffix(TRACK_END).unwrap_or(span)
}

/// Drop a single leading alphabetic format code (the `B` in `%B4111…`).
fn strip_format_code(field: &str) -> &str {
    match field.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => &field[1..],
        _ => field,
    }
}

/// Unpack additional info into (expiration, service code, discretionary).
///
/// Layout: first 4 chars are the `YYMM` expiration, next 3 the service code,
/// the remainder discretionary data. Sub-fields the span is too short for
/// are absent, never an error.
fn split_additional_info(info: &str) -> (Option<String>, Option<String>, Option<String>) {
    let expiration = info.get(0..4).map(str::to_string);
    let service = info.get(4..7).map(str::to_string);
    let discretionary = if info.len() > 7 {
        info.get(7..).map(str::to_string)
    } else {
        None
    };
    (expiration, service, discretionary)
}
