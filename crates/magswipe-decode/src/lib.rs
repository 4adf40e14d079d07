//! Report-decoding engine for Magtek magnetic-stripe readers.
//!
//! Turns raw HID input reports into structured, validated card data in three
//! stages:
//!
//! 1. [`ReportParser`] strips a report to its printable-ASCII payload and
//!    locates the track 1/track 2 spans by their ISO 7811 sentinels.
//! 2. [`TrackDecoder`] decodes each span against its per-track grammar,
//!    producing a [`TrackRecord`] that is either decoded fields or a failure
//!    reason, never an error.
//! 3. [`CardAssembler`] merges the tracks into a [`CardRecord`] with brand
//!    detection, Luhn validation, and PAN masking.
//!
//! The whole pipeline is total and deterministic: any byte buffer decodes to
//! a well-formed record, and identical buffers decode identically (timestamp
//! aside).
//!
//! # Known gap
//!
//! Track 3 has no sentinel convention shared across reader firmware, so raw
//! reports never yield a track 3 span. [`TrackDecoder::decode_track3`]
//! carries a span verbatim when one is supplied out of band; no grammar is
//! invented for it.
//!
//! # Examples
//!
//! ```
//! use magswipe_decode::{decode, CardBrand};
//!
//! let mut report = vec![0x00];
//! report.extend_from_slice(b"%B4111111111111111^DOE/JOHN^2512101000000000000?");
//!
//! let record = decode(&report);
//! assert!(record.has_valid_data);
//! assert_eq!(record.primary_account_number(), Some("4111111111111111"));
//! assert_eq!(record.card_brand(), Some(CardBrand::Visa));
//! assert!(record.is_valid_payment_card());
//! assert_eq!(record.masked_account_number().as_deref(), Some("************1111"));
//! ```

pub mod card;
pub mod report;
pub mod track;

pub use card::{CardAssembler, CardBrand, CardRecord, luhn_valid};
pub use report::{ParsedReport, ReportParser};
pub use track::{
    Track1Fields, Track2Fields, Track3Fields, TrackData, TrackDecoder, TrackRecord,
};

/// Decode a raw input report into a [`CardRecord`].
pub fn decode(bytes: &[u8]) -> CardRecord {
    decode_for_device(bytes, None)
}

/// Decode a raw input report, tagging the record with the device it came
/// from.
pub fn decode_for_device(bytes: &[u8], device_id: Option<&str>) -> CardRecord {
    let parsed = ReportParser::parse(bytes);
    CardAssembler::assemble(&parsed, bytes, device_id)
}
