//! Card assembly and payment-card validation.
//!
//! Merges the decoded tracks of one swipe into a [`CardRecord`] and derives
//! the payment-oriented views of it: brand detection by PAN prefix, Luhn
//! validation, and PAN masking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::ParsedReport;
use crate::track::{Track1Fields, Track2Fields, TrackData, TrackDecoder, TrackRecord};

/// Payment card brand, detected from the PAN prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    /// Prefix `4`.
    Visa,

    /// Prefix `51`–`55`.
    Mastercard,

    /// Prefix `34` or `37`.
    AmericanExpress,

    /// Prefix `60`, `62`, `64` or `65`.
    Discover,

    /// Prefix `35`–`39` (minus the American Express prefixes above).
    Jcb,

    /// A PAN long enough to classify but matching no known prefix.
    Unknown,
}

impl CardBrand {
    /// Detect the brand of a PAN.
    ///
    /// Returns `None` for a PAN shorter than four characters. Prefix rules
    /// are evaluated in declaration order, so `37` is American Express, not
    /// JCB.
    ///
    /// # Examples
    ///
    /// ```
    /// use magswipe_decode::CardBrand;
    ///
    /// assert_eq!(CardBrand::from_pan("4111111111111111"), Some(CardBrand::Visa));
    /// assert_eq!(CardBrand::from_pan("371449635398431"), Some(CardBrand::AmericanExpress));
    /// assert_eq!(CardBrand::from_pan("123"), None);
    /// ```
    pub fn from_pan(pan: &str) -> Option<Self> {
        if pan.chars().count() < 4 {
            return None;
        }

        if pan.starts_with('4') {
            return Some(Self::Visa);
        }

        let prefix: Option<u8> = pan.get(0..2).and_then(|p| p.parse().ok());
        Some(match prefix {
            Some(51..=55) => Self::Mastercard,
            Some(34) | Some(37) => Self::AmericanExpress,
            Some(60) | Some(62) | Some(64) | Some(65) => Self::Discover,
            Some(35..=39) => Self::Jcb,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::AmericanExpress => "American Express",
            Self::Discover => "Discover",
            Self::Jcb => "JCB",
            Self::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Mod-10 (Luhn) checksum over a PAN.
///
/// Traverses digits right to left, doubling every second digit and
/// subtracting nine from doubled values above nine. Returns `false` for an
/// empty PAN or one containing non-digits.
///
/// # Examples
///
/// ```
/// use magswipe_decode::luhn_valid;
///
/// assert!(luhn_valid("4111111111111111"));
/// assert!(!luhn_valid("4111111111111112"));
/// ```
pub fn luhn_valid(pan: &str) -> bool {
    if pan.is_empty() || !pan.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = pan
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let mut digit = u32::from(b - b'0');
            if i % 2 == 1 {
                digit *= 2;
                if digit > 9 {
                    digit -= 9;
                }
            }
            digit
        })
        .sum();

    sum % 10 == 0
}

/// One complete swipe: up to three tracks plus read metadata.
///
/// Emitted once per read cycle that yields printable content, then
/// discarded by the core; retaining swipe history is a caller concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Track 1 outcome, when a track 1 span was located.
    pub track1: Option<TrackRecord>,

    /// Track 2 outcome, when a track 2 span was located.
    pub track2: Option<TrackRecord>,

    /// Track 3 outcome, when track 3 data was supplied.
    pub track3: Option<TrackRecord>,

    /// When the swipe was read.
    pub timestamp: DateTime<Utc>,

    /// Id of the device the swipe came from, when known.
    pub device_id: Option<String>,

    /// The full raw report as lowercase space-separated hex bytes.
    pub raw_response_hex: String,

    /// True when at least one track decoded successfully.
    pub has_valid_data: bool,
}

impl CardRecord {
    /// True when at least one track span was located, decoded or not.
    pub fn has_track_data(&self) -> bool {
        self.track1.is_some() || self.track2.is_some() || self.track3.is_some()
    }

    /// The primary account number: track 1's account number, falling back
    /// to track 2's PAN.
    pub fn primary_account_number(&self) -> Option<&str> {
        if let Some(fields) = self.track1_fields() {
            return Some(&fields.account_number);
        }
        self.track2_fields()
            .map(|fields| fields.primary_account_number.as_str())
    }

    /// Cardholder name. Only track 1 carries a name.
    pub fn cardholder_name(&self) -> Option<&str> {
        self.track1_fields()
            .map(|fields| fields.cardholder_name.as_str())
    }

    /// Expiration date (`YYMM`): track 1's value, falling back to track 2's.
    pub fn expiration_date(&self) -> Option<&str> {
        self.track1_fields()
            .and_then(|fields| fields.expiration_date.as_deref())
            .or_else(|| {
                self.track2_fields()
                    .and_then(|fields| fields.expiration_date.as_deref())
            })
    }

    /// Service code: track 1's value, falling back to track 2's.
    pub fn service_code(&self) -> Option<&str> {
        self.track1_fields()
            .and_then(|fields| fields.service_code.as_deref())
            .or_else(|| {
                self.track2_fields()
                    .and_then(|fields| fields.service_code.as_deref())
            })
    }

    /// Brand detected from the PAN prefix, when a PAN of at least four
    /// characters is present.
    pub fn card_brand(&self) -> Option<CardBrand> {
        CardBrand::from_pan(self.primary_account_number()?)
    }

    /// True when the PAN is 13–19 characters long and passes the Luhn
    /// checksum.
    pub fn is_valid_payment_card(&self) -> bool {
        match self.primary_account_number() {
            Some(pan) => (13..=19).contains(&pan.chars().count()) && luhn_valid(pan),
            None => false,
        }
    }

    /// PAN with all but the last four characters replaced by `*`, length
    /// preserved. `None` when the PAN is absent or shorter than four
    /// characters.
    pub fn masked_account_number(&self) -> Option<String> {
        let pan = self.primary_account_number()?;
        let len = pan.chars().count();
        if len < 4 {
            return None;
        }
        let visible: String = pan.chars().skip(len - 4).collect();
        Some(format!("{}{}", "*".repeat(len - 4), visible))
    }

    fn track1_fields(&self) -> Option<&Track1Fields> {
        match self.track1.as_ref()?.data.as_ref()? {
            TrackData::Track1(fields) => Some(fields),
            _ => None,
        }
    }

    fn track2_fields(&self) -> Option<&Track2Fields> {
        match self.track2.as_ref()?.data.as_ref()? {
            TrackData::Track2(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Merges parsed track spans into a [`CardRecord`].
pub struct CardAssembler;

impl CardAssembler {
    /// Assemble a card record from the located spans of one report.
    ///
    /// Total for all inputs; a report with no spans yields a record with
    /// every track absent and `has_valid_data == false`.
    pub fn assemble(parsed: &ParsedReport, raw: &[u8], device_id: Option<&str>) -> CardRecord {
        let track1 = parsed
            .track1
            .as_deref()
            .map(|span| TrackDecoder::decode_track1(span));
        let track2 = parsed
            .track2
            .as_deref()
            .map(|span| TrackDecoder::decode_track2(span));
        let track3 = parsed
            .track3
            .as_deref()
            .map(|span| TrackDecoder::decode_track3(span));

        let has_valid_data = [&track1, &track2, &track3]
            .into_iter()
            .any(|track| track.as_ref().is_some_and(TrackRecord::is_decoded));

        CardRecord {
            track1,
            track2,
            track3,
            timestamp: Utc::now(),
            device_id: device_id.map(str::to_string),
            raw_response_hex: bytes_to_hex(raw),
            has_valid_data,
        }
    }
}

/// Render bytes as lowercase two-digit hex, space separated.
fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
