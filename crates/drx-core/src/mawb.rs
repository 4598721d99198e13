// SPDX-License-Identifier: MIT OR Apache-2.0
//! The 11-digit Master Air Waybill identity.
//!
//! A [`Mawb`] is always stored normalized: exactly eleven decimal digits, no
//! separators. Parsing accepts any surface form (`235-94731221`,
//! `23594731221`, whitespace-padded) by extracting digits and requiring the
//! count to be exactly eleven.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Error returned when an input cannot be normalized to a MAWB.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MawbError {
    /// The digit-extract of the input was not exactly eleven digits long.
    #[error("MAWB '{raw}' must contain exactly 11 digits, found {found}")]
    WrongDigitCount {
        /// The raw input as given.
        raw: String,
        /// How many digits the input actually contained.
        found: usize,
    },
}

/// A normalized Master Air Waybill number: exactly 11 decimal digits.
///
/// The canonical display form is the raw digit string; use
/// [`formatted`](Mawb::formatted) for the human `XXX-XXXXXXXX` rendering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Mawb(String);

impl Mawb {
    /// Parse and normalize a MAWB from any surface form.
    ///
    /// # Errors
    ///
    /// Returns [`MawbError::WrongDigitCount`] unless the input contains
    /// exactly eleven decimal digits.
    pub fn parse(raw: &str) -> Result<Self, MawbError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 11 {
            return Err(MawbError::WrongDigitCount {
                raw: raw.to_string(),
                found: digits.len(),
            });
        }
        Ok(Self(digits))
    }

    /// The normalized 11-digit string.
    #[must_use]
    pub fn as_digits(&self) -> &str {
        &self.0
    }

    /// The 3-digit airline prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..3]
    }

    /// The 8-digit serial.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.0[3..]
    }

    /// Human rendering: `XXX-XXXXXXXX`.
    #[must_use]
    pub fn formatted(&self) -> String {
        format!("{}-{}", self.prefix(), self.serial())
    }
}

impl std::fmt::Display for Mawb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Mawb {
    type Err = MawbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Mawb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_dashed_form() {
        let mawb = Mawb::parse("235-94731221").unwrap();
        assert_eq!(mawb.as_digits(), "23594731221");
    }

    #[test]
    fn parse_accepts_plain_digits() {
        let mawb = Mawb::parse("23594731221").unwrap();
        assert_eq!(mawb.prefix(), "235");
        assert_eq!(mawb.serial(), "94731221");
    }

    #[test]
    fn parse_rejects_short_input() {
        let err = Mawb::parse("235-947").unwrap_err();
        assert!(
            matches!(err, MawbError::WrongDigitCount { found: 6, .. }),
            "expected WrongDigitCount, got {err:?}"
        );
    }

    #[test]
    fn parse_rejects_twelve_digits() {
        assert!(Mawb::parse("235947312211").is_err());
    }

    #[test]
    fn formatted_is_prefix_dash_serial() {
        let mawb = Mawb::parse("23594731221").unwrap();
        assert_eq!(mawb.formatted(), "235-94731221");
    }

    #[test]
    fn format_normalize_is_idempotent() {
        let once = Mawb::parse("235 94731221").unwrap().formatted();
        let twice = Mawb::parse(&once).unwrap().formatted();
        assert_eq!(once, twice);
    }

    #[test]
    fn serde_roundtrip() {
        let mawb = Mawb::parse("23594731221").unwrap();
        let json = serde_json::to_string(&mawb).unwrap();
        assert_eq!(json, "\"23594731221\"");
        let back: Mawb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mawb);
    }

    #[test]
    fn deserialize_rejects_invalid() {
        let result: Result<Mawb, _> = serde_json::from_str("\"12345\"");
        assert!(result.is_err());
    }
}
