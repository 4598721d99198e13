// SPDX-License-Identifier: MIT OR Apache-2.0
//! The fixed-key per-MAWB summary map.
//!
//! A [`Summary`] holds exactly the seventeen reconciliation keys, in a fixed
//! order, every value a string. All values start as `"N/A"`; pipeline stages
//! overwrite on success. The key set is part of the wire contract — adding a
//! key is a protocol change, which is why the keys are an enum rather than
//! free-form strings.

use crate::Mawb;
use crate::money::parse_currency;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Placeholder recorded for every field a stage has not (successfully) set.
pub const NOT_AVAILABLE: &str = "N/A";

/// The seventeen summary fields, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum SummaryKey {
    MawbNumber,
    AmsTotalHawbs,
    AmsDuty,
    AmsTotalT11Entries,
    AmsEntriesAccepted,
    RejectedEntries,
    TotalT11Entries7501,
    TotalHouses7501,
    Duty7501,
    ReportDuty,
    ReportTotalHouse,
    TotalInformalDuty,
    CompleteTotalDuty,
    EntryDate,
    CargoReleaseDate,
    BatchPdfUrl7501,
    CheckbookHawbs,
}

impl SummaryKey {
    /// Every key, in canonical order.
    pub const ALL: [SummaryKey; 17] = [
        SummaryKey::MawbNumber,
        SummaryKey::AmsTotalHawbs,
        SummaryKey::AmsDuty,
        SummaryKey::AmsTotalT11Entries,
        SummaryKey::AmsEntriesAccepted,
        SummaryKey::RejectedEntries,
        SummaryKey::TotalT11Entries7501,
        SummaryKey::TotalHouses7501,
        SummaryKey::Duty7501,
        SummaryKey::ReportDuty,
        SummaryKey::ReportTotalHouse,
        SummaryKey::TotalInformalDuty,
        SummaryKey::CompleteTotalDuty,
        SummaryKey::EntryDate,
        SummaryKey::CargoReleaseDate,
        SummaryKey::BatchPdfUrl7501,
        SummaryKey::CheckbookHawbs,
    ];

    /// The wire name of this key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryKey::MawbNumber => "MAWB Number",
            SummaryKey::AmsTotalHawbs => "AMS Total HAWBs",
            SummaryKey::AmsDuty => "AMS Duty",
            SummaryKey::AmsTotalT11Entries => "AMS Total T-11 Entries",
            SummaryKey::AmsEntriesAccepted => "AMS Entries Accepted",
            SummaryKey::RejectedEntries => "Rejected Entries",
            SummaryKey::TotalT11Entries7501 => "7501 Total T-11 Entries",
            SummaryKey::TotalHouses7501 => "7501 Total Houses",
            SummaryKey::Duty7501 => "7501 Duty",
            SummaryKey::ReportDuty => "Report Duty",
            SummaryKey::ReportTotalHouse => "Report Total House",
            SummaryKey::TotalInformalDuty => "Total Informal Duty",
            SummaryKey::CompleteTotalDuty => "Complete Total Duty",
            SummaryKey::EntryDate => "Entry Date",
            SummaryKey::CargoReleaseDate => "Cargo Release Date",
            SummaryKey::BatchPdfUrl7501 => "7501 Batch PDF URL",
            SummaryKey::CheckbookHawbs => "Checkbook HAWBs",
        }
    }

    /// Look a key up by wire name.
    #[must_use]
    pub fn from_str_opt(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered map over exactly the [`SummaryKey`] set.
///
/// Construction fills every key with [`NOT_AVAILABLE`]; there is no way to
/// remove a key or introduce a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    values: BTreeMap<SummaryKey, String>,
}

impl Summary {
    /// A summary for `mawb` with every field `"N/A"`, the MAWB number set,
    /// and `Checkbook HAWBs` taken from the batch item when present.
    #[must_use]
    pub fn new(mawb: &Mawb, checkbook_hawbs: Option<&str>) -> Self {
        let mut values = BTreeMap::new();
        for key in SummaryKey::ALL {
            values.insert(key, NOT_AVAILABLE.to_string());
        }
        values.insert(SummaryKey::MawbNumber, mawb.as_digits().to_string());
        if let Some(hawbs) = checkbook_hawbs {
            values.insert(SummaryKey::CheckbookHawbs, hawbs.trim().to_string());
        }
        Self { values }
    }

    /// The recorded value for `key`.
    #[must_use]
    pub fn get(&self, key: SummaryKey) -> &str {
        self.values
            .get(&key)
            .map_or(NOT_AVAILABLE, String::as_str)
    }

    /// Overwrite the value for `key`.
    pub fn set(&mut self, key: SummaryKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// `true` once a stage has written something other than `"N/A"`.
    #[must_use]
    pub fn is_set(&self, key: SummaryKey) -> bool {
        self.get(key) != NOT_AVAILABLE
    }

    /// The value for `key` as a number, via the shared currency parser.
    ///
    /// Missing and `"N/A"` values are `0.0`.
    #[must_use]
    pub fn number(&self, key: SummaryKey) -> f64 {
        parse_currency(self.get(key))
    }

    /// Iterate `(key, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (SummaryKey, &str)> {
        SummaryKey::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(SummaryKey::ALL.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Summary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SummaryVisitor;

        impl<'de> Visitor<'de> for SummaryVisitor {
            type Value = Summary;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of summary fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Summary, A::Error> {
                let mut values = BTreeMap::new();
                for key in SummaryKey::ALL {
                    values.insert(key, NOT_AVAILABLE.to_string());
                }
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    // Unknown fields are dropped rather than rejected so old
                    // snapshots with side-band markers still load.
                    if let Some(key) = SummaryKey::from_str_opt(&name) {
                        values.insert(key, value);
                    }
                }
                Ok(Summary { values })
            }
        }

        deserializer.deserialize_map(SummaryVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mawb() -> Mawb {
        Mawb::parse("235-94731221").unwrap()
    }

    #[test]
    fn new_summary_has_exactly_the_fixed_keys() {
        let summary = Summary::new(&mawb(), None);
        let keys: Vec<&str> = summary.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys.len(), 17);
        assert_eq!(keys[0], "MAWB Number");
        assert_eq!(keys[16], "Checkbook HAWBs");
    }

    #[test]
    fn new_summary_defaults_to_not_available() {
        let summary = Summary::new(&mawb(), None);
        assert_eq!(summary.get(SummaryKey::AmsDuty), "N/A");
        assert_eq!(summary.get(SummaryKey::CheckbookHawbs), "N/A");
        assert_eq!(summary.get(SummaryKey::MawbNumber), "23594731221");
    }

    #[test]
    fn checkbook_hawbs_is_trimmed_into_place() {
        let summary = Summary::new(&mawb(), Some(" 4250 "));
        assert_eq!(summary.get(SummaryKey::CheckbookHawbs), "4250");
    }

    #[test]
    fn set_overwrites_and_marks_set() {
        let mut summary = Summary::new(&mawb(), None);
        assert!(!summary.is_set(SummaryKey::AmsDuty));
        summary.set(SummaryKey::AmsDuty, "$1,234.56");
        assert!(summary.is_set(SummaryKey::AmsDuty));
        assert_eq!(summary.number(SummaryKey::AmsDuty), 1234.56);
    }

    #[test]
    fn number_of_unset_field_is_zero() {
        let summary = Summary::new(&mawb(), None);
        assert_eq!(summary.number(SummaryKey::ReportDuty), 0.0);
    }

    #[test]
    fn serialize_preserves_canonical_order() {
        let summary = Summary::new(&mawb(), Some("10"));
        let json = serde_json::to_string(&summary).unwrap();
        let mawb_pos = json.find("MAWB Number").unwrap();
        let hawbs_pos = json.find("AMS Total HAWBs").unwrap();
        let checkbook_pos = json.find("Checkbook HAWBs").unwrap();
        assert!(mawb_pos < hawbs_pos && hawbs_pos < checkbook_pos);
    }

    #[test]
    fn serde_roundtrip_keeps_values() {
        let mut summary = Summary::new(&mawb(), Some("10"));
        summary.set(SummaryKey::AmsDuty, "$5.00");
        let json = serde_json::to_string(&summary).unwrap();
        let back: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn deserialize_ignores_unknown_fields() {
        let json = r#"{"MAWB Number":"23594731221","Master Status":"Not Found"}"#;
        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.get(SummaryKey::MawbNumber), "23594731221");
        assert_eq!(summary.get(SummaryKey::AmsDuty), "N/A");
    }
}
