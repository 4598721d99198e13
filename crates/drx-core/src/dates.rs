// SPDX-License-Identifier: MIT OR Apache-2.0
//! Portal date parsing and formatting.
//!
//! The portal renders dates as `mm/dd/yy` in result tables and expects the
//! compact `MMDDYY` form in report/PDF form bodies.

use chrono::NaiveDate;

/// Parse a `mm/dd/yy` cell value. Returns `None` for anything else.
#[must_use]
pub fn parse_mmddyy(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%m/%d/%y").ok()
}

/// Render a date as the portal's table form: `mm/dd/yy`.
#[must_use]
pub fn format_mmddyy(date: NaiveDate) -> String {
    date.format("%m/%d/%y").to_string()
}

/// Render a date as the portal's form-body form: `MMDDYY`, no separators.
#[must_use]
pub fn format_compact(date: NaiveDate) -> String {
    date.format("%m%d%y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_table_dates() {
        let date = parse_mmddyy("03/07/25").unwrap();
        assert_eq!(format_mmddyy(date), "03/07/25");
    }

    #[test]
    fn trims_whitespace() {
        assert!(parse_mmddyy(" 12/31/24 ").is_some());
    }

    #[test]
    fn rejects_non_dates() {
        assert!(parse_mmddyy("Entry Date").is_none());
        assert!(parse_mmddyy("2025-03-07").is_none());
        assert!(parse_mmddyy("").is_none());
    }

    #[test]
    fn compact_form_has_no_separators() {
        let date = parse_mmddyy("03/07/25").unwrap();
        assert_eq!(format_compact(date), "030725");
    }
}
