// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-report
//!
//! Custom Report workbook parser.
//!
//! Column semantics are shared by both dialects (0-indexed): informal duty,
//! complete duty, a house-indicator column whose non-empty cells each count
//! one house, and entry/cargo-release date columns collected as sets. The
//! Shoaib dialect additionally carries a per-row key in column 0 and sums
//! duty only once per unique key; house counting is never deduplicated.
//!
//! A row whose required cells cannot be read — missing columns, non-numeric
//! duty text — is skipped whole rather than partially counted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDateTime;
use drx_core::ReportDialect;
use drx_core::money::format_amount;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info};

/// FTE-Match column layout (0-indexed).
mod fte_cols {
    pub const ENTRY_DATE: usize = 2;
    pub const INFORMAL: usize = 4;
    pub const COMPLETE: usize = 6;
    pub const RELEASE_DATE: usize = 8;
    pub const HOUSE: usize = 13;
}

/// Shoaib-Match column layout (0-indexed).
mod shoaib_cols {
    pub const KEY: usize = 0;
    pub const ENTRY_DATE: usize = 3;
    pub const INFORMAL: usize = 5;
    pub const COMPLETE: usize = 7;
    pub const RELEASE_DATE: usize = 9;
    pub const HOUSE: usize = 13;
}

/// Errors from workbook reading. Cell-level trouble never errors; it skips
/// the row.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The bytes were not a readable xlsx workbook.
    #[error("failed to open report workbook")]
    Workbook(#[source] calamine::XlsxError),

    /// The workbook had no sheets.
    #[error("report workbook contains no sheets")]
    NoSheet,
}

/// Totals extracted from one report workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSummary {
    /// Informal + complete duty.
    pub report_duty: f64,
    /// Count of non-empty house-indicator cells.
    pub total_house: u64,
    /// Sum of the informal duty column.
    pub total_informal: f64,
    /// Sum of the complete duty column.
    pub complete_duty: f64,
    /// Distinct entry dates, `mm/dd/yy`.
    pub entry_dates: BTreeSet<String>,
    /// Distinct cargo release dates, `mm/dd/yy`.
    pub release_dates: BTreeSet<String>,
}

impl ReportSummary {
    /// Report duty formatted for the summary map.
    #[must_use]
    pub fn report_duty_text(&self) -> String {
        format_amount(self.report_duty)
    }

    /// Informal duty formatted for the summary map.
    #[must_use]
    pub fn total_informal_text(&self) -> String {
        format_amount(self.total_informal)
    }

    /// Complete duty formatted for the summary map.
    #[must_use]
    pub fn complete_duty_text(&self) -> String {
        format_amount(self.complete_duty)
    }

    /// Sorted entry dates joined `", "`, or `N/A` when none.
    #[must_use]
    pub fn entry_dates_text(&self) -> String {
        joined_or_na(&self.entry_dates)
    }

    /// Sorted release dates joined `", "`, or `N/A` when none.
    #[must_use]
    pub fn release_dates_text(&self) -> String {
        joined_or_na(&self.release_dates)
    }
}

fn joined_or_na(dates: &BTreeSet<String>) -> String {
    if dates.is_empty() {
        "N/A".to_string()
    } else {
        dates.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Parse a downloaded workbook.
///
/// # Errors
///
/// Returns [`ReportError`] when the bytes are not a workbook at all; bad
/// rows are skipped, never fatal.
pub fn parse_workbook(bytes: &[u8], dialect: ReportDialect) -> Result<ReportSummary, ReportError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes.to_vec())).map_err(ReportError::Workbook)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReportError::NoSheet)?
        .map_err(ReportError::Workbook)?;

    let summary = parse_rows(range.rows().skip(1), dialect);
    info!(
        target: "drx.report",
        dialect = ?dialect,
        duty = summary.report_duty,
        houses = summary.total_house,
        "report workbook parsed"
    );
    Ok(summary)
}

/// Core row walk, shared by both dialects and directly testable.
pub fn parse_rows<'a, I>(rows: I, dialect: ReportDialect) -> ReportSummary
where
    I: Iterator<Item = &'a [Data]>,
{
    match dialect {
        ReportDialect::FteMatch => parse_fte(rows),
        ReportDialect::ShoaibMatch => parse_shoaib(rows),
    }
}

fn parse_fte<'a, I: Iterator<Item = &'a [Data]>>(rows: I) -> ReportSummary {
    let mut summary = ReportSummary::default();
    let mut skipped = 0usize;

    for row in rows {
        let Some(parts) = fte_row(row) else {
            skipped += 1;
            continue;
        };
        summary.total_informal += parts.informal;
        summary.complete_duty += parts.complete;
        summary.report_duty += parts.informal + parts.complete;
        if parts.house {
            summary.total_house += 1;
        }
        if let Some(date) = parts.entry_date {
            summary.entry_dates.insert(date);
        }
        if let Some(date) = parts.release_date {
            summary.release_dates.insert(date);
        }
    }
    if skipped > 0 {
        debug!(target: "drx.report", skipped, "skipped unreadable report rows");
    }
    summary
}

fn parse_shoaib<'a, I: Iterator<Item = &'a [Data]>>(rows: I) -> ReportSummary {
    let mut summary = ReportSummary::default();
    let mut seen: BTreeMap<String, ()> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in rows {
        let Some(key) = cell_key(row.get(shoaib_cols::KEY)) else {
            continue;
        };
        let Some(informal) = cell_number(row.get(shoaib_cols::INFORMAL)) else {
            skipped += 1;
            continue;
        };
        let Some(complete) = cell_number(row.get(shoaib_cols::COMPLETE)) else {
            skipped += 1;
            continue;
        };
        if row.len() <= shoaib_cols::HOUSE {
            skipped += 1;
            continue;
        }

        // Houses come from every row; duty only once per key.
        if cell_is_nonempty(row.get(shoaib_cols::HOUSE)) {
            summary.total_house += 1;
        }
        if seen.insert(key, ()).is_none() {
            summary.total_informal += informal;
            summary.complete_duty += complete;
        }
        if let Some(date) = cell_date(row.get(shoaib_cols::ENTRY_DATE)) {
            summary.entry_dates.insert(date);
        }
        if let Some(date) = cell_date(row.get(shoaib_cols::RELEASE_DATE)) {
            summary.release_dates.insert(date);
        }
    }
    summary.report_duty = summary.total_informal + summary.complete_duty;
    if skipped > 0 {
        debug!(target: "drx.report", skipped, "skipped unreadable report rows");
    }
    summary
}

struct FteRow {
    informal: f64,
    complete: f64,
    house: bool,
    entry_date: Option<String>,
    release_date: Option<String>,
}

fn fte_row(row: &[Data]) -> Option<FteRow> {
    if row.len() <= fte_cols::HOUSE {
        return None;
    }
    Some(FteRow {
        informal: cell_number(row.get(fte_cols::INFORMAL))?,
        complete: cell_number(row.get(fte_cols::COMPLETE))?,
        house: cell_is_nonempty(row.get(fte_cols::HOUSE)),
        entry_date: cell_date(row.get(fte_cols::ENTRY_DATE)),
        release_date: cell_date(row.get(fte_cols::RELEASE_DATE)),
    })
}

/// Numeric read: empty cells are zero, numeric text parses, anything else
/// poisons the row.
fn cell_number(cell: Option<&Data>) -> Option<f64> {
    match cell? {
        Data::Empty => Some(0.0),
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.replace(['$', ','], "").parse().ok()
            }
        }
        _ => None,
    }
}

fn cell_is_nonempty(cell: Option<&Data>) -> bool {
    match cell {
        None | Some(Data::Empty) => false,
        Some(Data::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Non-empty column-0 key for the Shoaib dialect.
fn cell_key(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Date cells: native datetimes render `mm/dd/yy`; text is re-parsed from
/// the exporter's `YYYY-MM-DD HH:MM:SS` form, falling back to the raw text.
fn cell_date(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Empty => None,
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.format("%m/%d/%y").to_string()),
        Data::DateTimeIso(s) => Some(reformat_date_text(s)),
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| reformat_date_text(trimmed))
        }
        other => Some(other.to_string()),
    }
}

fn reformat_date_text(text: &str) -> String {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%m/%d/%y").to_string())
        .unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn f(value: f64) -> Data {
        Data::Float(value)
    }

    /// An FTE-shaped row: 14 columns with the duty/house/date cells placed.
    fn fte(informal: Data, complete: Data, entry: Data, release: Data, house: Data) -> Vec<Data> {
        let mut row = vec![Data::Empty; 14];
        row[fte_cols::INFORMAL] = informal;
        row[fte_cols::COMPLETE] = complete;
        row[fte_cols::ENTRY_DATE] = entry;
        row[fte_cols::RELEASE_DATE] = release;
        row[fte_cols::HOUSE] = house;
        row
    }

    /// A Shoaib-shaped row.
    fn shoaib(
        key: Data,
        informal: Data,
        complete: Data,
        entry: Data,
        release: Data,
        house: Data,
    ) -> Vec<Data> {
        let mut row = vec![Data::Empty; 14];
        row[shoaib_cols::KEY] = key;
        row[shoaib_cols::INFORMAL] = informal;
        row[shoaib_cols::COMPLETE] = complete;
        row[shoaib_cols::ENTRY_DATE] = entry;
        row[shoaib_cols::RELEASE_DATE] = release;
        row[shoaib_cols::HOUSE] = house;
        row
    }

    fn run(rows: &[Vec<Data>], dialect: ReportDialect) -> ReportSummary {
        parse_rows(rows.iter().map(Vec::as_slice), dialect)
    }

    #[test]
    fn fte_sums_duty_and_counts_houses() {
        let rows = vec![
            fte(f(10.0), f(20.0), s("01/02/25"), s("01/05/25"), s("H1")),
            fte(f(1.5), f(2.5), s("01/03/25"), s("01/05/25"), Data::Empty),
        ];
        let summary = run(&rows, ReportDialect::FteMatch);
        assert_eq!(summary.total_informal, 11.5);
        assert_eq!(summary.complete_duty, 22.5);
        assert_eq!(summary.report_duty, 34.0);
        assert_eq!(summary.total_house, 1);
        assert_eq!(summary.entry_dates_text(), "01/02/25, 01/03/25");
        assert_eq!(summary.release_dates_text(), "01/05/25");
    }

    #[test]
    fn fte_skips_rows_with_unreadable_duty() {
        let rows = vec![
            fte(s("pending"), f(5.0), s("01/02/25"), Data::Empty, s("H")),
            fte(f(1.0), f(2.0), Data::Empty, Data::Empty, s("H")),
        ];
        let summary = run(&rows, ReportDialect::FteMatch);
        // First row is skipped whole: no duty, no house, no date.
        assert_eq!(summary.report_duty, 3.0);
        assert_eq!(summary.total_house, 1);
        assert!(summary.entry_dates.is_empty());
    }

    #[test]
    fn fte_short_rows_are_skipped() {
        let rows = vec![vec![f(1.0); 5]];
        let summary = run(&rows, ReportDialect::FteMatch);
        assert_eq!(summary.report_duty, 0.0);
    }

    #[test]
    fn fte_empty_duty_cells_read_as_zero() {
        let rows = vec![fte(Data::Empty, s(""), s("01/02/25"), Data::Empty, s("x"))];
        let summary = run(&rows, ReportDialect::FteMatch);
        assert_eq!(summary.report_duty, 0.0);
        assert_eq!(summary.total_house, 1);
    }

    #[test]
    fn fte_currency_text_parses() {
        let rows = vec![fte(s("$1,200.50"), f(0.0), Data::Empty, Data::Empty, Data::Empty)];
        let summary = run(&rows, ReportDialect::FteMatch);
        assert_eq!(summary.total_informal, 1200.50);
    }

    #[test]
    fn shoaib_dedupes_duty_by_key_but_not_houses() {
        let rows = vec![
            shoaib(s("E-1"), f(10.0), f(20.0), s("01/02/25"), Data::Empty, s("H")),
            shoaib(s("E-1"), f(10.0), f(20.0), s("01/02/25"), Data::Empty, s("H")),
            shoaib(s("E-2"), f(1.0), f(2.0), s("01/03/25"), Data::Empty, s("H")),
        ];
        let summary = run(&rows, ReportDialect::ShoaibMatch);
        // Duty counted once per key, houses counted per row.
        assert_eq!(summary.total_informal, 11.0);
        assert_eq!(summary.complete_duty, 22.0);
        assert_eq!(summary.report_duty, 33.0);
        assert_eq!(summary.total_house, 3);
        assert_eq!(summary.entry_dates_text(), "01/02/25, 01/03/25");
    }

    #[test]
    fn shoaib_rows_without_key_are_ignored() {
        let rows = vec![
            shoaib(Data::Empty, f(99.0), f(99.0), s("01/02/25"), Data::Empty, s("H")),
            shoaib(s(" "), f(50.0), f(50.0), Data::Empty, Data::Empty, s("H")),
            shoaib(s("E-1"), f(1.0), f(2.0), Data::Empty, Data::Empty, Data::Empty),
        ];
        let summary = run(&rows, ReportDialect::ShoaibMatch);
        assert_eq!(summary.report_duty, 3.0);
        assert_eq!(summary.total_house, 0);
    }

    #[test]
    fn date_text_in_export_form_is_reformatted() {
        assert_eq!(reformat_date_text("2025-03-07 00:00:00"), "03/07/25");
        assert_eq!(reformat_date_text("03/07/25"), "03/07/25");
    }

    #[test]
    fn empty_summary_renders_na_dates() {
        let summary = ReportSummary::default();
        assert_eq!(summary.entry_dates_text(), "N/A");
        assert_eq!(summary.report_duty_text(), "0.00");
    }

    #[test]
    fn non_workbook_bytes_error() {
        assert!(matches!(
            parse_workbook(b"definitely not xlsx", ReportDialect::FteMatch),
            Err(ReportError::Workbook(_))
        ));
    }
}
