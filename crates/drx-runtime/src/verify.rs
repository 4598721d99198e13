// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verification engine: pre-PDF gate and post-PDF reconciliation.
//!
//! Both checks are total functions over the summary — they never fail, they
//! return `(ok, issues)` so the pipeline can log exactly what disagreed.
//! Values go through the shared currency parser; missing and `"N/A"` fields
//! compare as `0.0`, which is also how an unparseable Checkbook HAWBs count
//! is treated.

use drx_core::{Summary, SummaryKey};

/// Tolerance for duty comparisons, in currency units.
pub const DUTY_TOLERANCE: f64 = 0.01;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= DUTY_TOLERANCE
}

/// The gate that decides whether the 7501 batch PDF is worth generating.
///
/// Requires all four house counts equal, zero rejected entries, and AMS
/// duty matching report duty within [`DUTY_TOLERANCE`]. Only evaluated when
/// both the AMS and Custom Report stages ran.
#[must_use]
pub fn pre_pdf_gate(summary: &Summary) -> (bool, Vec<String>) {
    let ams_hawbs = summary.number(SummaryKey::AmsTotalHawbs);
    let houses_7501 = summary.number(SummaryKey::TotalHouses7501);
    let report_houses = summary.number(SummaryKey::ReportTotalHouse);
    let checkbook = summary.number(SummaryKey::CheckbookHawbs);
    let rejected = summary.number(SummaryKey::RejectedEntries);
    let ams_duty = summary.number(SummaryKey::AmsDuty);
    let report_duty = summary.number(SummaryKey::ReportDuty);

    let mut issues = Vec::new();
    let houses_match =
        ams_hawbs == houses_7501 && houses_7501 == report_houses && report_houses == checkbook;
    if !houses_match {
        issues.push(format!(
            "houses mismatch (AMS: {ams_hawbs}, 7501: {houses_7501}, Report: {report_houses}, Checkbook: {checkbook})"
        ));
    }
    if rejected != 0.0 {
        issues.push(format!("rejected entries present: {rejected}"));
    }
    if !close(ams_duty, report_duty) {
        issues.push(format!(
            "duty mismatch (AMS: ${ams_duty:.2}, Report: ${report_duty:.2})"
        ));
    }
    (issues.is_empty(), issues)
}

/// Post-PDF reconciliation: informational only, never blocks anything.
///
/// All three duty figures must agree pairwise within [`DUTY_TOLERANCE`] and
/// the T-11 entry counts must match.
#[must_use]
pub fn post_pdf_reconciliation(summary: &Summary) -> (bool, Vec<String>) {
    let ams_duty = summary.number(SummaryKey::AmsDuty);
    let report_duty = summary.number(SummaryKey::ReportDuty);
    let duty_7501 = summary.number(SummaryKey::Duty7501);
    let ams_t11 = summary.number(SummaryKey::AmsTotalT11Entries);
    let t11_7501 = summary.number(SummaryKey::TotalT11Entries7501);

    let mut issues = Vec::new();
    let duties_match = close(ams_duty, report_duty)
        && close(ams_duty, duty_7501)
        && close(report_duty, duty_7501);
    if !duties_match {
        issues.push(format!(
            "duty mismatch (AMS: ${ams_duty:.2}, Report: ${report_duty:.2}, 7501: ${duty_7501:.2})"
        ));
    }
    if ams_t11 != t11_7501 {
        issues.push(format!("T-11 mismatch (AMS: {ams_t11}, 7501: {t11_7501})"));
    }
    (issues.is_empty(), issues)
}
