// SPDX-License-Identifier: MIT OR Apache-2.0
//! Currency string parsing and formatting.
//!
//! Portal pages and workbook cells render money inconsistently (`$9,000.00`,
//! `9000`, empty, `N/A`). Every reconciliation rule funnels through
//! [`parse_currency`] so the tolerance checks compare like with like:
//! `$` and `,` are stripped, surrounding whitespace is ignored, and anything
//! unparseable — including a missing value — is `0.0`.

/// Parse a currency-ish string into a float, defaulting to `0.0`.
#[must_use]
pub fn parse_currency(value: &str) -> f64 {
    let cleaned = value.replace('$', "").replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("n/a") {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Format a monetary amount the way summaries record it: `{n:.2}`.
#[must_use]
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}
