// SPDX-License-Identifier: MIT OR Apache-2.0
//! Custom Report download flow.
//!
//! The portal's report endpoint is driven by the template's field arrays,
//! not a numeric template id — `templateId` is always sent as `"0"`. The
//! report window starts at the oldest entry date; the end date is bounded to
//! 25 days past it when the entry is old enough, which keeps the portal-side
//! query from scanning a year of history.

use crate::PortalError;
use crate::client::PortalClient;
use chrono::NaiveDate;
use drx_core::dates::format_compact;
use drx_core::{Mawb, TemplatePayload};
use tracing::info;

/// Download endpoint, relative to the portal origin.
pub const CUSTOM_REPORT_PATH: &str = "/app/entry/downloadCustomizableReport.do";

/// Referer presented on the download POST.
const CUSTOM_REPORT_PAGE_PATH: &str = "/app/entry/customizableReport.jsp";

/// Window bound: entries older than this many days get a clamped end date.
const WINDOW_DAYS: i64 = 25;

/// A downloaded Custom Report workbook.
#[derive(Debug, Clone)]
pub struct CustomReportDownload {
    /// The xlsx bytes.
    pub bytes: Vec<u8>,
    /// Canonical artifact filename: `{XXX-XXXXXXXX} customizable report.xlsx`.
    pub filename: String,
}

/// The report window `[begin, end]` for an oldest-entry date.
///
/// `end = begin + 25 days` when today is at least 25 days past `begin`,
/// otherwise `end = today`.
#[must_use]
pub fn report_window(oldest_entry: NaiveDate, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let age_days = (today - oldest_entry).num_days();
    let end = if age_days >= WINDOW_DAYS {
        oldest_entry + chrono::Duration::days(WINDOW_DAYS)
    } else {
        today
    };
    (oldest_entry, end)
}

/// Build the download form body from a template payload.
///
/// Scalar `defaultValues` are merged verbatim; the five field arrays are
/// serialized as repeated keys.
#[must_use]
pub fn build_form(
    payload: &TemplatePayload,
    mawb: &Mawb,
    oldest_entry: NaiveDate,
    today: NaiveDate,
) -> Vec<(String, String)> {
    let (begin, end) = report_window(oldest_entry, today);

    let mut form = vec![
        ("templateId".to_string(), "0".to_string()),
        ("begin".to_string(), format_compact(begin)),
        ("end".to_string(), format_compact(end)),
        ("masterBill".to_string(), mawb.as_digits().to_string()),
    ];
    for (key, value) in &payload.default_values {
        form.push((key.clone(), value.clone()));
    }
    for (key, values) in [
        ("headerFields", &payload.header_fields),
        ("manifestFields", &payload.manifest_fields),
        ("invoiceFields", &payload.invoice_fields),
        ("lineFields", &payload.line_fields),
        ("tariffFields", &payload.tariff_fields),
    ] {
        for value in values {
            form.push((key.to_string(), value.clone()));
        }
    }
    form
}

/// Download the report workbook.
///
/// # Errors
///
/// Returns [`PortalError::UnexpectedContentType`] when the portal answers
/// with anything that is not a spreadsheet (usually an HTML error page), or
/// any transport-level [`PortalError`].
pub async fn download(
    client: &PortalClient,
    mawb: &Mawb,
    payload: &TemplatePayload,
    oldest_entry: NaiveDate,
    today: NaiveDate,
) -> Result<CustomReportDownload, PortalError> {
    let form = build_form(payload, mawb, oldest_entry, today);
    info!(
        target: "drx.portal",
        mawb = %mawb,
        header_fields = payload.header_fields.len(),
        manifest_fields = payload.manifest_fields.len(),
        "requesting custom report"
    );

    let response = client
        .post_form(
            CUSTOM_REPORT_PATH,
            CUSTOM_REPORT_PAGE_PATH,
            &form,
            client.timeouts().custom_report(),
        )
        .await?;

    let content_type = response.content_type.to_lowercase();
    if !content_type.contains("excel") && !content_type.contains("spreadsheet") {
        return Err(PortalError::UnexpectedContentType {
            expected: "excel/spreadsheet",
            got: response.content_type,
        });
    }

    info!(
        target: "drx.portal",
        mawb = %mawb,
        bytes = response.bytes.len(),
        "custom report downloaded"
    );
    Ok(CustomReportDownload {
        bytes: response.bytes,
        filename: format!("{} customizable report.xlsx", mawb.formatted()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payload() -> TemplatePayload {
        TemplatePayload {
            header_fields: vec!["entryNo".into(), "entryDate".into()],
            manifest_fields: vec!["houseBill".into()],
            invoice_fields: Vec::new(),
            line_fields: Vec::new(),
            tariff_fields: Vec::new(),
            default_values: BTreeMap::from([
                ("entryStatus".to_string(), String::new()),
                ("reportFormat".to_string(), "xlsx".to_string()),
            ]),
        }
    }

    #[test]
    fn window_clamps_old_entries_to_25_days() {
        let (begin, end) = report_window(date(2025, 1, 1), date(2025, 3, 1));
        assert_eq!(begin, date(2025, 1, 1));
        assert_eq!(end, date(2025, 1, 26));
    }

    #[test]
    fn window_uses_today_for_recent_entries() {
        let (begin, end) = report_window(date(2025, 2, 20), date(2025, 3, 1));
        assert_eq!(begin, date(2025, 2, 20));
        assert_eq!(end, date(2025, 3, 1));
    }

    #[test]
    fn window_boundary_at_exactly_25_days_clamps() {
        let (_, end) = report_window(date(2025, 1, 1), date(2025, 1, 26));
        assert_eq!(end, date(2025, 1, 26));
    }

    #[test]
    fn form_pins_template_id_to_zero() {
        let mawb = Mawb::parse("235-94731221").unwrap();
        let form = build_form(&payload(), &mawb, date(2025, 1, 1), date(2025, 1, 10));
        assert!(form.contains(&("templateId".to_string(), "0".to_string())));
        assert!(form.contains(&("masterBill".to_string(), "23594731221".to_string())));
        assert!(form.contains(&("begin".to_string(), "010125".to_string())));
        assert!(form.contains(&("end".to_string(), "011025".to_string())));
    }

    #[test]
    fn form_repeats_array_fields_and_merges_defaults() {
        let mawb = Mawb::parse("235-94731221").unwrap();
        let form = build_form(&payload(), &mawb, date(2025, 1, 1), date(2025, 1, 10));
        let headers: Vec<&str> = form
            .iter()
            .filter(|(k, _)| k == "headerFields")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(headers, vec!["entryNo", "entryDate"]);
        assert!(form.contains(&("reportFormat".to_string(), "xlsx".to_string())));
        assert!(!form.iter().any(|(k, _)| k == "invoiceFields"));
    }
}
