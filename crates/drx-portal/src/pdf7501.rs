// SPDX-License-Identifier: MIT OR Apache-2.0
//! 7501 batch PDF generation flow.
//!
//! The two-step form flow is compressed to one POST: the payload the form
//! page would produce is constructed directly, which saves a round trip per
//! MAWB. `entryNos` is comma-joined with a trailing comma — the portal
//! rejects the list without it.

use crate::PortalError;
use crate::client::PortalClient;
use chrono::NaiveDate;
use drx_core::dates::format_compact;
use tracing::info;

/// PDF endpoint, relative to the portal origin.
pub const PDF_BATCH_PATH: &str = "/app/entry/7501_Batch.pdf";

/// Referer presented on the PDF POST.
const ENTRIES_PAGE_PATH: &str = "/app/entry/index.jsp";

/// Build the generation form body.
#[must_use]
pub fn build_form(entry_numbers: &[String], signed_date: NaiveDate) -> Vec<(String, String)> {
    let mut entry_nos = entry_numbers.join(",");
    entry_nos.push(',');

    vec![
        ("signature".to_string(), String::new()),
        ("digitalSignature".to_string(), String::new()),
        ("signedDate".to_string(), format_compact(signed_date)),
        ("broker".to_string(), "false".to_string()),
        ("cashier".to_string(), "false".to_string()),
        ("record".to_string(), "false".to_string()),
        ("original".to_string(), "false".to_string()),
        ("multiple".to_string(), "false".to_string()),
        ("type7501".to_string(), "2".to_string()),
        ("separateConsignees".to_string(), "false".to_string()),
        ("printPartNumbers".to_string(), "false".to_string()),
        ("printMfrName".to_string(), "false".to_string()),
        ("entryNoBlank".to_string(), "false".to_string()),
        ("entryNos".to_string(), entry_nos),
        ("type".to_string(), "6".to_string()),
    ]
}

/// Generate and download the batch PDF for the given entries.
///
/// # Errors
///
/// Returns [`PortalError::UnexpectedContentType`] when the portal answers
/// with anything but a PDF (typically an HTML error page), or any
/// transport-level [`PortalError`].
pub async fn download_batch(
    client: &PortalClient,
    entry_numbers: &[String],
    signed_date: NaiveDate,
) -> Result<Vec<u8>, PortalError> {
    info!(
        target: "drx.portal",
        entries = entry_numbers.len(),
        "requesting 7501 batch PDF (may take minutes)"
    );

    let response = client
        .post_form(
            PDF_BATCH_PATH,
            ENTRIES_PAGE_PATH,
            &build_form(entry_numbers, signed_date),
            client.timeouts().pdf(),
        )
        .await?;

    if !response.content_type.to_lowercase().contains("pdf") {
        return Err(PortalError::UnexpectedContentType {
            expected: "pdf",
            got: response.content_type,
        });
    }

    info!(
        target: "drx.portal",
        bytes = response.bytes.len(),
        "7501 batch PDF downloaded"
    );
    Ok(response.bytes)
}
