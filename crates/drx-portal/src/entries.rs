// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entries index flow and entry-detail fan-out.
//!
//! The search POST produces the entry rows everything downstream feeds on:
//! the oldest entry date bounds the Custom Report window and the entry
//! numbers drive the 7501 batch PDF. The detail fan-out (house counts and
//! per-entry duty from the print-7501 pages) is a deep-audit operation kept
//! off the main pipeline; it is the one place the adapter parallelizes, in
//! fan-out batches of six.

use crate::PortalError;
use crate::client::PortalClient;
use crate::html;
use chrono::NaiveDate;
use drx_core::Mawb;
use futures::future::join_all;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Search endpoint, relative to the portal origin.
pub const ENTRIES_SEARCH_PATH: &str = "/app/entry/processViewEntries.do";

/// Referer presented on entries requests.
const ENTRIES_PAGE_PATH: &str = "/app/entry/index.jsp";

/// Print-7501 endpoint for single entries.
const PRINT7501_PATH: &str = "/app/entry/print7501.do";

/// Width of one detail-fetch batch.
const DETAIL_BATCH_SIZE: usize = 6;

/// Pause between detail batches.
const BATCH_PAUSE: Duration = Duration::from_millis(500);

fn entry_no_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"entryNo=(\d+)").expect("static regex"))
}

/// One entry row from the index, links absolutized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    /// Entry date, when the row carried a parseable one.
    pub date: Option<NaiveDate>,
    /// Raw date text.
    pub date_text: Option<String>,
    /// Absolute URL of the entry-detail page.
    pub link: Option<String>,
    /// `filerCode=…&entryNo=…` captured from the link.
    pub query_string: Option<String>,
}

impl EntryRow {
    /// The numeric entry number, from the query string first, the link
    /// second.
    #[must_use]
    pub fn entry_number(&self) -> Option<String> {
        let capture = |text: &str| {
            entry_no_re()
                .captures(text)
                .map(|c| c[1].to_string())
        };
        self.query_string
            .as_deref()
            .and_then(capture)
            .or_else(|| self.link.as_deref().and_then(capture))
    }
}

/// Outcome of the entries search for one MAWB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesIndex {
    /// The portal reported no entries for this MAWB. Custom Report and PDF
    /// are skipped when set.
    pub not_found: bool,
    /// All entry rows, page order.
    pub rows: Vec<EntryRow>,
    /// Minimum entry date across rows.
    pub oldest_entry_date: Option<NaiveDate>,
}

impl EntriesIndex {
    /// Distinct entry numbers, page order preserved.
    #[must_use]
    pub fn entry_numbers(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        self.rows
            .iter()
            .filter_map(EntryRow::entry_number)
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

/// Form body for the entries search POST.
fn search_form(mawb: &Mawb) -> Vec<(String, String)> {
    let pairs: &[(&str, &str)] = &[
        ("entryNoSearch", ""),
        ("brokerRefNo", ""),
        ("importerRecord", "0"),
        ("importerRecordName", ""),
        ("importerSearchByProfile", "true"),
        ("ultimateConsignee", "0"),
        ("ultimateConsigneeName", ""),
        ("ultimateConsigneeSearchByProfile", "true"),
        ("freightForwarder", "0"),
        ("freightForwarderName", ""),
        ("freightForwarderSearchByProfile", "true"),
        ("begin", ""),
        ("end", ""),
        ("entryStatus", ""),
        ("cargoReleaseStatus", ""),
        ("manifestStatus", ""),
        ("pgaAgency", ""),
        ("ogaStatus", ""),
        ("statusColor", ""),
        ("entryType", ""),
        ("portEntry", ""),
        ("modeTransport", ""),
    ];
    let mut form: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    form.push(("masterBill".to_string(), mawb.as_digits().to_string()));
    form.push(("searchTimePeriod".to_string(), "Y1".to_string()));
    form.push(("user".to_string(), String::new()));
    form.push(("location".to_string(), "0".to_string()));
    form.push(("noPerPage".to_string(), "1000".to_string()));
    form.push(("entryNo".to_string(), "0".to_string()));
    form.push(("orderBy".to_string(), "vep1".to_string()));
    form
}

/// Run the entries search.
///
/// # Errors
///
/// Returns [`PortalError`] for transport or parse failures. An empty result
/// set is not an error; it is reported through [`EntriesIndex::not_found`].
pub async fn search(client: &PortalClient, mawb: &Mawb) -> Result<EntriesIndex, PortalError> {
    let response = client
        .post_form(
            ENTRIES_SEARCH_PATH,
            ENTRIES_PAGE_PATH,
            &search_form(mawb),
            client.timeouts().entries_search(),
        )
        .await?;

    let parsed = html::parse_entries(&response.text())?;
    if parsed.not_found {
        info!(target: "drx.portal", mawb = %mawb, "entries not found");
        return Ok(EntriesIndex {
            not_found: true,
            rows: Vec::new(),
            oldest_entry_date: None,
        });
    }

    let rows: Vec<EntryRow> = parsed
        .rows
        .into_iter()
        .map(|row| EntryRow {
            date: row.date,
            date_text: row.date_text,
            link: row.href.map(|h| client.absolutize(&h)),
            query_string: row.query_string,
        })
        .collect();

    info!(
        target: "drx.portal",
        mawb = %mawb,
        rows = rows.len(),
        oldest = ?parsed.oldest,
        "entries search complete"
    );

    Ok(EntriesIndex {
        not_found: false,
        rows,
        oldest_entry_date: parsed.oldest,
    })
}

/// Totals from the entry-detail fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntryDetailTotals {
    /// Sum of `#invBdy` row counts across entry-detail pages.
    pub houses: usize,
    /// Sum of duty + fees across print-7501 pages.
    pub duty: f64,
    /// Entry-detail pages that failed all retries.
    pub detail_failures: usize,
    /// Print-7501 pages that failed all retries.
    pub duty_failures: usize,
}

/// Deep-audit fan-out over every entry's detail and print-7501 page.
///
/// Fetches run in batches of [`DETAIL_BATCH_SIZE`]; each batch is awaited in
/// full before the next is issued, with a short pause in between. Individual
/// failures are counted, never raised — the totals remain usable as an
/// audit signal either way. Summation is order-independent, so no ordering
/// is guaranteed within a batch.
pub async fn scrape_details(client: &PortalClient, index: &EntriesIndex) -> EntryDetailTotals {
    let mut totals = EntryDetailTotals::default();

    let links: Vec<&str> = index.rows.iter().filter_map(|r| r.link.as_deref()).collect();
    debug!(target: "drx.portal", links = links.len(), "scraping entry-detail pages");
    for batch in links.chunks(DETAIL_BATCH_SIZE) {
        let fetches = batch.iter().map(|&link| async move {
            match client
                .get(link, ENTRIES_SEARCH_PATH, client.timeouts().entry_detail())
                .await
            {
                Ok(response) => Some(html::parse_entry_detail_houses(&response.text())),
                Err(e) => {
                    warn!(target: "drx.portal", link, error = %e, "entry-detail fetch failed");
                    None
                }
            }
        });
        for houses in join_all(fetches).await {
            match houses {
                Some(count) => totals.houses += count,
                None => totals.detail_failures += 1,
            }
        }
        tokio::time::sleep(BATCH_PAUSE).await;
    }

    let queries: Vec<&str> = index
        .rows
        .iter()
        .filter_map(|r| r.query_string.as_deref())
        .collect();
    debug!(target: "drx.portal", queries = queries.len(), "scraping print-7501 pages");
    for batch in queries.chunks(DETAIL_BATCH_SIZE) {
        let fetches = batch.iter().map(|&query| async move {
            let url = format!("{}{PRINT7501_PATH}?{query}", client.base_url());
            match client
                .get(&url, ENTRIES_PAGE_PATH, client.timeouts().print_detail())
                .await
            {
                Ok(response) => Some(html::parse_print7501_duty(&response.text())),
                Err(e) => {
                    warn!(target: "drx.portal", query, error = %e, "print-7501 fetch failed");
                    None
                }
            }
        });
        for duty in join_all(fetches).await {
            match duty {
                Some(amount) => totals.duty += amount,
                None => totals.duty_failures += 1,
            }
        }
        tokio::time::sleep(BATCH_PAUSE).await;
    }

    info!(
        target: "drx.portal",
        houses = totals.houses,
        duty = totals.duty,
        detail_failures = totals.detail_failures,
        duty_failures = totals.duty_failures,
        "entry-detail fan-out complete"
    );
    totals
}
