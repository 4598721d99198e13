// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure HTML parsers for every portal page.
//!
//! Each function takes the page source and returns owned data, so no parsed
//! document is ever held across an `await`. Selectors anchor on element ids
//! (`#resultsDiv`, `#veForm`, `#esH`…) rather than positional paths; the one
//! positional fallback (the Entry Date column) mirrors how the portal
//! actually varies between broker accounts.

use crate::PortalError;
use chrono::NaiveDate;
use drx_core::dates::parse_mmddyy;
use drx_core::money::parse_currency;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn sel(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn entry_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"filerCode=[^&]+&entryNo=\d+").expect("static regex"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// AMS search results
// ---------------------------------------------------------------------------

/// Outcome of parsing the AMS search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmsSearch {
    /// The portal reported no AWB for the search.
    NotFound,
    /// First data row of the results table.
    Found(AmsSearchRow),
}

/// Fields pulled from the first AMS result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmsSearchRow {
    /// `href` of the master-detail anchor, as found in the page.
    pub master_href: Option<String>,
    /// Column 6: arrival date text.
    pub arrival_date: String,
    /// Column 7: total HAWBs text.
    pub total_hawbs: String,
}

/// Parse the AMS search response.
///
/// # Errors
///
/// Returns [`PortalError::Parse`] when the results container is missing
/// entirely (a session bounce or layout change, not an empty result).
pub fn parse_ams_search(html: &str) -> Result<AmsSearch, PortalError> {
    let document = Html::parse_document(html);

    let results_div = document
        .select(&sel("#resultsDiv"))
        .next()
        .ok_or(PortalError::Parse {
            what: "#resultsDiv missing from AMS search response".to_string(),
        })?;
    let table = results_div
        .select(&sel("table"))
        .next()
        .ok_or(PortalError::Parse {
            what: "AMS results table missing".to_string(),
        })?;

    let page_text = element_text(document.root_element()).to_lowercase();
    if page_text.contains("there is no awb") || page_text.contains("no awb") {
        debug!(target: "drx.portal", "AMS search reported no awb");
        return Ok(AmsSearch::NotFound);
    }

    let Some(first_row) = table.select(&sel("tbody tr.light, tbody tr.dark")).next() else {
        debug!(target: "drx.portal", "AMS results table has no data rows");
        return Ok(AmsSearch::NotFound);
    };

    let cells: Vec<ElementRef<'_>> = first_row.select(&sel("td")).collect();
    if cells.len() < 7 {
        return Err(PortalError::Parse {
            what: format!("AMS result row has {} cells, expected at least 7", cells.len()),
        });
    }

    let master_href = cells[0]
        .select(&sel("a"))
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(ToString::to_string);

    let arrival_date = non_empty_or_na(element_text(cells[5]));
    let total_hawbs = non_empty_or_na(element_text(cells[6]));

    Ok(AmsSearch::Found(AmsSearchRow {
        master_href,
        arrival_date,
        total_hawbs,
    }))
}

fn non_empty_or_na(text: String) -> String {
    if text.is_empty() { "N/A".to_string() } else { text }
}

// ---------------------------------------------------------------------------
// AMS master detail
// ---------------------------------------------------------------------------

/// Figures from the AMS master-detail page anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmsMaster {
    /// `#esD`: AMS duty, raw text.
    pub duty: String,
    /// `#esC`: total T-11 entries, normalized integer text.
    pub t11_entries: String,
    /// `#esA`: entries accepted, normalized integer text.
    pub entries_accepted: String,
    /// `#esH`: 7501 total houses, normalized integer text.
    pub houses_7501: String,
}

/// Parse the master-detail page. Missing anchors degrade to defaults; this
/// page never fails a pipeline on its own.
#[must_use]
pub fn parse_ams_master(html: &str) -> AmsMaster {
    let document = Html::parse_document(html);

    let text_of = |css: &'static str| {
        document
            .select(&sel(css))
            .next()
            .map(|el| element_text(el))
    };

    let houses_7501 = match text_of("#esH") {
        Some(raw) => {
            let cleaned = raw.replace(',', "");
            match cleaned.trim().parse::<i64>() {
                Ok(n) => n.to_string(),
                Err(_) => {
                    warn!(target: "drx.portal", raw = %raw, "unparseable #esH house count");
                    "0".to_string()
                }
            }
        }
        None => {
            warn!(target: "drx.portal", "#esH missing from AMS master page");
            "0".to_string()
        }
    };

    let duty = text_of("#esD")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    let int_or_zero = |raw: Option<String>| {
        raw.and_then(|t| t.trim().parse::<i64>().ok())
            .map_or_else(|| "0".to_string(), |n| n.to_string())
    };
    let t11_entries = int_or_zero(text_of("#esC"));
    let entries_accepted = int_or_zero(text_of("#esA"));

    AmsMaster {
        duty,
        t11_entries,
        entries_accepted,
        houses_7501,
    }
}

// ---------------------------------------------------------------------------
// Entries index
// ---------------------------------------------------------------------------

/// One data row of the entries results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntryRow {
    /// Entry date, when the row's date cell parsed.
    pub date: Option<NaiveDate>,
    /// The raw date text, when present.
    pub date_text: Option<String>,
    /// `href` of the row's first-cell anchor, as found in the page.
    pub href: Option<String>,
    /// `filerCode=…&entryNo=…` captured from the href.
    pub query_string: Option<String>,
}

/// Parsed entries results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesParse {
    /// `true` when the portal reported no entries for the MAWB.
    pub not_found: bool,
    /// All data rows, in page order.
    pub rows: Vec<ParsedEntryRow>,
    /// Minimum of the parsed entry dates.
    pub oldest: Option<NaiveDate>,
}

/// Parse the entries search response.
///
/// The Entry Date column position differs between broker accounts, so the
/// header row is searched for the label first ("entry date", case- and
/// space-insensitive); columns 6, 7, 5 are the fallback.
///
/// # Errors
///
/// Returns [`PortalError::Parse`] when the results table is missing.
pub fn parse_entries(html: &str) -> Result<EntriesParse, PortalError> {
    let document = Html::parse_document(html);

    let table = document
        .select(&sel("#veForm div.dataCell > table"))
        .next()
        .or_else(|| document.select(&sel("div.dataCell > table")).next())
        .ok_or(PortalError::Parse {
            what: "entries results table missing".to_string(),
        })?;

    let date_column = find_entry_date_column(table);

    let rows: Vec<ElementRef<'_>> = table.select(&sel("tbody tr.light, tbody tr.dark")).collect();
    if rows.is_empty() {
        debug!(target: "drx.portal", "entries table has no data rows");
        return Ok(EntriesParse {
            not_found: true,
            rows: Vec::new(),
            oldest: None,
        });
    }

    let first_text = element_text(rows[0]).to_lowercase();
    if first_text.contains("no results") || first_text.contains("no entries") {
        debug!(target: "drx.portal", "entries table reports no results");
        return Ok(EntriesParse {
            not_found: true,
            rows: Vec::new(),
            oldest: None,
        });
    }

    let mut parsed_rows = Vec::with_capacity(rows.len());
    let mut dates = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<ElementRef<'_>> = row.select(&sel("td")).collect();

        let (href, query_string) = link_of(cells.first().copied());

        if cells.len() < 7 {
            warn!(
                target: "drx.portal",
                row = idx + 1,
                cells = cells.len(),
                "short entries row, keeping link only"
            );
            if href.is_some() {
                parsed_rows.push(ParsedEntryRow {
                    date: None,
                    date_text: None,
                    href,
                    query_string,
                });
            }
            continue;
        }

        let date_text = pick_date_text(&cells, date_column);
        let date = date_text.as_deref().and_then(parse_mmddyy);
        if let Some(d) = date {
            dates.push(d);
        }

        parsed_rows.push(ParsedEntryRow {
            date,
            date_text,
            href,
            query_string,
        });
    }

    let oldest = dates.iter().min().copied();
    debug!(
        target: "drx.portal",
        rows = parsed_rows.len(),
        dated = dates.len(),
        "parsed entries table"
    );

    Ok(EntriesParse {
        not_found: false,
        rows: parsed_rows,
        oldest,
    })
}

/// Find the 0-indexed Entry Date column from the header rows.
fn find_entry_date_column(table: ElementRef<'_>) -> Option<usize> {
    let tbody_rows: Vec<ElementRef<'_>> = table.select(&sel("tbody > tr")).collect();

    // The label usually lives in the second tbody row, sometimes the first.
    for &candidate in &[1usize, 0] {
        if let Some(row) = tbody_rows.get(candidate) {
            if let Some(idx) = search_header_row(*row) {
                return Some(idx);
            }
        }
    }
    for row in table.select(&sel("tr.header")) {
        if let Some(idx) = search_header_row(row) {
            return Some(idx);
        }
    }
    warn!(target: "drx.portal", "Entry Date header not found, will fall back to columns 6/7/5");
    None
}

fn search_header_row(row: ElementRef<'_>) -> Option<usize> {
    for (idx, cell) in row.select(&sel("td")).enumerate() {
        // Headers sometimes wrap the label in a sort-handle div.
        let mut text = element_text(cell);
        for div in cell.select(&sel("div")) {
            let div_text = element_text(div);
            if !div_text.is_empty() {
                text = div_text;
                break;
            }
        }
        let lower = text.to_lowercase();
        if lower.contains("entry date") || lower.replace(' ', "").contains("entrydate") {
            debug!(target: "drx.portal", column = idx + 1, "found Entry Date header");
            return Some(idx);
        }
    }
    None
}

/// Date text from the header-discovered column, else the 6/7/5 fallback.
fn pick_date_text(cells: &[ElementRef<'_>], date_column: Option<usize>) -> Option<String> {
    let looks_like_date =
        |text: &str| !text.is_empty() && text.contains('/') && text.len() <= 10 && parse_mmddyy(text).is_some();

    if let Some(idx) = date_column {
        if let Some(cell) = cells.get(idx) {
            let text = element_text(*cell);
            if looks_like_date(&text) {
                return Some(text);
            }
        }
    }
    for idx in [5usize, 6, 4] {
        if let Some(cell) = cells.get(idx) {
            let text = element_text(*cell);
            if looks_like_date(&text) {
                return Some(text);
            }
        }
    }
    None
}

fn link_of(cell: Option<ElementRef<'_>>) -> (Option<String>, Option<String>) {
    let href = cell
        .and_then(|c| c.select(&sel("a")).next())
        .and_then(|a| a.value().attr("href"))
        .map(ToString::to_string);
    let query_string = href
        .as_deref()
        .and_then(|h| entry_query_re().find(h))
        .map(|m| m.as_str().to_string());
    (href, query_string)
}

// ---------------------------------------------------------------------------
// Entry detail & print-7501 pages
// ---------------------------------------------------------------------------

/// House count on an entry-detail page: rows of `#invBdy`.
#[must_use]
pub fn parse_entry_detail_houses(html: &str) -> usize {
    let document = Html::parse_document(html);
    document
        .select(&sel("#invBdy"))
        .next()
        .map_or(0, |tbody| tbody.select(&sel("tr")).count())
}

/// Duty + fees from a print-7501 page's totals table.
#[must_use]
pub fn parse_print7501_duty(html: &str) -> f64 {
    let document = Html::parse_document(html);

    let table = document
        .select(&sel(
            "#pForm > div:nth-child(1) > div:nth-child(2) > div > div.content > table",
        ))
        .next()
        .or_else(|| {
            document
                .select(&sel("div.formContainerWithLabel > div.content > table"))
                .next()
        });
    let Some(table) = table else {
        return 0.0;
    };

    let rows: Vec<ElementRef<'_>> = table.select(&sel("tr")).collect();
    if rows.len() < 2 {
        return 0.0;
    }

    // Row 2 carries duty, row 4 fees; both label-checked before use.
    let amount_of = |row: Option<&ElementRef<'_>>, label: &str| -> f64 {
        let Some(row) = row else { return 0.0 };
        let cells: Vec<ElementRef<'_>> = row.select(&sel("td")).collect();
        if cells.len() < 2 {
            return 0.0;
        }
        if !element_text(cells[0]).to_lowercase().contains(label) {
            return 0.0;
        }
        parse_currency(&element_text(cells[1]))
    };

    amount_of(rows.get(1), "duty") + amount_of(rows.get(3), "fee")
}
