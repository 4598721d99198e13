// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-input
//!
//! Clipboard input parser for batch runs.
//!
//! Users paste MAWB lists from spreadsheets, emails, and chat in whatever
//! shape those tools produce. This module normalizes all of them into an
//! ordered sequence of [`BatchItem`]s. Per non-empty line, the recognized
//! shapes are (tried in order):
//!
//! 1. tab-delimited, 5 columns: `Port  Customer  Broker  HAWBs  Master`
//!    (the broker column is ignored — brokers are selected from the catalog)
//! 2. tab-delimited, 3 columns: `Port  Customer  Master`
//! 3. comma-delimited, same 5- or 3-column shapes
//! 4. whitespace-delimited: the column whose digit-extract is 11 long is the
//!    MAWB; columns to its left fill airport/customer
//! 5. a single token treated as the MAWB
//!
//! Spreadsheet "vertical paste" (one cell per line, no tabs) is recognized
//! up front and regrouped into tab rows before line parsing.
//!
//! Lines that cannot yield an 11-digit MAWB are dropped without error; the
//! caller observes the count difference. De-duplication is the batch
//! orchestrator's job, not the parser's.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use drx_core::{BatchItem, Mawb};
use tracing::debug;

/// Parse a free-form input blob into ordered batch items.
#[must_use]
pub fn parse_batch_input(text: &str) -> Vec<BatchItem> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let reassembled;
    let rows: Vec<String> = if !trimmed.contains('\t') && lines.len() > 1 {
        reassembled = regroup_vertical_paste(&lines);
        if reassembled.is_empty() {
            lines.iter().map(ToString::to_string).collect()
        } else {
            debug!(
                target: "drx.input",
                lines = lines.len(),
                rows = reassembled.len(),
                "regrouped vertical paste"
            );
            reassembled
        }
    } else {
        lines.iter().map(ToString::to_string).collect()
    };

    let mut items = Vec::new();
    for row in &rows {
        if let Some(item) = parse_line(row) {
            items.push(item);
        } else {
            debug!(target: "drx.input", line = %row, "dropped unparseable line");
        }
    }
    items
}

/// Digit-extract of a token.
fn digits_of(token: &str) -> String {
    token.chars().filter(char::is_ascii_digit).collect()
}

fn is_mawb_shaped(token: &str) -> bool {
    digits_of(token).len() == 11
}

/// Rebuild tab rows from a paste where each cell landed on its own line.
///
/// Walks the line list: a group is a 5-tuple when the line four ahead is
/// MAWB-shaped, a 3-tuple when the line two ahead is, and otherwise a scan of
/// up to ten lines for the next MAWB closes whatever preceded it.
fn regroup_vertical_paste(lines: &[&str]) -> Vec<String> {
    let mut rows = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if i + 4 < lines.len() && is_mawb_shaped(lines[i + 4]) {
            rows.push(lines[i..=i + 4].join("\t"));
            i += 5;
            continue;
        }
        if i + 2 < lines.len() && is_mawb_shaped(lines[i + 2]) {
            rows.push(lines[i..=i + 2].join("\t"));
            i += 3;
            continue;
        }
        let mut advanced = false;
        let horizon = usize::min(i + 10, lines.len());
        for j in i..horizon {
            if is_mawb_shaped(lines[j]) && j - i >= 2 {
                rows.push(lines[i..=j].join("\t"));
                i = j + 1;
                advanced = true;
                break;
            }
        }
        if !advanced {
            i += 1;
        }
    }
    rows
}

/// Extracted column values before MAWB normalization.
struct RawColumns<'a> {
    mawb: &'a str,
    airport_code: Option<&'a str>,
    customer: Option<&'a str>,
    checkbook_hawbs: Option<&'a str>,
}

fn parse_line(line: &str) -> Option<BatchItem> {
    let raw = if line.contains('\t') {
        split_delimited(line, '\t')?
    } else if line.contains(',') {
        split_delimited(line, ',')?
    } else if line.split_whitespace().count() >= 3 || line.contains("  ") {
        split_whitespace_row(line)
    } else {
        RawColumns {
            mawb: line,
            airport_code: None,
            customer: None,
            checkbook_hawbs: None,
        }
    };

    let mawb = Mawb::parse(raw.mawb).ok()?;
    Some(BatchItem {
        mawb,
        airport_code: non_empty(raw.airport_code),
        customer: non_empty(raw.customer),
        checkbook_hawbs: non_empty(raw.checkbook_hawbs),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn split_delimited(line: &str, delimiter: char) -> Option<RawColumns<'_>> {
    let parts: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    match parts.len() {
        n if n >= 5 => {
            // Port, Customer, Broker(ignored), HAWBs, Master. A fifth column
            // that is not MAWB-shaped means the row is something else; drop it.
            if !is_mawb_shaped(parts[4]) {
                return None;
            }
            Some(RawColumns {
                mawb: parts[4],
                airport_code: Some(parts[0]),
                customer: Some(parts[1]),
                checkbook_hawbs: Some(parts[3]),
            })
        }
        3 | 4 => Some(RawColumns {
            mawb: parts[2],
            airport_code: Some(parts[0]),
            customer: Some(parts[1]),
            checkbook_hawbs: None,
        }),
        2 => {
            let first_is_mawb = is_mawb_shaped(parts[0]);
            let second_is_mawb = is_mawb_shaped(parts[1]);
            if first_is_mawb {
                Some(RawColumns {
                    mawb: parts[0],
                    airport_code: (!second_is_mawb).then_some(parts[1]),
                    customer: None,
                    checkbook_hawbs: None,
                })
            } else if second_is_mawb {
                Some(RawColumns {
                    mawb: parts[1],
                    airport_code: Some(parts[0]),
                    customer: None,
                    checkbook_hawbs: None,
                })
            } else {
                None
            }
        }
        _ => Some(RawColumns {
            mawb: parts[0],
            airport_code: None,
            customer: None,
            checkbook_hawbs: None,
        }),
    }
}

fn split_whitespace_row(line: &str) -> RawColumns<'_> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mawb_idx = parts.iter().position(|p| is_mawb_shaped(p));

    match mawb_idx {
        Some(4) if parts.len() >= 5 => RawColumns {
            mawb: parts[4],
            airport_code: Some(parts[0]),
            customer: Some(parts[1]),
            checkbook_hawbs: Some(parts[3]),
        },
        Some(idx) => {
            let before = &parts[..idx];
            RawColumns {
                mawb: parts[idx],
                airport_code: before.first().copied(),
                customer: before.get(1).copied(),
                checkbook_hawbs: None,
            }
        }
        None => RawColumns {
            mawb: parts[0],
            airport_code: parts.get(1).copied(),
            customer: parts.get(2).copied(),
            checkbook_hawbs: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> BatchItem {
        let items = parse_batch_input(text);
        assert_eq!(items.len(), 1, "expected one item from {text:?}");
        items.into_iter().next().unwrap()
    }

    #[test]
    fn empty_blob_yields_nothing() {
        assert!(parse_batch_input("").is_empty());
        assert!(parse_batch_input("   \n \n").is_empty());
    }

    #[test]
    fn bare_mawb_with_dash() {
        let item = one("235-94731221");
        assert_eq!(item.mawb.as_digits(), "23594731221");
        assert!(item.airport_code.is_none());
        assert!(item.checkbook_hawbs.is_none());
    }

    #[test]
    fn tab_five_columns() {
        let item = one("ORD\tMZZ\tBKR\t4250\t235-94731221");
        assert_eq!(item.mawb.as_digits(), "23594731221");
        assert_eq!(item.airport_code.as_deref(), Some("ORD"));
        assert_eq!(item.customer.as_deref(), Some("MZZ"));
        assert_eq!(item.checkbook_hawbs.as_deref(), Some("4250"));
    }

    #[test]
    fn tab_three_columns() {
        let item = one("ORD\tMZZ\t235-94731221");
        assert_eq!(item.airport_code.as_deref(), Some("ORD"));
        assert_eq!(item.customer.as_deref(), Some("MZZ"));
        assert!(item.checkbook_hawbs.is_none());
    }

    #[test]
    fn comma_five_columns() {
        let item = one("JFK,YDH,M3,1325,999-38649026");
        assert_eq!(item.mawb.as_digits(), "99938649026");
        assert_eq!(item.checkbook_hawbs.as_deref(), Some("1325"));
    }

    #[test]
    fn five_columns_without_mawb_in_last_is_dropped() {
        assert!(parse_batch_input("A\tB\tC\tD\tE").is_empty());
    }

    #[test]
    fn two_columns_mawb_first() {
        let item = one("235-94731221\tORD");
        assert_eq!(item.mawb.as_digits(), "23594731221");
        assert_eq!(item.airport_code.as_deref(), Some("ORD"));
    }

    #[test]
    fn whitespace_row_finds_mawb_column() {
        let item = one("ORD MZZ 235-94731221");
        assert_eq!(item.mawb.as_digits(), "23594731221");
        assert_eq!(item.airport_code.as_deref(), Some("ORD"));
        assert_eq!(item.customer.as_deref(), Some("MZZ"));
    }

    #[test]
    fn whitespace_row_mawb_at_index_four_captures_checkbook() {
        let item = one("ORD MZZ BKR 4250 235-94731221");
        assert_eq!(item.checkbook_hawbs.as_deref(), Some("4250"));
    }

    #[test]
    fn empty_fields_become_absent() {
        let item = one("\tMZZ\t235-94731221");
        assert!(item.airport_code.is_none());
        assert_eq!(item.customer.as_deref(), Some("MZZ"));
    }

    #[test]
    fn invalid_lines_are_dropped_silently() {
        let items = parse_batch_input("ORD\tMZZ\t235-947\n235-94731221\n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mawb.as_digits(), "23594731221");
    }

    #[test]
    fn no_eleven_digit_token_yields_nothing() {
        assert!(parse_batch_input("hello world\nfoo,bar\n").is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let items = parse_batch_input("111-11111111\n222-22222222\n333-33333333");
        let mawbs: Vec<&str> = items.iter().map(|i| i.mawb.as_digits()).collect();
        assert_eq!(mawbs, ["11111111111", "22222222222", "33333333333"]);
    }

    // -- vertical paste --

    #[test]
    fn vertical_paste_of_five_tuples() {
        let blob = "JFK\nYDH\nM3\n1325\n999-38649026\nJFK\nBFE\nM3\n200\n999-38649027\nJFK\nCCA\nM3\n17\n999-38649028";
        let items = parse_batch_input(blob);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].airport_code.as_deref(), Some("JFK"));
        assert_eq!(items[0].customer.as_deref(), Some("YDH"));
        assert_eq!(items[0].checkbook_hawbs.as_deref(), Some("1325"));
        assert_eq!(items[2].mawb.as_digits(), "99938649028");
    }

    #[test]
    fn vertical_paste_of_three_tuples() {
        let blob = "ORD\nMZZ\n235-94731221\nJFK\nYDH\n999-38649026";
        let items = parse_batch_input(blob);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].airport_code.as_deref(), Some("ORD"));
        assert_eq!(items[1].customer.as_deref(), Some("YDH"));
    }

    #[test]
    fn vertical_paste_irregular_group_closes_on_next_mawb() {
        // Four cells then the MAWB form a 5-tuple; the trailing cell without
        // a following MAWB is dropped.
        let blob = "ORD\nMZZ\nextra\nmore\n235-94731221\nleftover";
        let items = parse_batch_input(blob);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mawb.as_digits(), "23594731221");
    }

    #[test]
    fn plain_mawb_list_is_not_regrouped() {
        let blob = "235-94731221\n999-38649026";
        let items = parse_batch_input(blob);
        assert_eq!(items.len(), 2);
    }
}
