// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parser round-trips and identity properties over the batch input format.

use drx_core::{BatchItem, Mawb};
use drx_input::parse_batch_input;
use proptest::prelude::*;

/// Serialize items the way a spreadsheet would: tab-delimited 5-column rows
/// (`Port, Customer, Broker, HAWBs, Master`). The broker column is filler —
/// the parser ignores it.
fn serialize(items: &[BatchItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{}\t{}\tBKR\t{}\t{}",
                item.airport_code.as_deref().unwrap_or(""),
                item.customer.as_deref().unwrap_or(""),
                item.checkbook_hawbs.as_deref().unwrap_or(""),
                item.mawb.formatted(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn serialize_then_parse_is_identity() {
    let items = vec![
        BatchItem {
            mawb: Mawb::parse("235-94731221").unwrap(),
            airport_code: Some("ORD".into()),
            customer: Some("MZZ".into()),
            checkbook_hawbs: Some("4250".into()),
        },
        BatchItem {
            mawb: Mawb::parse("999-38649026").unwrap(),
            airport_code: Some("JFK".into()),
            customer: Some("YDH".into()),
            checkbook_hawbs: Some("1325".into()),
        },
    ];
    assert_eq!(parse_batch_input(&serialize(&items)), items);
}

#[test]
fn fifteen_line_vertical_paste_yields_three_items() {
    let lines = [
        "JFK", "YDH", "M3", "1325", "999-38649026", //
        "JFK", "BFE", "M3", "200", "999-38649027", //
        "ORD", "CCA", "M3", "17", "235-94731221",
    ];
    let items = parse_batch_input(&lines.join("\n"));
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].airport_code.as_deref(), Some("ORD"));
    assert_eq!(items[2].checkbook_hawbs.as_deref(), Some("17"));
}

proptest! {
    /// Every line holding exactly one 11-digit token yields exactly one
    /// item whose MAWB is that token's digit-extract.
    #[test]
    fn eleven_digit_lines_parse_to_their_digits(digits in "[0-9]{11}", dashed in any::<bool>()) {
        let line = if dashed {
            format!("{}-{}", &digits[..3], &digits[3..])
        } else {
            digits.clone()
        };
        let items = parse_batch_input(&line);
        prop_assert_eq!(items.len(), 1);
        prop_assert_eq!(items[0].mawb.as_digits(), digits.as_str());
    }

    /// Formatting a normalized MAWB is idempotent under re-normalization.
    #[test]
    fn format_normalize_idempotence(digits in "[0-9]{11}") {
        let once = Mawb::parse(&digits).unwrap().formatted();
        let twice = Mawb::parse(&once).unwrap().formatted();
        prop_assert_eq!(once, twice);
    }

    /// Inputs without an 11-digit token never produce items.
    #[test]
    fn short_tokens_never_parse(digits in "[0-9]{1,10}") {
        prop_assert!(parse_batch_input(&digits).is_empty());
    }
}
