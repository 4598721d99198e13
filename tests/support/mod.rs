// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared fixtures for the portal-mock end-to-end tests: canned portal
//! pages, a real xlsx workbook assembled in-memory, and a real PDF built
//! with lopdf.

#![allow(dead_code)]

use chrono::NaiveDate;
use drx_config::Timeouts;
use drx_core::{Broker, Format, Mawb, TemplatePayload};
use drx_portal::PortalClient;
use drx_retry::RetryPolicy;
use drx_session::state::{SessionCookie, SessionState};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream, dictionary};
use std::collections::BTreeMap;
use std::io::Write;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

/// "Today" for every scenario: recent enough that the report window ends at
/// today, deterministic for the signed date.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

pub fn mawb() -> Mawb {
    Mawb::parse("235-94731221").unwrap()
}

pub fn broker() -> Broker {
    Broker {
        id: Uuid::new_v4(),
        name: "Allied".into(),
        username: "allied-ops".into(),
        password: "pw".into(),
        auth_required: false,
        otp_uri: None,
        is_active: true,
    }
}

pub fn fte_format() -> Format {
    Format {
        id: Uuid::new_v4(),
        name: "FTE Match".into(),
        template_identifier: "fte-match".into(),
        template_payload: Some(TemplatePayload {
            header_fields: vec!["entryNo".into(), "entryDate".into()],
            manifest_fields: vec!["houseBill".into()],
            invoice_fields: Vec::new(),
            line_fields: Vec::new(),
            tariff_fields: Vec::new(),
            default_values: BTreeMap::from([("entryStatus".to_string(), String::new())]),
        }),
        is_active: true,
    }
}

pub fn portal_client(base_url: &str) -> PortalClient {
    let session = SessionState::from_cookies(vec![SessionCookie {
        name: "JSESSIONID".into(),
        value: "test-session".into(),
        domain: None,
        path: None,
        expires: None,
        http_only: true,
        secure: false,
    }]);
    PortalClient::new(
        base_url,
        &session,
        Timeouts::default(),
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        },
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Portal pages
// ---------------------------------------------------------------------------

/// AMS search results page with one data row linking to the master page.
pub fn ams_search_page(total_hawbs: &str) -> String {
    format!(
        r#"<html><body><div id="resultsDiv"><table><tbody>
          <tr class="header"><td>MAWB</td></tr>
          <tr class="light">
            <td><a href="/app/ams/mawbMenu.do?amsMawbId=991">235-94731221</a></td>
            <td>c2</td><td>c3</td><td>c4</td><td>c5</td>
            <td>03/01/25</td><td>{total_hawbs}</td>
          </tr>
        </tbody></table></div></body></html>"#
    )
}

/// AMS search results page carrying the portal's no-AWB message.
pub fn ams_not_found_page() -> String {
    r#"<html><body><div id="resultsDiv"><table><tbody>
      <tr><td>There is no awb matching your search criteria.</td></tr>
    </tbody></table></div></body></html>"#
        .to_string()
}

/// AMS master-detail page with the four anchored figures.
pub fn ams_master_page(duty: &str, t11: u32, accepted: u32, houses: &str) -> String {
    format!(
        r#"<html><body>
          <span id="esH">{houses}</span>
          <span id="esD">{duty}</span>
          <span id="esC">{t11}</span>
          <span id="esA">{accepted}</span>
        </body></html>"#
    )
}

/// Entries results page with one row per `(entry_no, date)`.
pub fn entries_page(rows: &[(u32, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(entry_no, date)| {
            format!(
                r#"<tr class="light">
                  <td><a href="/app/entry/viewEntry.do?filerCode=ABC&entryNo={entry_no}">{entry_no}</a></td>
                  <td>T11</td><td>I</td><td>P</td><td>R</td><td>{date}</td><td>{date}</td>
                </tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><form id="veForm"><div class="dataCell"><table><tbody>
          <tr><td>group</td></tr>
          <tr><td>Entry No</td><td>Type</td><td>Imp</td><td>Port</td><td>Ref</td>
              <td><div id="eDte_ob">Entry Date</div></td><td>Release</td></tr>
          {body}
        </tbody></table></div></form></body></html>"#
    )
}

/// Entries results page with no data rows at all.
pub fn entries_empty_page() -> String {
    entries_page(&[])
}

// ---------------------------------------------------------------------------
// Workbook fixture
// ---------------------------------------------------------------------------

/// One FTE-dialect data row of the workbook fixture.
pub struct WorkbookRow {
    pub informal: f64,
    pub complete: f64,
    pub house: bool,
    pub entry_date: &'static str,
    pub release_date: &'static str,
}

/// Assemble a real (minimal) xlsx workbook with an FTE-shaped sheet.
pub fn fte_workbook(rows: &[WorkbookRow]) -> Vec<u8> {
    let mut sheet_rows = String::new();
    // Header row the parser skips.
    sheet_rows.push_str(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Header</t></is></c></row>"#);
    for (i, row) in rows.iter().enumerate() {
        let r = i + 2;
        sheet_rows.push_str(&format!(
            concat!(
                r#"<row r="{r}">"#,
                r#"<c r="C{r}" t="inlineStr"><is><t>{entry}</t></is></c>"#,
                r#"<c r="E{r}"><v>{informal}</v></c>"#,
                r#"<c r="G{r}"><v>{complete}</v></c>"#,
                r#"<c r="I{r}" t="inlineStr"><is><t>{release}</t></is></c>"#,
                r#"{house}"#,
                r#"</row>"#
            ),
            r = r,
            entry = row.entry_date,
            informal = row.informal,
            complete = row.complete,
            release = row.release_date,
            house = if row.house {
                format!(r#"<c r="N{r}" t="inlineStr"><is><t>H</t></is></c>"#)
            } else {
                String::new()
            },
        ));
    }

    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_rows}</sheetData></worksheet>"#
    );

    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

    let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

    let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, body) in [
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", rels),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Excel content type the portal sends on report downloads.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ---------------------------------------------------------------------------
// PDF fixture
// ---------------------------------------------------------------------------

/// Build a real text PDF, one page per input string.
pub fn pdf_with_pages(pages: &[String]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A two-entry batch PDF whose duty sums to `duty_per_entry * 2`.
pub fn batch_pdf(duty_per_entry: f64) -> Vec<u8> {
    pdf_with_pages(&[
        format!("Entry No. ABC-1234567-8  Total duty & fees ${duty_per_entry:.2}"),
        format!("Entry No. ABC-7654321-0  Total duty & fees ${duty_per_entry:.2}"),
    ])
}
