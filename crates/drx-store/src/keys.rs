// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic artifact key naming.
//!
//! `{prefix}/customizable-reports/{XXX-XXXXXXXX} {airport?} {customer?}[_V2].xlsx`
//! `{prefix}/7501-batch-pdfs/{XXX-XXXXXXXX} {airport?} {customer?}.pdf`
//!
//! `_V2` is appended only for the Shoaib template workbook. Airport and
//! customer keep their spaces but lose path separators.

use drx_core::Mawb;

/// Key builder bound to one configured prefix.
#[derive(Debug, Clone)]
pub struct ArtifactKeys {
    prefix: String,
}

impl ArtifactKeys {
    /// A builder for `prefix` (no trailing slash needed).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Key for a Custom Report workbook.
    #[must_use]
    pub fn excel(
        &self,
        mawb: &Mawb,
        airport_code: Option<&str>,
        customer: Option<&str>,
        shoaib: bool,
    ) -> String {
        let base = self.artifact_name(mawb, airport_code, customer);
        let suffix = if shoaib { "_V2.xlsx" } else { ".xlsx" };
        format!("{}/customizable-reports/{base}{suffix}", self.prefix)
    }

    /// Key for a compressed 7501 batch PDF.
    #[must_use]
    pub fn pdf(&self, mawb: &Mawb, airport_code: Option<&str>, customer: Option<&str>) -> String {
        let base = self.artifact_name(mawb, airport_code, customer);
        format!("{}/7501-batch-pdfs/{base}.pdf", self.prefix)
    }

    fn artifact_name(
        &self,
        mawb: &Mawb,
        airport_code: Option<&str>,
        customer: Option<&str>,
    ) -> String {
        let mut parts = vec![mawb.formatted()];
        for piece in [airport_code, customer] {
            if let Some(raw) = piece {
                let safe = raw.trim().replace(['/', '\\'], "-");
                if !safe.is_empty() {
                    parts.push(safe);
                }
            }
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mawb() -> Mawb {
        Mawb::parse("13135768106").unwrap()
    }

    #[test]
    fn excel_key_with_all_parts() {
        let keys = ArtifactKeys::new("duty-recon");
        assert_eq!(
            keys.excel(&mawb(), Some("ORD"), Some("MZZ"), false),
            "duty-recon/customizable-reports/131-35768106 ORD MZZ.xlsx"
        );
    }

    #[test]
    fn shoaib_workbook_gets_v2_suffix() {
        let keys = ArtifactKeys::new("duty-recon");
        assert_eq!(
            keys.excel(&mawb(), None, None, true),
            "duty-recon/customizable-reports/131-35768106_V2.xlsx"
        );
    }

    #[test]
    fn pdf_key_never_carries_v2() {
        let keys = ArtifactKeys::new("p");
        assert_eq!(
            keys.pdf(&mawb(), Some("JFK"), None),
            "p/7501-batch-pdfs/131-35768106 JFK.pdf"
        );
    }

    #[test]
    fn path_separators_are_sanitized_but_spaces_kept() {
        let keys = ArtifactKeys::new("p");
        let key = keys.pdf(&mawb(), Some("O/R\\D"), Some("Acme Freight"));
        assert_eq!(key, "p/7501-batch-pdfs/131-35768106 O-R-D Acme Freight.pdf");
    }

    #[test]
    fn blank_parts_are_dropped() {
        let keys = ArtifactKeys::new("p");
        assert_eq!(
            keys.excel(&mawb(), Some("  "), None, false),
            "p/customizable-reports/131-35768106.xlsx"
        );
    }

    #[test]
    fn keys_are_recomputable() {
        let keys = ArtifactKeys::new("p");
        let a = keys.pdf(&mawb(), Some("ORD"), Some("MZZ"));
        let b = keys.pdf(&mawb(), Some("ORD"), Some("MZZ"));
        assert_eq!(a, b);
    }
}
