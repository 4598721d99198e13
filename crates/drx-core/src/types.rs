// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch, broker, format, and result records.

use crate::{Mawb, Summary};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Batch input
// ---------------------------------------------------------------------------

/// One unit of batch input, as produced by the input parser.
///
/// Broker and format identifiers are attached at the batch level, not per
/// item. A `BatchItem` is never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BatchItem {
    /// Normalized 11-digit MAWB.
    pub mawb: Mawb,
    /// Origin airport code, when the input row carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airport_code: Option<String>,
    /// Customer short code, when the input row carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    /// Externally-supplied ground-truth HAWB count, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkbook_hawbs: Option<String>,
}

impl BatchItem {
    /// An item carrying only a MAWB.
    #[must_use]
    pub fn bare(mawb: Mawb) -> Self {
        Self {
            mawb,
            airport_code: None,
            customer: None,
            checkbook_hawbs: None,
        }
    }
}

/// Which pipeline sections to run for each item of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Sections {
    /// AMS summary lookup.
    pub ams: bool,
    /// Entries index scrape.
    pub entries: bool,
    /// Custom Report download + parse.
    pub custom: bool,
    /// 7501 batch PDF download, compression, and extraction.
    pub download_7501_pdf: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Self {
            ams: true,
            entries: true,
            custom: true,
            download_7501_pdf: false,
        }
    }
}

impl Sections {
    /// Entries must run when requested directly or when a downstream section
    /// needs its output (oldest entry date, entry rows).
    #[must_use]
    pub fn needs_entries(&self) -> bool {
        self.entries || self.custom || self.download_7501_pdf
    }
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// Broker credentials for portal login. Read-only to the pipeline.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct Broker {
    /// Catalog identity.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Portal login name.
    pub username: String,
    /// Portal password.
    pub password: String,
    /// Whether the portal demands TOTP 2FA for this account.
    #[serde(default)]
    pub auth_required: bool,
    /// `otpauth://totp/...` URI, required when `auth_required` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_uri: Option<String>,
    /// Inactive brokers are hidden from selection.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_required", &self.auth_required)
            .field("otp_uri", &self.otp_uri.as_ref().map(|_| "<redacted>"))
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// The Custom Report form body carried by a [`Format`].
///
/// The portal identifies the template by the `headerFields`/`manifestFields`
/// arrays, not by numeric id; list fields are serialized as repeated form
/// keys and `defaultValues` is merged into the POST body verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    /// Header-level report columns.
    pub header_fields: Vec<String>,
    /// Manifest-level report columns.
    pub manifest_fields: Vec<String>,
    /// Invoice-level report columns, when the template has them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invoice_fields: Vec<String>,
    /// Line-item report columns, when the template has them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_fields: Vec<String>,
    /// Tariff report columns, when the template has them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tariff_fields: Vec<String>,
    /// Scalar form fields merged into the POST body as-is.
    #[serde(default)]
    pub default_values: BTreeMap<String, String>,
}

/// Which workbook dialect a format's report parses as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDialect {
    /// Default dialect: straight row sums.
    FteMatch,
    /// Keyed dialect: duty deduplicated per column-0 key.
    ShoaibMatch,
}

/// A Custom Report template definition from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Format {
    /// Catalog identity.
    pub id: Uuid,
    /// Display name (drives the `_V2` artifact suffix for Shoaib).
    pub name: String,
    /// Identifier selecting the workbook dialect.
    pub template_identifier: String,
    /// Form body configuration; required for the Custom Report section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_payload: Option<TemplatePayload>,
    /// Inactive formats are hidden from selection.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Format {
    /// The workbook dialect implied by `template_identifier`.
    #[must_use]
    pub fn dialect(&self) -> ReportDialect {
        if self.template_identifier.to_lowercase().contains("shoaib") {
            ReportDialect::ShoaibMatch
        } else {
            ReportDialect::FteMatch
        }
    }

    /// `true` when artifacts for this format carry the `_V2` suffix.
    #[must_use]
    pub fn is_shoaib(&self) -> bool {
        self.dialect() == ReportDialect::ShoaibMatch
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal status of a processed batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The pipeline reached its end; the summary is as complete as the
    /// enabled sections allowed.
    Success,
    /// The pipeline short-circuited or failed outright.
    Failed,
}

/// Upsert key for persisted results.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    /// Normalized MAWB.
    pub mawb: Mawb,
    /// Broker the run authenticated as.
    pub broker_id: Uuid,
    /// Format the run reported against.
    pub format_id: Uuid,
}

/// The consolidated record persisted once per `(mawb, broker, format)` per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyResult {
    /// Normalized MAWB.
    pub mawb: Mawb,
    /// Broker the run authenticated as.
    pub broker_id: Uuid,
    /// Format the run reported against.
    pub format_id: Uuid,
    /// Terminal status.
    pub status: ResultStatus,
    /// The full fixed-key summary.
    pub summary: Summary,
    /// Object-store key of the uploaded Custom Report workbook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    /// Presigned URL for the workbook (expires; re-sign from the key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    /// Object-store key of the compressed 7501 batch PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    /// Presigned URL for the PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    /// Why the item failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Airport code from the batch item, kept for artifact naming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airport_code: Option<String>,
    /// Customer from the batch item, kept for artifact naming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    /// When processing of this item began.
    pub started_at: DateTime<Utc>,
    /// When processing finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DutyResult {
    /// The upsert key for this result.
    #[must_use]
    pub fn key(&self) -> ResultKey {
        ResultKey {
            mawb: self.mawb.clone(),
            broker_id: self.broker_id,
            format_id: self.format_id,
        }
    }
}
