// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-core
//!
//! Stable contract types for duty-recon.
//!
//! Everything that crosses a crate boundary lives here: the [`Mawb`]
//! identity, batch inputs, broker/format catalog records, the fixed-key
//! [`Summary`], and the persisted [`DutyResult`]. Parsing helpers for
//! currency strings and portal `mm/dd/yy` dates sit alongside because the
//! reconciliation rules are defined in terms of them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Portal date parsing and formatting (`mm/dd/yy` and compact `MMDDYY`).
pub mod dates;
/// The 11-digit Master Air Waybill identity.
pub mod mawb;
/// Currency string parsing and formatting.
pub mod money;
/// The fixed-key per-MAWB summary map.
pub mod summary;
/// Batch, broker, format, and result records.
pub mod types;

pub use mawb::{Mawb, MawbError};
pub use summary::{Summary, SummaryKey};
pub use types::{
    BatchItem, Broker, DutyResult, Format, ReportDialect, ResultKey, ResultStatus, Sections,
    TemplatePayload,
};
