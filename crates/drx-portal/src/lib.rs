// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-portal
//!
//! Portal adapter: the four scraping flows as resilient HTTP protocols.
//!
//! One [`PortalClient`] per pipeline invocation owns the authenticated
//! cookie header and the header discipline the portal expects. Each flow is
//! a POST/GET sequence with a per-call timeout and the shared retry wrapper;
//! every HTML page is interpreted by a pure parser in [`html`] so nothing
//! document-shaped ever crosses an `await`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// AMS lookup flow (search + master detail).
pub mod ams;
/// Shared HTTP client: headers, cookies, timeouts, retry.
pub mod client;
/// Custom Report download flow.
pub mod custom_report;
/// Entries index flow and entry-detail fan-out.
pub mod entries;
/// Pure HTML parsers for every portal page.
pub mod html;
/// 7501 batch PDF generation flow.
pub mod pdf7501;

pub use ams::AmsLookup;
pub use client::PortalClient;
pub use custom_report::CustomReportDownload;
pub use entries::{EntriesIndex, EntryDetailTotals, EntryRow};

use drx_retry::Transient;
use thiserror::Error;

/// Errors from portal flows.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Transport-level failure from the HTTP client.
    #[error("portal request failed")]
    Http(#[source] reqwest::Error),

    /// The portal answered with a non-success status.
    #[error("portal returned HTTP {status}")]
    Status {
        /// Response status code.
        status: u16,
    },

    /// A page did not contain the structure the parser anchors on.
    #[error("failed to parse portal page: {what}")]
    Parse {
        /// Which anchor or table was missing.
        what: String,
    },

    /// A download answered with the wrong content type (usually an HTML
    /// error page in place of a file).
    #[error("unexpected content type: expected {expected}, got {got}")]
    UnexpectedContentType {
        /// What the flow required.
        expected: &'static str,
        /// What the portal sent.
        got: String,
    },
}

impl Transient for PortalError {
    fn is_transient(&self) -> bool {
        match self {
            PortalError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PortalError::Status { status } => *status >= 500,
            PortalError::Parse { .. } | PortalError::UnexpectedContentType { .. } => false,
        }
    }

    fn is_connection_error(&self) -> bool {
        matches!(self, PortalError::Http(e) if e.is_connect())
    }
}
