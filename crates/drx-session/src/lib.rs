// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-session
//!
//! Per-broker session lifecycle.
//!
//! Strategy: **probe-then-login**. A persisted cookie snapshot is validated
//! with one cheap HTTP GET against the AMS page; only when that fails does
//! the (expensive, 2FA-gated) browser login run. Logins are serialized
//! through a process-wide single-slot semaphore because concurrent TOTP
//! submissions can consume each other's codes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Chromium-driven login flow.
#[cfg(feature = "browser")]
pub mod browser;
/// Session acquisition: probe, login, persist.
pub mod manager;
/// TOTP code generation from otpauth URIs.
pub mod otp;
/// Cookie/origin snapshot types.
pub mod state;
/// Per-broker snapshot persistence.
pub mod store;

pub use manager::{LoginDriver, SessionManager};
pub use otp::{OtpError, OtpProvider};
pub use state::{SessionCookie, SessionState};
pub use store::SessionStore;

use thiserror::Error;

/// Errors from session acquisition.
#[derive(Debug, Error)]
pub enum SessionError {
    /// TOTP generation failed.
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// A snapshot file could not be read or written.
    #[error("session snapshot io failed for {path}")]
    SnapshotIo {
        /// Path involved.
        path: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file held invalid JSON.
    #[error("session snapshot is corrupt: {0}")]
    SnapshotCorrupt(#[source] serde_json::Error),

    /// The browser login flow did not reach the dashboard.
    #[error("login failed: {reason}")]
    LoginFailed {
        /// What went wrong, in portal terms.
        reason: String,
    },

    /// The browser itself failed (launch, navigation, protocol).
    #[error("browser automation failed: {0}")]
    Browser(String),
}
