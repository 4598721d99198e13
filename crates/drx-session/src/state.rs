// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cookie/origin snapshot types.
//!
//! A [`SessionState`] is what login hands back and what gets persisted per
//! broker: the cookie jar contents, any origin storage the browser captured,
//! and a `_calculated_expiry` hint — the earliest future cookie expiry —
//! used to decide whether a snapshot is even worth probing.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One captured cookie. Field names match the browser storage-state layout
/// the snapshot files use on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain, e.g. `.netchb.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix expiry in seconds. Session cookies carry `-1` or are absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    /// HttpOnly flag.
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag.
    #[serde(default)]
    pub secure: bool,
}

/// Snapshot of an authenticated browser session for one broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Captured cookies.
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    /// Captured origin storage, kept opaque; cookies alone carry the portal
    /// session.
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
    /// Earliest future cookie expiry at snapshot time, unix seconds.
    #[serde(
        rename = "_calculated_expiry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub calculated_expiry: Option<f64>,
}

impl SessionState {
    /// Build a state from cookies, computing the expiry hint against `now`.
    #[must_use]
    pub fn from_cookies(cookies: Vec<SessionCookie>) -> Self {
        let now = unix_now();
        let mut state = Self {
            cookies,
            origins: Vec::new(),
            calculated_expiry: None,
        };
        state.calculated_expiry = state.earliest_future_expiry(now);
        state
    }

    /// `min{c.expires | c.expires > now}`. Session cookies (negative or
    /// missing expiry) never count.
    #[must_use]
    pub fn earliest_future_expiry(&self, now: f64) -> Option<f64> {
        self.cookies
            .iter()
            .filter_map(|c| c.expires)
            .filter(|&e| e > 0.0 && e > now)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// `true` when the expiry hint says the snapshot is already stale.
    /// Absent hints (session cookies only) are treated as possibly-live;
    /// the probe decides.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.calculated_expiry {
            Some(expiry) => expiry <= unix_now(),
            None => false,
        }
    }

    /// Render a `Cookie:` header value for HTTP reuse of this session.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `true` when the snapshot carries no cookies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
