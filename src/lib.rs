// SPDX-License-Identifier: MIT OR Apache-2.0
//! duty-recon workspace root.
//!
//! The root package exists to host cross-crate integration tests under
//! `tests/`; the implementation lives in the `crates/drx-*` members.
