// SPDX-License-Identifier: MIT OR Apache-2.0
//! drx-runtime
//!
//! Orchestration layer.
//!
//! Responsibilities:
//! - acquire a valid broker session per item (probe-then-login)
//! - run the per-MAWB pipeline in the mandated stage order, each stage
//!   inside a recovery boundary
//! - gate the 7501 PDF on the verification engine and reconcile afterwards
//! - persist exactly one result per `(mawb, broker, format)` and stream
//!   progress/log events to the caller

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Cooperative cancellation between batch items.
pub mod cancel;
/// Observer hooks and progress scaling.
pub mod hooks;
/// Batch orchestrator: sequential scheduling, dedup, cancellation.
pub mod orchestrator;
/// The per-MAWB processing pipeline.
pub mod pipeline;
/// Verification engine: pre-PDF gate and post-PDF reconciliation.
pub mod verify;

pub use cancel::CancellationToken;
pub use hooks::{NullObserver, ProgressScale, RunObserver};
pub use orchestrator::{BatchOrchestrator, BatchRequest};
pub use pipeline::DutyPipeline;
