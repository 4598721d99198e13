// SPDX-License-Identifier: MIT OR Apache-2.0
//! Result DAO trait, retrying wrapper, in-memory implementation.
//!
//! The relational catalog behind results is an external collaborator; the
//! pipeline only needs upsert-by-key and listing. [`RetryingResultStore`]
//! applies the project retry policy on top of any implementation and asks
//! it to reconnect after a connection-level failure, mirroring how the
//! production datastore client is re-created.

use crate::StoreError;
use async_trait::async_trait;
use drx_core::{DutyResult, ResultKey};
use drx_retry::RetryPolicy;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info};

/// Narrow DAO over the run-results datastore.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or overwrite the row for the result's `(mawb, broker, format)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Datastore`] on driver failure.
    async fn upsert(&self, result: &DutyResult) -> Result<(), StoreError>;

    /// All rows, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Datastore`] on driver failure.
    async fn list(&self) -> Result<Vec<DutyResult>, StoreError>;

    /// Re-establish the underlying connection after a connection error.
    /// Default: nothing to do.
    async fn reconnect(&self) {}
}

// ---------------------------------------------------------------------------
// Retrying wrapper
// ---------------------------------------------------------------------------

/// [`ResultStore`] wrapper applying the shared retry discipline.
pub struct RetryingResultStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ResultStore> RetryingResultStore<S> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ResultStore> ResultStore for RetryingResultStore<S> {
    async fn upsert(&self, result: &DutyResult) -> Result<(), StoreError> {
        drx_retry::run_with(&self.policy, "result-upsert", |attempt| async move {
            if attempt > 0 {
                self.inner.reconnect().await;
            }
            self.inner.upsert(result).await
        })
        .await
    }

    async fn list(&self) -> Result<Vec<DutyResult>, StoreError> {
        drx_retry::run_with(&self.policy, "result-list", |attempt| async move {
            if attempt > 0 {
                self.inner.reconnect().await;
            }
            self.inner.list().await
        })
        .await
    }

    async fn reconnect(&self) {
        self.inner.reconnect().await;
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory [`ResultStore`] used for local runs and tests.
///
/// Failures can be scripted (`fail_next`) so retry behavior is testable
/// without a real datastore.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    rows: Mutex<BTreeMap<ResultKey, DutyResult>>,
    scripted_failures: Mutex<Vec<String>>,
    attempts: Mutex<u32>,
    reconnects: Mutex<u32>,
}

impl MemoryResultStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `times` upserts to fail with `message`.
    pub fn fail_next(&self, times: u32, message: &str) {
        let mut failures = self
            .scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for _ in 0..times {
            failures.push(message.to_string());
        }
    }

    /// How many upsert attempts this store has seen.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// How many reconnects were requested.
    #[must_use]
    pub fn reconnects(&self) -> u32 {
        *self
            .reconnects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// `true` when no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one row by key.
    #[must_use]
    pub fn get(&self, key: &ResultKey) -> Option<DutyResult> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn upsert(&self, result: &DutyResult) -> Result<(), StoreError> {
        {
            let mut attempts = self
                .attempts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *attempts += 1;
        }
        {
            let mut failures = self
                .scripted_failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(message) = failures.pop() {
                debug!(target: "drx.store", %message, "scripted upsert failure");
                return Err(StoreError::Datastore { message });
            }
        }
        let key = result.key();
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.clone(), result.clone());
        info!(target: "drx.store", mawb = %key.mawb, "result upserted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DutyResult>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn reconnect(&self) {
        let mut reconnects = self
            .reconnects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *reconnects += 1;
    }
}
