// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation between batch items.
//!
//! One token per batch run. The orchestrator checks it between items only:
//! an in-flight portal call is never interrupted, it completes or times
//! out, and the batch stops before the next MAWB starts.
//!
//! The token is a thin wrapper over a `tokio::sync::watch` channel holding a
//! single cancelled/not-cancelled flag: clones share the sender, observers
//! subscribe for the flag to flip.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable cancellation flag shared by all clones.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    /// `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolve when the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut watcher = self.flag.subscribe();
        // wait_for inspects the current value before sleeping, and the
        // sender cannot drop while `&self` is alive, so this cannot fail.
        let _ = watcher.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
