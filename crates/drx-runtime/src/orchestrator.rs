// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch orchestrator: sequential scheduling, dedup, cancellation.
//!
//! Items run strictly one at a time — the portal and the browser-driven
//! login are not safely re-entrant within a session, and per-item cost
//! dominates anyway. Each item gets a freshly validated session and its own
//! portal client over that cookie jar; a login failure fails the item, never
//! the batch. Results come back in input order, one per deduplicated item.

use crate::cancel::CancellationToken;
use crate::hooks::{ProgressScale, RunObserver};
use crate::pipeline::DutyPipeline;
use chrono::{NaiveDate, Utc};
use drx_config::PortalConfig;
use drx_core::{BatchItem, Broker, DutyResult, Format, ResultStatus, Sections, Summary};
use drx_retry::RetryPolicy;
use drx_session::{LoginDriver, SessionManager};
use drx_store::{ArtifactGateway, ObjectStore, ResultStore};
use drx_portal::PortalClient;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// One batch of work: which broker to authenticate as, which report format
/// to use, which sections to run, and the parsed items.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Broker credentials for portal login.
    pub broker: Broker,
    /// Custom Report template definition.
    pub format: Format,
    /// Section toggles applied to every item.
    pub sections: Sections,
    /// Parsed batch items, input order.
    pub items: Vec<BatchItem>,
}

/// Schedules batch items through the pipeline.
pub struct BatchOrchestrator<S, R, D> {
    sessions: SessionManager<D>,
    gateway: ArtifactGateway<S>,
    results: R,
    portal: PortalConfig,
    retry: RetryPolicy,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
    today: NaiveDate,
}

impl<S: ObjectStore, R: ResultStore, D: LoginDriver> BatchOrchestrator<S, R, D> {
    /// Assemble an orchestrator around its collaborators.
    #[must_use]
    pub fn new(
        sessions: SessionManager<D>,
        gateway: ArtifactGateway<S>,
        results: R,
        portal: PortalConfig,
        retry: RetryPolicy,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            results,
            portal,
            retry,
            observer,
            cancel: CancellationToken::new(),
            today: Utc::now().date_naive(),
        }
    }

    /// Pin "today" for the report window and PDF signing date. Test hook.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// The token callers cancel to stop the batch between items.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The result store, for post-run listing.
    #[must_use]
    pub fn results(&self) -> &R {
        &self.results
    }

    /// Run a batch to completion (or cancellation), returning one result
    /// per deduplicated item in input order.
    pub async fn run(&self, request: &BatchRequest) -> Vec<DutyResult> {
        let items = dedupe(&request.items);
        let total = items.len();
        info!(
            target: "drx.orchestrator",
            items = total,
            dropped = request.items.len() - total,
            broker = %request.broker.name,
            "batch starting"
        );

        let mut results = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(target: "drx.orchestrator", processed = index, "batch cancelled between items");
                break;
            }

            let scale = ProgressScale { index, total };
            self.observer.on_progress(
                &format!("Processing {} ({}/{total})", item.mawb.formatted(), index + 1),
                scale.percent(0.0),
            );

            let result = self.run_item(request, item, scale).await;
            self.observer.on_result(&result);
            results.push(result);
        }

        info!(target: "drx.orchestrator", results = results.len(), "batch complete");
        results
    }

    async fn run_item(
        &self,
        request: &BatchRequest,
        item: &BatchItem,
        scale: ProgressScale,
    ) -> DutyResult {
        let session = match self.sessions.acquire(&request.broker).await {
            Ok(session) => session,
            Err(e) => {
                warn!(target: "drx.orchestrator", mawb = %item.mawb, error = %e, "login failed");
                return self
                    .record_failure(request, item, &format!("login failed: {e}"))
                    .await;
            }
        };

        let portal = match PortalClient::new(
            self.portal.base_url.clone(),
            &session,
            self.portal.timeouts.clone(),
            self.retry.clone(),
        ) {
            Ok(portal) => portal,
            Err(e) => {
                warn!(target: "drx.orchestrator", mawb = %item.mawb, error = %e, "portal client build failed");
                return self
                    .record_failure(request, item, &format!("portal client failed: {e}"))
                    .await;
            }
        };

        let pipeline = DutyPipeline::new(
            &portal,
            &self.gateway,
            &self.results,
            self.observer.as_ref(),
            scale,
            self.today,
        );
        pipeline
            .process(item, request.broker.id, &request.format, &request.sections)
            .await
    }

    /// A fatal pre-pipeline failure still yields (and persists) a result.
    async fn record_failure(
        &self,
        request: &BatchRequest,
        item: &BatchItem,
        message: &str,
    ) -> DutyResult {
        let result = DutyResult {
            mawb: item.mawb.clone(),
            broker_id: request.broker.id,
            format_id: request.format.id,
            status: ResultStatus::Failed,
            summary: Summary::new(&item.mawb, item.checkbook_hawbs.as_deref()),
            artifact_path: None,
            artifact_url: None,
            pdf_path: None,
            pdf_url: None,
            error_message: Some(message.to_string()),
            airport_code: item.airport_code.clone(),
            customer: item.customer.clone(),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        if let Err(e) = self.results.upsert(&result).await {
            warn!(target: "drx.orchestrator", mawb = %item.mawb, error = %e, "failed-result upsert failed");
        }
        result
    }
}

/// Drop repeated MAWBs, keeping first occurrence and input order.
fn dedupe(items: &[BatchItem]) -> Vec<&BatchItem> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.mawb.clone()))
        .collect()
}
