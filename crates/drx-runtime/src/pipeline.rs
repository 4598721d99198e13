// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-MAWB processing pipeline.
//!
//! Stage order is fixed: AMS, Entries, Custom Report, 7501 PDF. Each stage
//! runs inside a recovery boundary — a failure leaves its summary fields at
//! `"N/A"` and the pipeline continues. Exactly two conditions short-circuit
//! the run: AMS reporting the master as not found, and the entries index
//! coming back empty. Either way the item still produces one persisted
//! result.

use crate::hooks::{ProgressScale, RunObserver};
use crate::verify;
use chrono::{NaiveDate, Utc};
use drx_core::dates::format_mmddyy;
use drx_core::money::format_amount;
use drx_core::{BatchItem, DutyResult, Format, Mawb, ResultStatus, Sections, Summary, SummaryKey};
use drx_pdf::CompressionOutcome;
use drx_portal::{EntriesIndex, PortalClient, ams, custom_report, entries, pdf7501};
use drx_store::{ArtifactGateway, ObjectStore, ResultStore};
use tracing::{info, warn};
use uuid::Uuid;

/// Runs the full stage sequence for single batch items.
pub struct DutyPipeline<'a, S, R> {
    portal: &'a PortalClient,
    gateway: &'a ArtifactGateway<S>,
    results: &'a R,
    observer: &'a dyn RunObserver,
    scale: ProgressScale,
    today: NaiveDate,
}

impl<'a, S: ObjectStore, R: ResultStore> DutyPipeline<'a, S, R> {
    /// Assemble a pipeline around its collaborators.
    ///
    /// `today` is injected so the Custom Report window and the PDF signing
    /// date are deterministic under test.
    #[must_use]
    pub fn new(
        portal: &'a PortalClient,
        gateway: &'a ArtifactGateway<S>,
        results: &'a R,
        observer: &'a dyn RunObserver,
        scale: ProgressScale,
        today: NaiveDate,
    ) -> Self {
        Self {
            portal,
            gateway,
            results,
            observer,
            scale,
            today,
        }
    }

    /// Process one item through the enabled sections, persist the result,
    /// and return it. Never fails: every outcome is a [`DutyResult`].
    pub async fn process(
        &self,
        item: &BatchItem,
        broker_id: Uuid,
        format: &Format,
        sections: &Sections,
    ) -> DutyResult {
        let mawb = &item.mawb;
        let started_at = Utc::now();
        let mut summary = Summary::new(mawb, item.checkbook_hawbs.as_deref());
        let mut result = DutyResult {
            mawb: mawb.clone(),
            broker_id,
            format_id: format.id,
            status: ResultStatus::Success,
            summary: summary.clone(),
            artifact_path: None,
            artifact_url: None,
            pdf_path: None,
            pdf_url: None,
            error_message: None,
            airport_code: item.airport_code.clone(),
            customer: item.customer.clone(),
            started_at,
            completed_at: None,
        };

        info!(target: "drx.pipeline", mawb = %mawb, "processing started");
        self.progress(mawb, "Processing MAWB", 0.05);

        // -- AMS ------------------------------------------------------------
        if sections.ams {
            match ams::lookup(self.portal, mawb).await {
                Ok(lookup) if lookup.master_not_found => {
                    self.log(mawb, "master not found, skipping remaining sections");
                    return self
                        .finish(result, summary, ResultStatus::Failed, Some("Master not found"))
                        .await;
                }
                Ok(lookup) => {
                    summary.set(SummaryKey::AmsTotalHawbs, lookup.total_hawbs);
                    summary.set(SummaryKey::AmsDuty, lookup.duty);
                    summary.set(SummaryKey::AmsTotalT11Entries, lookup.t11_entries);
                    summary.set(SummaryKey::AmsEntriesAccepted, lookup.entries_accepted);
                    summary.set(SummaryKey::RejectedEntries, lookup.rejected_entries);
                    summary.set(SummaryKey::TotalHouses7501, lookup.houses_7501);
                    self.log(mawb, "AMS section complete");
                }
                Err(e) => self.stage_failed(mawb, "AMS", &e),
            }
        }
        self.progress(mawb, "AMS complete", 0.25);

        // -- Entries --------------------------------------------------------
        let mut index: Option<EntriesIndex> = None;
        let mut entries_not_found = false;
        if sections.needs_entries() {
            match entries::search(self.portal, mawb).await {
                Ok(ix) if ix.not_found => {
                    self.log(mawb, "entries not found, skipping custom report and PDF");
                    entries_not_found = true;
                }
                Ok(ix) => {
                    if let Some(oldest) = ix.oldest_entry_date {
                        summary.set(SummaryKey::EntryDate, format_mmddyy(oldest));
                    }
                    self.log(mawb, "entries section complete");
                    index = Some(ix);
                }
                Err(e) => self.stage_failed(mawb, "Entries", &e),
            }
        }
        self.progress(mawb, "Entries complete", 0.45);

        // -- Custom Report --------------------------------------------------
        if sections.custom && !entries_not_found {
            match index.as_ref().and_then(|ix| ix.oldest_entry_date) {
                Some(oldest) => {
                    self.run_custom_report(item, format, oldest, &mut summary, &mut result)
                        .await;
                }
                None => self.log(mawb, "custom report skipped: no oldest entry date available"),
            }
        }
        self.progress(mawb, "Custom report complete", 0.7);

        // -- 7501 batch PDF -------------------------------------------------
        if sections.download_7501_pdf && !entries_not_found {
            match index.as_ref() {
                Some(ix) if !ix.rows.is_empty() => {
                    self.run_pdf_section(item, ix, sections, &mut summary, &mut result)
                        .await;
                }
                _ => self.log(mawb, "PDF download skipped: no entry rows available"),
            }
        }
        self.progress(mawb, "PDF section complete", 0.9);

        if entries_not_found {
            return self
                .finish(result, summary, ResultStatus::Failed, Some("Entries not found"))
                .await;
        }
        self.finish(result, summary, ResultStatus::Success, None).await
    }

    async fn run_custom_report(
        &self,
        item: &BatchItem,
        format: &Format,
        oldest: NaiveDate,
        summary: &mut Summary,
        result: &mut DutyResult,
    ) {
        let mawb = &item.mawb;
        let Some(payload) = format.template_payload.as_ref() else {
            self.log(
                mawb,
                "custom report skipped: format carries no template payload",
            );
            return;
        };

        let download =
            match custom_report::download(self.portal, mawb, payload, oldest, self.today).await {
                Ok(download) => download,
                Err(e) => {
                    self.stage_failed(mawb, "Custom Report", &e);
                    return;
                }
            };

        let report = match drx_report::parse_workbook(&download.bytes, format.dialect()) {
            Ok(report) => report,
            Err(e) => {
                self.stage_failed(mawb, "Custom Report", &e);
                return;
            }
        };

        summary.set(SummaryKey::ReportDuty, report.report_duty_text());
        summary.set(SummaryKey::ReportTotalHouse, report.total_house.to_string());
        summary.set(SummaryKey::TotalInformalDuty, report.total_informal_text());
        summary.set(SummaryKey::CompleteTotalDuty, report.complete_duty_text());
        summary.set(SummaryKey::EntryDate, report.entry_dates_text());
        summary.set(SummaryKey::CargoReleaseDate, report.release_dates_text());
        self.log(mawb, "custom report parsed");

        // Upload is best-effort: the figures above are already extracted.
        match self
            .gateway
            .upload_excel(
                mawb,
                item.airport_code.as_deref(),
                item.customer.as_deref(),
                format.is_shoaib(),
                download.bytes,
            )
            .await
        {
            Ok((key, url)) => {
                self.log(mawb, &format!("report workbook uploaded to {key}"));
                result.artifact_path = Some(key);
                result.artifact_url = (!url.is_empty()).then_some(url);
            }
            Err(e) => {
                warn!(target: "drx.pipeline", mawb = %mawb, error = %e, "report upload failed, keeping parsed figures");
            }
        }
    }

    async fn run_pdf_section(
        &self,
        item: &BatchItem,
        index: &EntriesIndex,
        sections: &Sections,
        summary: &mut Summary,
        result: &mut DutyResult,
    ) {
        let mawb = &item.mawb;

        // Pre-PDF gate, only meaningful when both sides of the comparison
        // were populated this run.
        if sections.ams && sections.custom {
            let (ok, issues) = verify::pre_pdf_gate(summary);
            if ok {
                self.log(mawb, "pre-PDF verification passed");
            } else {
                self.log(
                    mawb,
                    &format!("PDF download skipped, verification failed: {}", issues.join("; ")),
                );
                summary.set(SummaryKey::BatchPdfUrl7501, "");
                return;
            }
        }

        let entry_numbers = index.entry_numbers();
        if entry_numbers.is_empty() {
            self.log(mawb, "PDF download skipped: no entry numbers extracted");
            return;
        }

        let bytes =
            match pdf7501::download_batch(self.portal, &entry_numbers, self.today).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.stage_failed(mawb, "7501 PDF", &e);
                    return;
                }
            };

        let compressed = match drx_pdf::compress_bytes(
            &bytes,
            self.portal.timeouts().compression(),
        )
        .await
        {
            Ok((compressed, CompressionOutcome::Compressed { original, compressed: size })) => {
                self.log(
                    mawb,
                    &format!("PDF compressed {original} -> {size} bytes"),
                );
                compressed
            }
            Ok((compressed, CompressionOutcome::Fallback { reason })) => {
                self.log(mawb, &format!("PDF compression fell back: {reason}"));
                compressed
            }
            Err(e) => {
                self.stage_failed(mawb, "7501 PDF", &e);
                return;
            }
        };

        match self
            .gateway
            .upload_pdf(
                mawb,
                item.airport_code.as_deref(),
                item.customer.as_deref(),
                compressed.clone(),
            )
            .await
        {
            Ok((key, url)) => {
                self.log(mawb, &format!("batch PDF uploaded to {key}"));
                summary.set(SummaryKey::BatchPdfUrl7501, url.clone());
                result.pdf_path = Some(key);
                result.pdf_url = (!url.is_empty()).then_some(url);
            }
            Err(e) => {
                warn!(target: "drx.pipeline", mawb = %mawb, error = %e, "PDF upload failed, keeping extraction");
                summary.set(SummaryKey::BatchPdfUrl7501, "");
            }
        }

        match drx_pdf::extract_figures(&compressed) {
            Ok(figures) => {
                summary.set(
                    SummaryKey::TotalT11Entries7501,
                    figures.entry_count.to_string(),
                );
                summary.set(SummaryKey::Duty7501, format_amount(figures.total_duty));
                if figures.entry_count == 0 {
                    self.log(mawb, "warning: zero entries extracted from batch PDF");
                }
                if figures.total_duty == 0.0 {
                    self.log(mawb, "warning: zero duty extracted from batch PDF");
                }
            }
            Err(e) => self.stage_failed(mawb, "PDF extraction", &e),
        }

        if sections.ams && sections.custom {
            let (ok, issues) = verify::post_pdf_reconciliation(summary);
            if ok {
                self.log(mawb, "post-PDF reconciliation passed");
            } else {
                // Informational only, never blocks the result.
                self.log(
                    mawb,
                    &format!("post-PDF reconciliation issues: {}", issues.join("; ")),
                );
            }
        }
    }

    async fn finish(
        &self,
        mut result: DutyResult,
        summary: Summary,
        status: ResultStatus,
        error_message: Option<&str>,
    ) -> DutyResult {
        result.summary = summary;
        result.status = status;
        result.error_message = error_message.map(ToString::to_string);
        result.completed_at = Some(Utc::now());

        self.progress(&result.mawb, "Saving results", 0.95);
        if let Err(e) = self.results.upsert(&result).await {
            warn!(target: "drx.pipeline", mawb = %result.mawb, error = %e, "result upsert failed");
        }
        self.progress(&result.mawb, "Completed", 1.0);
        info!(
            target: "drx.pipeline",
            mawb = %result.mawb,
            status = ?result.status,
            "processing complete"
        );
        result
    }

    fn log(&self, mawb: &Mawb, message: &str) {
        info!(target: "drx.pipeline", mawb = %mawb, "{message}");
        self.observer.on_log(mawb, message);
    }

    /// Recovery boundary: record the failure with its full cause chain and
    /// let the pipeline continue with `"N/A"` fields.
    fn stage_failed(&self, mawb: &Mawb, stage: &str, error: &dyn std::error::Error) {
        let mut chain = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        warn!(target: "drx.pipeline", mawb = %mawb, stage, error = %chain, "stage failed, continuing");
        self.observer
            .on_log(mawb, &format!("{stage} section failed: {chain}"));
    }

    fn progress(&self, mawb: &Mawb, message: &str, fraction: f64) {
        let _ = mawb;
        self.observer
            .on_progress(message, self.scale.percent(fraction));
    }
}
