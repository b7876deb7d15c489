//! Runs the four stages in order: list subscriptions, resolve invoice pairs,
//! checkpoint to disk, enrich from the reloaded checkpoint and persist.

use crate::config::Config;
use crate::enrichment::{DetailEnricher, DetailFailure};
use crate::errors::AppError;
use crate::models::EnrichedRecord;
use crate::output;
use crate::resolver::{self, InvoicePairResolver, SkipReason, SkippedSubscription};
use crate::snapshot;
use crate::stripe_client::BillingApi;
use std::fmt;
use tracing::Instrument;
use uuid::Uuid;

/// Batch-level account of a run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub subscriptions_listed: usize,
    pub summaries_written: usize,
    pub records_written: usize,
    pub skipped: Vec<SkippedSubscription>,
    pub detail_failures: Vec<DetailFailure>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            subscriptions_listed: 0,
            summaries_written: 0,
            records_written: 0,
            skipped: Vec::new(),
            detail_failures: Vec::new(),
        }
    }

    /// Subscriptions dropped because a fetch failed (not for lack of invoices).
    pub fn failed_subscriptions(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::FetchFailed(_)))
            .count()
    }

    /// Logs the end-of-batch summary and every recorded failure.
    pub fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            "Run complete: {} subscriptions listed, {} summarized, {} enriched records written",
            self.subscriptions_listed,
            self.summaries_written,
            self.records_written
        );

        for skipped in &self.skipped {
            match &skipped.reason {
                SkipReason::NoInvoices => tracing::info!(
                    "Skipped subscription {} (customer {}): {}",
                    skipped.subscription_id,
                    skipped.customer_id,
                    skipped.reason
                ),
                SkipReason::FetchFailed(_) => tracing::warn!(
                    "Skipped subscription {} (customer {}): {}",
                    skipped.subscription_id,
                    skipped.customer_id,
                    skipped.reason
                ),
            }
        }

        for failure in &self.detail_failures {
            tracing::warn!(
                "Subscription {}: {} unavailable: {}",
                failure.subscription_id,
                failure.detail,
                failure.reason
            );
        }

        if self.failed_subscriptions() > 0 || !self.detail_failures.is_empty() {
            tracing::warn!(
                "{} subscriptions failed, {} detail fetches failed",
                self.failed_subscriptions(),
                self.detail_failures.len()
            );
        }
    }
}

/// A run that stopped early, with whatever was recorded before it stopped.
#[derive(Debug)]
pub struct RunError {
    pub error: AppError,
    pub report: RunReport,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Executes one full run against `api`.
///
/// Per-record failures end up in the report. An error is returned only for
/// failures that stop the run: the subscription listing, or reading and
/// writing files. The error carries the partial report.
pub async fn run(api: &dyn BillingApi, config: &Config) -> Result<RunReport, RunError> {
    let (report, _) = run_with_records(api, config).await?;
    Ok(report)
}

/// Same as [`run`], also returning the records that were written.
pub async fn run_with_records(
    api: &dyn BillingApi,
    config: &Config,
) -> Result<(RunReport, Vec<EnrichedRecord>), RunError> {
    let run_id = Uuid::new_v4();
    let mut report = RunReport::new(run_id);
    let result = execute(api, config, &mut report)
        .instrument(tracing::info_span!("run", run_id = %run_id))
        .await;

    match result {
        Ok(records) => Ok((report, records)),
        Err(error) => Err(RunError { error, report }),
    }
}

async fn execute(
    api: &dyn BillingApi,
    config: &Config,
    report: &mut RunReport,
) -> Result<Vec<EnrichedRecord>, AppError> {
    // Stage 1
    let subscriptions = resolver::list_subscriptions(
        api,
        &config.subscription_status,
        config.subscription_page_size,
    )
    .await?;
    report.subscriptions_listed = subscriptions.len();

    // Stage 2
    let resolution = InvoicePairResolver::new(api)
        .resolve_all(&subscriptions)
        .await;
    report.skipped = resolution.skipped;

    // Stage 3
    let summaries = snapshot::checkpoint(&config.snapshot_path, &resolution.summaries).await?;
    report.summaries_written = summaries.len();

    // Stage 4
    let enrichment = DetailEnricher::new(api).enrich_all(&summaries).await;
    report.detail_failures = enrichment.failures;

    output::write_output(
        &config.output_path,
        &enrichment.records,
        config.output_format,
        config.json_layout,
    )
    .await?;
    report.records_written = enrichment.records.len();

    Ok(enrichment.records)
}
