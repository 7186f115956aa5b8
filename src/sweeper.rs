use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use crate::config::SweepSettings;
use crate::dispatch::Dispatcher;
use crate::error::SweepError;
use crate::models::{LeadSubmission, WebhookPayload};
use crate::store::{CandidateQuery, LeadStore};

/// What happened to a single candidate row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Claimed and accepted by the webhook; the row stays `processing`.
    Dispatched,
    /// Another writer moved the row before we could claim it.
    Skipped,
    /// The claim update itself errored.
    ClaimFailed(String),
    /// Claimed but delivery failed. `reconciled` is false when the row could
    /// not be put back to `failed` and is left in `processing`.
    DispatchFailed { reason: String, reconciled: bool },
}

/// Counters for one sweep.
///
/// `scanned == claimed + skipped + failed_at_claim` and
/// `claimed == dispatched_ok + failed_at_dispatch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub claimed: usize,
    pub dispatched_ok: usize,
    pub skipped: usize,
    pub failed_at_claim: usize,
    pub failed_at_dispatch: usize,
}

impl SweepSummary {
    pub fn failed(&self) -> usize {
        self.failed_at_claim + self.failed_at_dispatch
    }

    pub fn is_consistent(&self) -> bool {
        self.scanned == self.claimed + self.skipped + self.failed_at_claim
            && self.claimed == self.dispatched_ok + self.failed_at_dispatch
    }

    fn record(&mut self, outcome: &RowOutcome) {
        self.scanned += 1;
        match outcome {
            RowOutcome::Dispatched => {
                self.claimed += 1;
                self.dispatched_ok += 1;
            }
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::ClaimFailed(_) => self.failed_at_claim += 1,
            RowOutcome::DispatchFailed { .. } => {
                self.claimed += 1;
                self.failed_at_dispatch += 1;
            }
        }
    }
}

/// One bounded pass over retry-eligible leads.
pub struct Sweeper {
    store: Arc<dyn LeadStore>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: SweepSettings,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn LeadStore>,
        dispatcher: Arc<dyn Dispatcher>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            settings,
        }
    }

    /// Scan, claim, dispatch, reconcile. Only a failed candidate read is an
    /// error; per-row problems end up in the returned counters.
    pub async fn run_sweep(&self) -> Result<SweepSummary, SweepError> {
        let cutoff = ChronoDuration::try_hours(i64::from(self.settings.lookback_hours))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                SweepError::Config(format!(
                    "lookback of {} hours is out of range",
                    self.settings.lookback_hours
                ))
            })?;

        tracing::info!(
            store = self.store.name(),
            lookback_hours = self.settings.lookback_hours,
            batch_size = self.settings.batch_size,
            max_per_run = self.settings.max_per_run,
            timeout_ms = self.settings.dispatch_timeout.as_millis() as u64,
            %cutoff,
            "Starting lead retry sweep"
        );

        let candidates = self
            .store
            .fetch_candidates(&CandidateQuery {
                cutoff,
                limit: self.settings.max_per_run,
            })
            .await
            .map_err(SweepError::CandidateRead)?;

        let mut summary = SweepSummary::default();

        if candidates.is_empty() {
            tracing::info!("No pending or failed leads in window, nothing to do");
            log_summary(&summary);
            return Ok(summary);
        }

        // A zero batch size would make `chunks` panic; treat it as one row per chunk.
        let batch_size = self.settings.batch_size.max(1);
        let batches = candidates.len().div_ceil(batch_size);

        for (index, batch) in candidates.chunks(batch_size).enumerate() {
            tracing::debug!("Processing batch {}/{batches} ({} rows)", index + 1, batch.len());

            for lead in batch {
                let outcome = self.process_row(lead).await;
                summary.record(&outcome);
            }
        }

        log_summary(&summary);
        Ok(summary)
    }

    /// Claim, dispatch and reconcile one row.
    pub async fn process_row(&self, lead: &LeadSubmission) -> RowOutcome {
        let claimed = match self.store.claim(&lead.id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::debug!(lead_id = %lead.id, "Lead already claimed elsewhere, skipping");
                return RowOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(lead_id = %lead.id, error = %e, "Failed to claim lead");
                return RowOutcome::ClaimFailed(e.to_string());
            }
        };

        let payload = WebhookPayload::from(&claimed);

        let err = match self.dispatcher.dispatch(&payload).await {
            Ok(()) => {
                tracing::debug!(lead_id = %claimed.id, "Lead dispatched");
                return RowOutcome::Dispatched;
            }
            Err(e) => e,
        };

        let reason = err.to_string();
        tracing::warn!(lead_id = %claimed.id, error = %reason, "Lead dispatch failed");

        let reconciled = match self.store.mark_failed(&claimed.id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    lead_id = %claimed.id,
                    error = %e,
                    "Failed to mark lead as failed; row left in processing"
                );
                false
            }
        };

        RowOutcome::DispatchFailed { reason, reconciled }
    }
}

fn log_summary(summary: &SweepSummary) {
    tracing::info!(
        scanned = summary.scanned,
        claimed = summary.claimed,
        dispatched_ok = summary.dispatched_ok,
        failed = summary.failed(),
        skipped = summary.skipped,
        "Lead retry sweep complete"
    );
}
