//! Job store seam.
//!
//! The store is the only shared mutable state in the pipeline. All writers go
//! through typed, field-scoped [`ReportPatch`] merges so concurrent collector
//! writes cannot clobber each other and a merge can never silently corrupt
//! the record shape. Every successful mutation emits the job id on the
//! store's change channel, which is what triggers the aggregator.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use homerisk_model::{CollectorEntry, JobId, ReportStatus, RiskAnalysis, RiskReport};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::registry::CollectorKind;

pub use memory::MemoryJobStore;
pub use postgres::PostgresJobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report not found: {0}")]
    NotFound(JobId),

    #[error("unknown collector `{0}` in merge")]
    UnknownCollector(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A field-scoped partial update. Whole-document overwrite is reserved for
/// the cache-refresh path ([`JobStore::replace`]).
#[derive(Debug, Clone)]
pub enum ReportPatch {
    /// Write one collector's terminal entry. First terminal write wins;
    /// redelivered tasks re-merge into a no-op.
    CollectorResult {
        collector: CollectorKind,
        entry: CollectorEntry,
    },
    /// Advance the status state machine. Invalid transitions (including any
    /// write after a terminal status) are silent no-ops, which is what makes
    /// at-least-once redelivery safe.
    Status(ReportStatus),
    /// Finalize as COMPLETED with the analysis attached.
    Finalize(RiskAnalysis),
    /// Finalize as FAILED with an error detail and no partial analysis.
    Fail(String),
}

/// Outcome of [`JobStore::create_if_absent`].
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(RiskReport),
    /// Another submission won the creation race; its record is returned.
    Existing(RiskReport),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError>;

    /// Atomic create-if-absent, so concurrent first submissions for one
    /// identity cannot produce duplicate jobs.
    async fn create_if_absent(&self, report: RiskReport) -> Result<CreateOutcome, StoreError>;

    /// Destructive in-place overwrite, used only by the cache-refresh path.
    /// Also resets the finalize claim for the new pipeline run.
    async fn replace(&self, report: RiskReport) -> Result<(), StoreError>;

    /// Apply a field-scoped merge and return the resulting record. Emits a
    /// change event iff the patch changed anything.
    async fn merge(&self, id: &JobId, patch: ReportPatch) -> Result<RiskReport, StoreError>;

    /// Atomically claim the right to finalize: succeeds at most once per
    /// pipeline run, and only while the report is still PROCESSING. Returns
    /// the claimed record, or `None` if already claimed or not claimable.
    async fn claim_finalize(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError>;

    /// Subscribe to report-change events.
    fn changes(&self) -> broadcast::Receiver<JobId>;
}

/// Apply `patch` to `report` in place, enforcing the monotonicity invariants.
/// Returns whether anything changed; `updated_at` moves only on change.
///
/// Shared by every backend so the merge semantics cannot drift between them.
pub(crate) fn apply_patch(
    report: &mut RiskReport,
    patch: &ReportPatch,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = match patch {
        ReportPatch::CollectorResult { collector, entry } => {
            let slot = report
                .collector_results
                .get_mut(collector.as_str())
                .ok_or_else(|| StoreError::UnknownCollector(collector.as_str().to_string()))?;
            if slot.is_terminal() {
                false
            } else {
                *slot = entry.clone();
                true
            }
        }
        ReportPatch::Status(next) => {
            if report.status.can_transition_to(*next) {
                report.status = *next;
                true
            } else {
                false
            }
        }
        ReportPatch::Finalize(analysis) => {
            if report.status.can_transition_to(ReportStatus::Completed) {
                report.status = ReportStatus::Completed;
                report.risk_analysis = Some(analysis.clone());
                report.error = None;
                true
            } else {
                false
            }
        }
        ReportPatch::Fail(detail) => {
            if report.status.can_transition_to(ReportStatus::Failed) {
                report.status = ReportStatus::Failed;
                report.error = Some(detail.clone());
                true
            } else {
                false
            }
        }
    };
    if changed {
        report.updated_at = now;
    }
    Ok(changed)
}
