//! In-memory job store, used in dev mode and by the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use homerisk_model::{JobId, ReportStatus, RiskReport};
use tokio::sync::{RwLock, broadcast};

use super::{CreateOutcome, JobStore, ReportPatch, StoreError, apply_patch};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

struct Entry {
    report: RiskReport,
    finalize_claimed: bool,
}

pub struct MemoryJobStore {
    reports: RwLock<HashMap<JobId, Entry>>,
    changes: broadcast::Sender<JobId>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            reports: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, id: &JobId) {
        // No receivers is fine; the aggregator may not be running in tests.
        let _ = self.changes.send(id.clone());
    }
}

impl std::fmt::Debug for MemoryJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryJobStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError> {
        Ok(self.reports.read().await.get(id).map(|e| e.report.clone()))
    }

    async fn create_if_absent(&self, report: RiskReport) -> Result<CreateOutcome, StoreError> {
        let mut reports = self.reports.write().await;
        if let Some(existing) = reports.get(&report.report_id) {
            return Ok(CreateOutcome::Existing(existing.report.clone()));
        }
        let id = report.report_id.clone();
        reports.insert(
            id.clone(),
            Entry {
                report: report.clone(),
                finalize_claimed: false,
            },
        );
        drop(reports);
        self.notify(&id);
        Ok(CreateOutcome::Created(report))
    }

    async fn replace(&self, report: RiskReport) -> Result<(), StoreError> {
        let id = report.report_id.clone();
        self.reports.write().await.insert(
            id.clone(),
            Entry {
                report,
                finalize_claimed: false,
            },
        );
        self.notify(&id);
        Ok(())
    }

    async fn merge(&self, id: &JobId, patch: ReportPatch) -> Result<RiskReport, StoreError> {
        let mut reports = self.reports.write().await;
        let entry = reports
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let changed = apply_patch(&mut entry.report, &patch, Utc::now())?;
        let report = entry.report.clone();
        drop(reports);
        if changed {
            self.notify(id);
        }
        Ok(report)
    }

    async fn claim_finalize(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError> {
        let mut reports = self.reports.write().await;
        let entry = reports
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if entry.finalize_claimed || entry.report.status != ReportStatus::Processing {
            return Ok(None);
        }
        entry.finalize_claimed = true;
        Ok(Some(entry.report.clone()))
    }

    fn changes(&self) -> broadcast::Receiver<JobId> {
        self.changes.subscribe()
    }
}
