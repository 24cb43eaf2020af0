//! Collector-timeout watchdog.
//!
//! A published task either reaches a terminal sub-status on its own or is
//! superseded by this watchdog, which force-writes a completed-with-error
//! entry for every collector still pending after the timeout. Pure liveness:
//! it exists so a dropped task cannot leave a job PROCESSING forever, and it
//! is a no-op when every collector reported in time.

use std::sync::Arc;
use std::time::Duration;

use homerisk_model::{CollectorEntry, JobId};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::registry::CollectorKind;
use crate::store::{JobStore, ReportPatch};

pub fn spawn_watchdog(
    store: Arc<dyn JobStore>,
    job_id: JobId,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        let report = match store.get(&job_id).await {
            Ok(Some(report)) => report,
            Ok(None) => return,
            Err(err) => {
                error!(%job_id, %err, "watchdog could not load report");
                return;
            }
        };
        if report.status.is_terminal() {
            return;
        }

        for (name, entry) in &report.collector_results {
            if entry.is_terminal() {
                continue;
            }
            let Some(kind) = CollectorKind::from_name(name) else {
                continue;
            };
            warn!(%job_id, collector = name, "collector timed out, forcing terminal entry");
            let patch = ReportPatch::CollectorResult {
                collector: kind,
                entry: CollectorEntry::completed_with_error("collector timed out"),
            };
            if let Err(err) = store.merge(&job_id, patch).await {
                error!(%job_id, collector = name, %err, "failed to force-complete collector");
            }
        }
    })
}
