//! Collectors: one per risk dimension in the fixed registry.
//!
//! A collector consumes one task message, runs its (swappable) lookup, and
//! merges exactly one terminal entry for its own key. Internal failure is
//! absorbed as completed-with-error so the job can always finish; it is
//! never allowed to leave the entry pending. The runner is idempotent under
//! redelivery because the store keeps the first terminal write.

pub mod connectivity;
pub mod security;
pub mod utilities;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::broker::{Broker, CollectorTask};
use crate::capabilities::{CapabilityError, Evidence, SearchProvider};
use crate::registry::CollectorKind;
use crate::store::{JobStore, ReportPatch};
use homerisk_model::CollectorEntry;

pub use connectivity::ConnectivityCollector;
pub use security::SecurityCollector;
pub use utilities::UtilitiesCollector;

#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> CollectorKind;

    /// Gather evidence for this collector's dimension. The payload shape is
    /// collector-owned; the aggregator only relies on the `evidence` array.
    async fn collect(&self, task: &CollectorTask) -> Result<serde_json::Value, CapabilityError>;
}

/// Build the default registry of collectors over one search capability.
pub fn default_collectors(search: Arc<dyn SearchProvider>) -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(UtilitiesCollector::new(Arc::clone(&search))),
        Arc::new(SecurityCollector::new(Arc::clone(&search))),
        Arc::new(ConnectivityCollector::new(search)),
    ]
}

/// Subscribe a collector to its topic and run it until the broker side
/// closes. Every consumed task ends in a terminal merge for this collector's
/// key, success or failure.
pub async fn spawn_runner(
    broker: Arc<dyn Broker>,
    store: Arc<dyn JobStore>,
    collector: Arc<dyn Collector>,
) -> Result<JoinHandle<()>, crate::broker::BrokerError> {
    let kind = collector.kind();
    let mut tasks = broker.subscribe(kind.topic()).await?;

    Ok(tokio::spawn(async move {
        while let Some(envelope) = tasks.recv().await {
            let task = envelope.task;
            info!(
                job_id = %task.job_id,
                collector = %kind,
                correlation_id = %envelope.correlation_id,
                "collector task received"
            );

            let entry = match collector.collect(&task).await {
                Ok(payload) => CollectorEntry::completed(payload),
                Err(err) => {
                    // Absorbed locally: a failed lookup degrades this
                    // dimension, it does not fail the job.
                    warn!(job_id = %task.job_id, collector = %kind, %err, "collector failed");
                    CollectorEntry::completed_with_error(err.to_string())
                }
            };

            let patch = ReportPatch::CollectorResult { collector: kind, entry };
            if let Err(err) = store.merge(&task.job_id, patch).await {
                error!(job_id = %task.job_id, collector = %kind, %err, "collector merge failed");
            }
        }
    }))
}

/// Run a query set through the search capability and assemble the common
/// payload shape.
pub(crate) async fn gather_evidence(
    search: &dyn SearchProvider,
    queries: Vec<String>,
) -> Result<serde_json::Value, CapabilityError> {
    let mut evidence: Vec<Evidence> = Vec::new();
    let mut failed_queries = 0usize;
    for query in &queries {
        match search.search(query).await {
            Ok(mut hits) => evidence.append(&mut hits),
            Err(err) => {
                // One dead query is reduced coverage, not a collector failure.
                warn!(query, %err, "search query failed");
                failed_queries += 1;
            }
        }
    }
    if failed_queries == queries.len() && !queries.is_empty() {
        return Err(CapabilityError::UnexpectedResponse(
            "every search query failed".into(),
        ));
    }
    Ok(json!({
        "queries_run": queries.len() - failed_queries,
        "evidence": evidence,
    }))
}

/// Location context string used in queries: prefer the neighborhood for
/// broader coverage when available.
pub(crate) fn query_context(task: &CollectorTask) -> String {
    if task.neighborhood.is_empty() {
        task.address.clone()
    } else {
        format!("{}, {}", task.neighborhood, task.address)
    }
}
