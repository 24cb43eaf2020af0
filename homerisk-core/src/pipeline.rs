//! Pipeline assembly: wires the store, broker, collectors, aggregator, and
//! orchestrator into one running unit with an explicit lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::broker::Broker;
use crate::capabilities::{Notifier, SearchProvider, Summarizer};
use crate::collectors;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache_ttl_days: i64,
    pub collector_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: 30,
            collector_timeout: Duration::from_secs(120),
        }
    }
}

/// A running pipeline. Collector runners and the aggregator live as spawned
/// tasks owned by this handle; dropping it does not stop them, call
/// [`Pipeline::shutdown`] for that.
pub struct Pipeline {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn JobStore>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Subscribe every collector, start the aggregator, and return the
    /// orchestrator-facing handle. Collector subscriptions are registered
    /// before this returns, so a submission accepted afterwards can never
    /// publish into a topic without a consumer.
    pub async fn start(
        store: Arc<dyn JobStore>,
        broker: Arc<dyn Broker>,
        search: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let mut workers = Vec::new();

        for collector in collectors::default_collectors(search) {
            let handle = collectors::spawn_runner(
                Arc::clone(&broker),
                Arc::clone(&store),
                Arc::clone(&collector),
            )
            .await?;
            workers.push(handle);
        }

        let aggregator = Arc::new(Aggregator::new(
            Arc::clone(&store),
            summarizer,
            notifier,
        ));
        workers.push(aggregator.spawn());

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            broker,
            config.cache_ttl_days,
            config.collector_timeout,
        ));

        info!(workers = workers.len(), "pipeline started");
        Ok(Self {
            orchestrator,
            store,
            workers,
        })
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Abort all spawned workers.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
