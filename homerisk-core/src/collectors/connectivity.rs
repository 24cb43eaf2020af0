//! Connectivity collector: ISP availability and service quality.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Collector, gather_evidence, query_context};
use crate::broker::CollectorTask;
use crate::capabilities::{CapabilityError, SearchProvider};
use crate::registry::CollectorKind;

pub struct ConnectivityCollector {
    search: Arc<dyn SearchProvider>,
}

impl ConnectivityCollector {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

impl std::fmt::Debug for ConnectivityCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityCollector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Collector for ConnectivityCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Connectivity
    }

    async fn collect(&self, task: &CollectorTask) -> Result<serde_json::Value, CapabilityError> {
        let context = query_context(task);
        let queries = vec![
            format!("Factibilidad fibra optica internet {context}"),
            format!("Cobertura internet proveedores {context} reclamos"),
        ];
        gather_evidence(self.search.as_ref(), queries).await
    }
}
