//! Basic-services collector: power and water supply stability.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Collector, gather_evidence, query_context};
use crate::broker::CollectorTask;
use crate::capabilities::{CapabilityError, SearchProvider};
use crate::registry::CollectorKind;

pub struct UtilitiesCollector {
    search: Arc<dyn SearchProvider>,
}

impl UtilitiesCollector {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

impl std::fmt::Debug for UtilitiesCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtilitiesCollector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Collector for UtilitiesCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Utilities
    }

    async fn collect(&self, task: &CollectorTask) -> Result<serde_json::Value, CapabilityError> {
        let context = query_context(task);
        let mut queries = vec![
            format!("Cortes de luz {context} problemas electricos"),
            format!("Cortes de agua {context} suministro"),
        ];
        if !task.neighborhood.is_empty() {
            queries.push(format!("Cortes de agua en {}", task.neighborhood));
        }
        gather_evidence(self.search.as_ref(), queries).await
    }
}
