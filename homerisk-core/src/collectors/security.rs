//! Security collector: crime and incident history around the location.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Collector, gather_evidence, query_context};
use crate::broker::CollectorTask;
use crate::capabilities::{CapabilityError, SearchProvider};
use crate::registry::CollectorKind;

pub struct SecurityCollector {
    search: Arc<dyn SearchProvider>,
}

impl SecurityCollector {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

impl std::fmt::Debug for SecurityCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityCollector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Collector for SecurityCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Security
    }

    async fn collect(&self, task: &CollectorTask) -> Result<serde_json::Value, CapabilityError> {
        let context = query_context(task);
        let mut queries = vec![format!("Seguridad robos delincuencia {context} policial")];
        if !task.neighborhood.is_empty() {
            queries.push(format!(
                "Delincuencia en barrio {} seguridad",
                task.neighborhood
            ));
        }
        gather_evidence(self.search.as_ref(), queries).await
    }
}
