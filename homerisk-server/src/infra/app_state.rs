use std::fmt;
use std::sync::Arc;

use homerisk_core::Orchestrator;
use homerisk_core::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn JobStore>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn JobStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }
}
