//! Broker seam: topic-based task delivery between the orchestrator and the
//! collectors. At-least-once, no ordering guarantee within or across topics;
//! every consumer must be idempotent.

pub mod memory;

use async_trait::async_trait;
use homerisk_model::JobId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use memory::MemoryBroker;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("no consumer subscribed to topic `{0}`")]
    NoConsumers(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// One collector task: everything a collector needs to do its lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorTask {
    pub job_id: JobId,
    pub address: String,
    pub neighborhood: String,
}

/// Envelope attached to every published task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub version: u16,
    pub correlation_id: Uuid,
    pub task: CollectorTask,
}

impl TaskEnvelope {
    pub fn new(task: CollectorTask) -> Self {
        Self {
            version: 1,
            correlation_id: Uuid::now_v7(),
            task,
        }
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, envelope: TaskEnvelope) -> Result<(), BrokerError>;

    /// Register a consumer for a topic. Each published envelope is delivered
    /// to every consumer registered at publish time.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<TaskEnvelope>, BrokerError>;
}
