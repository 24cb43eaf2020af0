//! In-process topic bus over unbounded channels.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use super::{Broker, BrokerError, TaskEnvelope};

pub struct MemoryBroker {
    topics: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<TaskEnvelope>>>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker").finish_non_exhaustive()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, envelope: TaskEnvelope) -> Result<(), BrokerError> {
        let mut topics = self.topics.write().await;
        let Some(senders) = topics.get_mut(topic) else {
            return Err(BrokerError::NoConsumers(topic.to_string()));
        };
        // Drop consumers whose receivers are gone.
        senders.retain(|sender| sender.send(envelope.clone()).is_ok());
        if senders.is_empty() {
            return Err(BrokerError::NoConsumers(topic.to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<TaskEnvelope>, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::CollectorTask;
    use homerisk_model::JobId;

    fn envelope() -> TaskEnvelope {
        TaskEnvelope::new(CollectorTask {
            job_id: JobId::parse("0123456789abcdef0123456789abcdef").unwrap(),
            address: "Av. Test 1".into(),
            neighborhood: String::new(),
        })
    }

    #[tokio::test]
    async fn publish_without_consumers_fails() {
        let broker = MemoryBroker::new();
        assert!(matches!(
            broker.publish("scan-security", envelope()).await,
            Err(BrokerError::NoConsumers(_))
        ));
    }

    #[tokio::test]
    async fn delivers_to_every_consumer() {
        let broker = MemoryBroker::new();
        let mut a = broker.subscribe("scan-security").await.unwrap();
        let mut b = broker.subscribe("scan-security").await.unwrap();
        broker.publish("scan-security", envelope()).await.unwrap();
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dropped_consumers_are_pruned() {
        let broker = MemoryBroker::new();
        let rx = broker.subscribe("scan-security").await.unwrap();
        drop(rx);
        assert!(broker.publish("scan-security", envelope()).await.is_err());
    }
}
