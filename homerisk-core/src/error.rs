use thiserror::Error;

use crate::broker::BrokerError;
use crate::capabilities::CapabilityError;
use crate::store::StoreError;

/// Pipeline error taxonomy.
///
/// Per-collector failures never appear here: they are absorbed at the
/// collector boundary as `completed`-with-error entries. Only validation and
/// pipeline-terminal failures propagate to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad input; nothing was persisted and nothing is retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Store or broker unreachable; the job, if created, was marked FAILED
    /// at the point of failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// The summarizer returned unusable output; the job was marked FAILED
    /// and no partial analysis was persisted.
    #[error("summarizer error: {0}")]
    Summarizer(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
