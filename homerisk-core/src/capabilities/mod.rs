//! Swappable external capabilities.
//!
//! The pipeline only ever talks to these traits; the HTTP implementations in
//! the submodules are the production wiring, and tests inject fakes or
//! mockall mocks.

pub mod notifier;
pub mod search;
pub mod summarizer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use notifier::{HttpNotifier, NoopNotifier};
pub use search::{SerpSearch, StubSearch};
pub use summarizer::{ChatSummarizer, parse_analysis};

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("unusable output: {0}")]
    UnusableOutput(String),
}

/// One piece of web evidence returned by the search capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    pub snippet: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Evidence>, CapabilityError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate text for a prompt. The caller defensively parses the output;
    /// this capability makes no schema promise.
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort delivery; callers log failures and never let them affect
    /// job status.
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), CapabilityError>;
}
