//! Core pipeline for the homerisk analysis service.
//!
//! A submission is resolved to a deterministic job identity, cached or
//! persisted as a `PENDING` report, and fanned out as one task per collector
//! topic. Collectors run independently and merge terminal entries back into
//! the report; the aggregator reacts to every report mutation, detects when
//! all collectors are terminal, and finalizes the job exactly once through
//! the summarizer. All coordination flows through the [`store::JobStore`]
//! atomicity guarantees and the [`broker::Broker`] delivery semantics; no
//! component holds locks across another.

pub mod aggregator;
pub mod broker;
pub mod capabilities;
pub mod collectors;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod supervisor;

pub use error::{CoreError, Result};
pub use orchestrator::{Contact, Orchestrator, SubmitOutcome, SubmitRequest};
pub use pipeline::{Pipeline, PipelineConfig};
pub use registry::CollectorKind;
