//! Core data model definitions shared across homerisk crates.
//!
//! Everything here serializes to the wire format returned verbatim by the
//! report read endpoint, so field names are part of the public contract.

pub mod analysis;
pub mod error;
pub mod ids;
pub mod report;

pub use analysis::{EvidenceSource, RiskAnalysis, RiskCategory};
pub use error::{ModelError, Result as ModelResult};
pub use ids::JobId;
pub use report::{
    CollectorEntry, CollectorStatus, GeoPoint, LocationData, ReportStatus,
    RequestMetadata, RequestSource, RiskReport,
};
