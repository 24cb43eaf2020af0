use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::RiskAnalysis;
use crate::ids::JobId;

/// Lifecycle state of a report. Monotonic; `COMPLETED` and `FAILED` are
/// terminal and accept no further status writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }

    /// Whether moving to `next` respects the state machine.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        match (self, next) {
            (ReportStatus::Pending, ReportStatus::Processing) => true,
            (ReportStatus::Pending, ReportStatus::Failed) => true,
            (ReportStatus::Processing, ReportStatus::Completed) => true,
            (ReportStatus::Processing, ReportStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Processing => "PROCESSING",
            ReportStatus::Completed => "COMPLETED",
            ReportStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Sub-status of a single collector's entry. `Completed` is terminal whether
/// the collector succeeded (payload) or failed (error); a collector never
/// leaves its entry `Pending` on its own failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorStatus {
    Pending,
    Completed,
}

/// One collector's slot in `collector_results`, written only by its owning
/// collector (or the timeout supervisor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorEntry {
    pub status: CollectorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectorEntry {
    pub fn pending() -> Self {
        Self {
            status: CollectorStatus::Pending,
            payload: None,
            error: None,
        }
    }

    pub fn completed(payload: serde_json::Value) -> Self {
        Self {
            status: CollectorStatus::Completed,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn completed_with_error(error: impl Into<String>) -> Self {
        Self {
            status: CollectorStatus::Completed,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == CollectorStatus::Completed
    }
}

/// Submission channel the request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestSource {
    #[serde(rename = "B2B_API")]
    B2bApi,
    #[serde(rename = "WEB_B2C")]
    WebB2c,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub source: RequestSource,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub address_input: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
}

/// One risk-analysis job record, persisted and returned verbatim by the read
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub report_id: JobId,
    pub status: ReportStatus,
    pub request_metadata: RequestMetadata,
    pub location_data: LocationData,
    pub collector_results: BTreeMap<String, CollectorEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_analysis: Option<RiskAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskReport {
    /// Age of the record relative to `now`, in whole days.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether every collector entry has reached a terminal sub-status.
    pub fn all_collectors_terminal(&self) -> bool {
        self.collector_results.values().all(CollectorEntry::is_terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_state_machine() {
        use ReportStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn collector_entry_terminal_covers_error_results() {
        assert!(!CollectorEntry::pending().is_terminal());
        assert!(CollectorEntry::completed(serde_json::json!({"ok": true})).is_terminal());
        assert!(CollectorEntry::completed_with_error("timeout").is_terminal());
    }

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&ReportStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }
}
