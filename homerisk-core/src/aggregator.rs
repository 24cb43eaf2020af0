//! Fan-in: completion detection and exactly-once finalization.
//!
//! The aggregator reacts to every report mutation. Readiness is always
//! re-derived from the current full collector map, never from an assumed
//! arrival sequence, so any permutation of collector completions converges
//! to the same finalized record. The finalize claim in the store is what
//! makes re-entrant triggers safe: only one trigger per pipeline run gets to
//! invoke the summarizer.

use std::collections::BTreeMap;
use std::sync::Arc;

use homerisk_model::{JobId, ReportStatus, RiskAnalysis, RiskCategory, RiskReport};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capabilities::{Notifier, Summarizer, parse_analysis};
use crate::error::Result;
use crate::registry::CollectorKind;
use crate::store::{JobStore, ReportPatch};

pub struct Aggregator {
    store: Arc<dyn JobStore>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn JobStore>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            summarizer,
            notifier,
        }
    }

    /// Subscribe to report-change events and evaluate each touched job.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.store.changes();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(job_id) => {
                        if let Err(err) = self.evaluate(&job_id).await {
                            error!(%job_id, %err, "aggregation failed");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Lagging loses triggers, not correctness: the next
                        // event for a job re-derives readiness from scratch.
                        warn!(missed, "aggregator lagged behind change events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Evaluate one job: no-op unless every registry collector is terminal
    /// and this call wins the finalize claim.
    pub async fn evaluate(&self, job_id: &JobId) -> Result<()> {
        let Some(report) = self.store.get(job_id).await? else {
            return Ok(());
        };
        if report.status.is_terminal() {
            return Ok(());
        }
        if !ready_to_finalize(&report) {
            debug!(%job_id, "waiting for collectors");
            return Ok(());
        }
        let Some(report) = self.store.claim_finalize(job_id).await? else {
            // Another trigger already claimed finalization.
            return Ok(());
        };

        info!(%job_id, "all collectors terminal, finalizing");
        let finalized = self.finalize(&report).await?;

        if finalized.status == ReportStatus::Completed {
            self.notify(&finalized).await;
        }
        Ok(())
    }

    async fn finalize(&self, report: &RiskReport) -> Result<RiskReport> {
        let evidence = evidence_by_collector(report);
        if evidence.is_empty() {
            // Nothing usable from any collector: finalize with the no-data
            // analysis instead of asking the summarizer to invent one.
            info!(job_id = %report.report_id, "no evidence collected, using fallback analysis");
            return Ok(self
                .store
                .merge(&report.report_id, ReportPatch::Finalize(no_data_analysis()))
                .await?);
        }

        let prompt = build_prompt(report, &evidence);
        let raw = match self.summarizer.generate(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(job_id = %report.report_id, %err, "summarizer call failed");
                return Ok(self
                    .store
                    .merge(
                        &report.report_id,
                        ReportPatch::Fail(format!("summarizer failed: {err}")),
                    )
                    .await?);
            }
        };

        match parse_analysis(&raw, &CollectorKind::required_categories()) {
            Ok(analysis) => Ok(self
                .store
                .merge(&report.report_id, ReportPatch::Finalize(analysis))
                .await?),
            Err(err) => {
                // A missing analysis is preferred over a corrupt one.
                error!(job_id = %report.report_id, %err, "summarizer output rejected");
                Ok(self
                    .store
                    .merge(
                        &report.report_id,
                        ReportPatch::Fail(format!("summarizer output unusable: {err}")),
                    )
                    .await?)
            }
        }
    }

    /// Best-effort completion notification. Failures are logged and never
    /// touch job status; the report stays retrievable via the read endpoint.
    async fn notify(&self, report: &RiskReport) {
        let Some(email) = &report.request_metadata.email else {
            return;
        };
        let Some(analysis) = &report.risk_analysis else {
            return;
        };
        let subject = format!(
            "Informe de riesgo listo: {}",
            report.location_data.address_input
        );
        let body = notification_body(report, analysis);
        if let Err(err) = self.notifier.send(email, &subject, &body).await {
            warn!(job_id = %report.report_id, %err, "notification delivery failed");
        }
    }
}

/// Order-independent readiness check over the full registry: every name in
/// the fixed registry must have a terminal entry.
fn ready_to_finalize(report: &RiskReport) -> bool {
    CollectorKind::ALL.iter().all(|kind| {
        report
            .collector_results
            .get(kind.as_str())
            .is_some_and(|entry| entry.is_terminal())
    })
}

/// Successful collector payloads that actually carry evidence.
fn evidence_by_collector(report: &RiskReport) -> BTreeMap<&'static str, serde_json::Value> {
    CollectorKind::ALL
        .iter()
        .filter_map(|kind| {
            let payload = report.collector_results.get(kind.as_str())?.payload.as_ref()?;
            let has_evidence = payload
                .get("evidence")
                .and_then(|e| e.as_array())
                .is_some_and(|hits| !hits.is_empty());
            has_evidence.then(|| (kind.as_str(), payload.clone()))
        })
        .collect()
}

fn build_prompt(report: &RiskReport, evidence: &BTreeMap<&'static str, serde_json::Value>) -> String {
    let mut sections = String::new();
    for (index, (name, payload)) in evidence.iter().enumerate() {
        sections.push_str(&format!("{}. {name}: {payload}\n", index + 1));
    }
    let categories: Vec<String> = CollectorKind::required_categories()
        .iter()
        .map(|name| format!("\"{name}\": {{ \"score\": number, \"label\": string, \"details\": string }}"))
        .collect();

    format!(
        "Act as a risk assessment expert for residential locations in Chile.\n\
         Analyze the following evidence collected online for the address \"{address}\":\n\n\
         {sections}\n\
         Task:\n\
         1. Evaluate the risk level for each category below.\n\
         2. Assign each category a risk score from 0 (safe) to 10 (high risk).\n\
         3. Calculate an overall risk score in the same range.\n\
         4. Write the summary and details in Spanish.\n\n\
         Output a JSON object ONLY, with this exact structure:\n\
         {{\n  \"overall_score\": number,\n  \"summary\": string,\n  \"categories\": {{ {categories} }}\n}}",
        address = report.location_data.address_input,
        sections = sections,
        categories = categories.join(", "),
    )
}

/// Zero-score analysis used when no collector found anything usable.
fn no_data_analysis() -> RiskAnalysis {
    let categories = CollectorKind::required_categories()
        .into_iter()
        .map(|name| {
            (
                name.to_string(),
                RiskCategory {
                    score: 0.0,
                    label: "Sin datos".into(),
                    details: "Sin información reciente en fuentes públicas.".into(),
                },
            )
        })
        .collect();
    RiskAnalysis {
        overall_score: 0.0,
        summary: "No se encontraron datos de riesgo específicos en fuentes públicas recientes."
            .into(),
        categories,
        evidence_sources: None,
    }
}

fn notification_body(report: &RiskReport, analysis: &RiskAnalysis) -> String {
    format!(
        "<html><body><h2>Informe de riesgo</h2>\
         <p><strong>Dirección:</strong> {}</p>\
         <p><strong>Puntaje general:</strong> {:.1} / 10</p>\
         <p>{}</p></body></html>",
        report.location_data.address_input, analysis.overall_score, analysis.summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MockNotifier, MockSummarizer};
    use crate::identity::compute_identity;
    use crate::store::{CreateOutcome, MemoryJobStore};
    use chrono::Utc;
    use homerisk_model::{
        CollectorEntry, GeoPoint, LocationData, RequestMetadata, RequestSource,
    };
    use serde_json::json;

    fn pending_report(address: &str, email: Option<&str>) -> RiskReport {
        let now = Utc::now();
        RiskReport {
            report_id: compute_identity(address),
            status: ReportStatus::Pending,
            request_metadata: RequestMetadata {
                source: RequestSource::WebB2c,
                timestamp: now,
                email: email.map(str::to_string),
                name: None,
                phone: None,
            },
            location_data: LocationData {
                address_input: address.into(),
                neighborhood: String::new(),
                geo: Some(GeoPoint { lat: -33.43, lng: -70.62 }),
            },
            collector_results: CollectorKind::ALL
                .iter()
                .map(|kind| (kind.as_str().to_string(), CollectorEntry::pending()))
                .collect(),
            risk_analysis: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn evidence_payload() -> serde_json::Value {
        json!({
            "queries_run": 2,
            "evidence": [{"title": "t", "snippet": "s", "link": "l"}],
        })
    }

    fn valid_summary() -> String {
        json!({
            "overall_score": 6.0,
            "summary": "Riesgo medio-alto.",
            "categories": {
                "utilities": {"score": 5.0, "label": "Medio", "details": ""},
                "security": {"score": 8.0, "label": "Alto", "details": ""},
                "connectivity": {"score": 2.0, "label": "Bajo", "details": ""}
            }
        })
        .to_string()
    }

    async fn seed_processing(
        store: &MemoryJobStore,
        report: RiskReport,
        terminal: &[CollectorKind],
    ) -> JobId {
        let id = report.report_id.clone();
        match store.create_if_absent(report).await.unwrap() {
            CreateOutcome::Created(_) => {}
            CreateOutcome::Existing(_) => panic!("report already present"),
        }
        store
            .merge(&id, ReportPatch::Status(ReportStatus::Processing))
            .await
            .unwrap();
        for kind in terminal {
            store
                .merge(
                    &id,
                    ReportPatch::CollectorResult {
                        collector: *kind,
                        entry: CollectorEntry::completed(evidence_payload()),
                    },
                )
                .await
                .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn does_not_finalize_until_all_collectors_terminal() {
        let store = Arc::new(MemoryJobStore::new());
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_generate().never();
        let aggregator = Aggregator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(summarizer),
            Arc::new(MockNotifier::new()),
        );

        let id = seed_processing(
            &store,
            pending_report("Av. Incompleta 1", None),
            &[CollectorKind::Utilities, CollectorKind::Security],
        )
        .await;
        aggregator.evaluate(&id).await.unwrap();

        let report = store.get(&id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Processing);
    }

    #[tokio::test]
    async fn finalizes_exactly_once_under_repeated_triggers() {
        let store = Arc::new(MemoryJobStore::new());
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate()
            .times(1)
            .returning(|_| Ok(valid_summary()));
        let aggregator = Aggregator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(summarizer),
            Arc::new(MockNotifier::new()),
        );

        let id = seed_processing(
            &store,
            pending_report("Av. Completa 1", None),
            &CollectorKind::ALL,
        )
        .await;

        aggregator.evaluate(&id).await.unwrap();
        let first = store.get(&id).await.unwrap().unwrap();
        assert_eq!(first.status, ReportStatus::Completed);

        // Re-fire the trigger repeatedly; record must not move.
        for _ in 0..5 {
            aggregator.evaluate(&id).await.unwrap();
        }
        let second = store.get(&id).await.unwrap().unwrap();
        assert_eq!(second.updated_at, first.updated_at);
        assert_eq!(second.risk_analysis, first.risk_analysis);
    }

    #[tokio::test]
    async fn malformed_summarizer_output_fails_job_without_partial_analysis() {
        let store = Arc::new(MemoryJobStore::new());
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate()
            .times(1)
            .returning(|_| Ok("sorry, I can't produce JSON today".to_string()));
        let aggregator = Aggregator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(summarizer),
            Arc::new(MockNotifier::new()),
        );

        let id = seed_processing(
            &store,
            pending_report("Av. Malformada 1", None),
            &CollectorKind::ALL,
        )
        .await;
        aggregator.evaluate(&id).await.unwrap();

        let report = store.get(&id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.risk_analysis.is_none());
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn no_evidence_takes_fallback_path_without_summarizer() {
        let store = Arc::new(MemoryJobStore::new());
        let mut summarizer = MockSummarizer::new();
        summarizer.expect_generate().never();
        let aggregator = Aggregator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(summarizer),
            Arc::new(MockNotifier::new()),
        );

        let report = pending_report("Av. Sin Datos 1", None);
        let id = report.report_id.clone();
        store.create_if_absent(report).await.unwrap();
        store
            .merge(&id, ReportPatch::Status(ReportStatus::Processing))
            .await
            .unwrap();
        for kind in CollectorKind::ALL {
            store
                .merge(
                    &id,
                    ReportPatch::CollectorResult {
                        collector: kind,
                        entry: CollectorEntry::completed_with_error("timeout"),
                    },
                )
                .await
                .unwrap();
        }

        aggregator.evaluate(&id).await.unwrap();
        let report = store.get(&id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        let analysis = report.risk_analysis.unwrap();
        assert_eq!(analysis.overall_score, 0.0);
        assert!(
            analysis
                .validate(&CollectorKind::required_categories())
                .is_ok()
        );
    }

    #[tokio::test]
    async fn notification_failure_does_not_affect_status() {
        let store = Arc::new(MemoryJobStore::new());
        let mut summarizer = MockSummarizer::new();
        summarizer
            .expect_generate()
            .returning(|_| Ok(valid_summary()));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_, _, _| {
            Err(crate::capabilities::CapabilityError::UnexpectedResponse(
                "mail API down".into(),
            ))
        });
        let aggregator = Aggregator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(summarizer),
            Arc::new(notifier),
        );

        let id = seed_processing(
            &store,
            pending_report("Av. Correo 1", Some("user@example.com")),
            &CollectorKind::ALL,
        )
        .await;
        aggregator.evaluate(&id).await.unwrap();

        let report = store.get(&id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
    }
}
