//! Fan-out orchestration: submission intake, identity resolution, cache
//! policy, record creation, and one task published per collector topic.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use homerisk_model::{
    CollectorEntry, GeoPoint, JobId, LocationData, ReportStatus, RequestMetadata, RequestSource,
    RiskReport,
};
use tracing::{error, info, warn};

use crate::broker::{Broker, CollectorTask, TaskEnvelope};
use crate::error::{CoreError, Result};
use crate::identity::compute_identity;
use crate::registry::CollectorKind;
use crate::store::{CreateOutcome, JobStore, ReportPatch};
use crate::supervisor;

#[derive(Debug, Clone)]
pub struct Contact {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub address: String,
    pub geo: Option<GeoPoint>,
    pub neighborhood: Option<String>,
    pub contact: Option<Contact>,
    pub source: Option<RequestSource>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_id: JobId,
    pub status: ReportStatus,
    pub cached: bool,
}

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn Broker>,
    cache_ttl_days: i64,
    collector_timeout: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache_ttl_days", &self.cache_ttl_days)
            .field("collector_timeout", &self.collector_timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        broker: Arc<dyn Broker>,
        cache_ttl_days: i64,
        collector_timeout: Duration,
    ) -> Self {
        Self {
            store,
            broker,
            cache_ttl_days,
            collector_timeout,
        }
    }

    /// Accept a submission and return immediately with `{job_id, status}`;
    /// everything downstream of the fan-out is asynchronous to the caller.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome> {
        let address = request.address.trim().to_string();
        if address.is_empty() {
            return Err(CoreError::Validation("address is required".into()));
        }
        let Some(geo) = request.geo else {
            return Err(CoreError::Validation(
                "geo coordinates { lat, lng } are required".into(),
            ));
        };

        let job_id = compute_identity(&address);

        if let Some(existing) = self.store.get(&job_id).await? {
            let age = existing.age_days(Utc::now());
            if age < self.cache_ttl_days {
                info!(%job_id, age_days = age, "cache hit, returning existing report");
                return Ok(SubmitOutcome {
                    job_id,
                    status: existing.status,
                    cached: true,
                });
            }
            // Destructive in-place refresh: same id, fresh PENDING record,
            // full re-fan-out.
            info!(%job_id, age_days = age, "cache expired, refreshing report");
            let report = build_report(job_id.clone(), &address, geo, &request);
            self.store.replace(report.clone()).await?;
            self.fan_out(&report).await?;
            return Ok(SubmitOutcome {
                job_id,
                status: ReportStatus::Pending,
                cached: false,
            });
        }

        let report = build_report(job_id.clone(), &address, geo, &request);
        match self.store.create_if_absent(report).await? {
            CreateOutcome::Created(report) => {
                self.fan_out(&report).await?;
                Ok(SubmitOutcome {
                    job_id,
                    status: ReportStatus::Pending,
                    cached: false,
                })
            }
            CreateOutcome::Existing(existing) => {
                // Lost a concurrent creation race; serve the winner's record.
                warn!(%job_id, "concurrent submission created this job first");
                Ok(SubmitOutcome {
                    job_id,
                    status: existing.status,
                    cached: true,
                })
            }
        }
    }

    /// Publish one task per registry collector. Fail-closed: if any publish
    /// fails the job is marked FAILED rather than left PROCESSING with
    /// missing tasks.
    async fn fan_out(&self, report: &RiskReport) -> Result<()> {
        let task = CollectorTask {
            job_id: report.report_id.clone(),
            address: report.location_data.address_input.clone(),
            neighborhood: report.location_data.neighborhood.clone(),
        };

        let publishes = CollectorKind::ALL.iter().map(|kind| {
            let envelope = TaskEnvelope::new(task.clone());
            async move { (kind, self.broker.publish(kind.topic(), envelope).await) }
        });

        for (kind, result) in join_all(publishes).await {
            if let Err(err) = result {
                error!(job_id = %report.report_id, collector = %kind, %err, "fan-out publish failed, failing job");
                self.store
                    .merge(
                        &report.report_id,
                        ReportPatch::Fail(format!("fan-out publish failed: {err}")),
                    )
                    .await?;
                return Err(CoreError::Infrastructure(format!(
                    "task publish failed for collector `{kind}`: {err}"
                )));
            }
        }

        self.store
            .merge(&report.report_id, ReportPatch::Status(ReportStatus::Processing))
            .await?;
        supervisor::spawn_watchdog(
            Arc::clone(&self.store),
            report.report_id.clone(),
            self.collector_timeout,
        );
        info!(job_id = %report.report_id, collectors = CollectorKind::ALL.len(), "fan-out complete");
        Ok(())
    }
}

fn build_report(job_id: JobId, address: &str, geo: GeoPoint, request: &SubmitRequest) -> RiskReport {
    let now = Utc::now();
    let contact = request.contact.as_ref();
    RiskReport {
        report_id: job_id,
        status: ReportStatus::Pending,
        request_metadata: RequestMetadata {
            source: request.source.unwrap_or(RequestSource::WebB2c),
            timestamp: now,
            email: contact.and_then(|c| c.email.clone()),
            name: contact.and_then(|c| c.name.clone()),
            phone: contact.and_then(|c| c.phone.clone()),
        },
        location_data: LocationData {
            address_input: address.to_string(),
            neighborhood: request.neighborhood.clone().unwrap_or_default(),
            geo: Some(geo),
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
