//! Postgres-backed job store.
//!
//! Reports are stored as one jsonb document per row; merges load the row
//! under a row lock, apply the shared [`apply_patch`] semantics, and write
//! the document back, so the monotonicity rules are identical to the
//! in-memory backend. The finalize claim is a dedicated column flipped by a
//! single conditional UPDATE.
//!
//! Change events are process-local: the aggregator runs in the same process
//! as the store handle that performed the mutation.

use async_trait::async_trait;
use chrono::Utc;
use homerisk_model::{JobId, RiskReport};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tokio::sync::broadcast;

use super::{CreateOutcome, JobStore, ReportPatch, StoreError, apply_patch};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct PostgresJobStore {
    pool: PgPool,
    changes: broadcast::Sender<JobId>,
}

impl std::fmt::Debug for PostgresJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresJobStore").finish_non_exhaustive()
    }
}

impl PostgresJobStore {
    /// Connect and run pending migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(8).connect(url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { pool, changes })
    }

    fn notify(&self, id: &JobId) {
        let _ = self.changes.send(id.clone());
    }

    fn decode(doc: serde_json::Value) -> Result<RiskReport, StoreError> {
        Ok(serde_json::from_value(doc)?)
    }

    fn encode(report: &RiskReport) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(report)?)
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn get(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError> {
        let row = sqlx::query("SELECT doc FROM reports WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Self::decode(row.try_get("doc")?)?)),
            None => Ok(None),
        }
    }

    async fn create_if_absent(&self, report: RiskReport) -> Result<CreateOutcome, StoreError> {
        let doc = Self::encode(&report)?;
        let inserted = sqlx::query(
            "INSERT INTO reports (id, doc) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(report.report_id.as_str())
        .bind(&doc)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            let existing = self
                .get(&report.report_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(report.report_id.clone()))?;
            return Ok(CreateOutcome::Existing(existing));
        }
        self.notify(&report.report_id);
        Ok(CreateOutcome::Created(report))
    }

    async fn replace(&self, report: RiskReport) -> Result<(), StoreError> {
        let doc = Self::encode(&report)?;
        sqlx::query(
            "INSERT INTO reports (id, doc) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, finalize_claimed = FALSE",
        )
        .bind(report.report_id.as_str())
        .bind(&doc)
        .execute(&self.pool)
        .await?;
        self.notify(&report.report_id);
        Ok(())
    }

    async fn merge(&self, id: &JobId, patch: ReportPatch) -> Result<RiskReport, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT doc FROM reports WHERE id = $1 FOR UPDATE")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut report = Self::decode(row.try_get("doc")?)?;

        let changed = apply_patch(&mut report, &patch, Utc::now())?;
        if changed {
            sqlx::query("UPDATE reports SET doc = $2 WHERE id = $1")
                .bind(id.as_str())
                .bind(Self::encode(&report)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if changed {
            self.notify(id);
        }
        Ok(report)
    }

    async fn claim_finalize(&self, id: &JobId) -> Result<Option<RiskReport>, StoreError> {
        let row = sqlx::query(
            "UPDATE reports SET finalize_claimed = TRUE \
             WHERE id = $1 AND finalize_claimed = FALSE AND doc->>'status' = 'PROCESSING' \
             RETURNING doc",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(Self::decode(row.try_get("doc")?)?)),
            None => Ok(None),
        }
    }

    fn changes(&self) -> broadcast::Receiver<JobId> {
        self.changes.subscribe()
    }
}
