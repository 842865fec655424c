use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use steps_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use steps_core::domain::request::RequestId;

use super::request::parse_timestamp;
use super::{AuditLogRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlAuditLogRepository {
    pool: DbPool,
}

impl SqlAuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for SqlAuditLogRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json =
            serde_json::to_string(&event.metadata).map_err(RepositoryError::decode)?;

        sqlx::query(
            "INSERT INTO audit_event (id, request_id, correlation_id, event_type, category,
                                      actor, outcome, metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.request_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(event.outcome.as_str())
        .bind(metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_request(&self, id: &RequestId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM audit_event WHERE request_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

/// Persists audit events without blocking the caller. Each event is written
/// on a spawned task; write failures are logged and dropped.
#[derive(Clone)]
pub struct SqlAuditSink {
    repository: Arc<dyn AuditLogRepository>,
}

impl SqlAuditSink {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }
}

impl AuditSink for SqlAuditSink {
    fn emit(&self, event: AuditEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                event_name = "audit.persist_skipped",
                audit_event = %event.event_type,
                "no async runtime available to persist audit event"
            );
            return;
        };

        let repository = Arc::clone(&self.repository);
        runtime.spawn(async move {
            if let Err(error) = repository.append(&event).await {
                tracing::warn!(
                    event_name = "audit.persist_failed",
                    audit_event = %event.event_type,
                    correlation_id = %event.correlation_id,
                    error = %error,
                    "failed to persist audit event"
                );
            }
        });
    }
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let request_id: Option<String> = row.try_get("request_id").map_err(RepositoryError::decode)?;
    let category: String = row.try_get("category").map_err(RepositoryError::decode)?;
    let outcome: String = row.try_get("outcome").map_err(RepositoryError::decode)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(RepositoryError::decode)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(RepositoryError::decode)?;

    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).map_err(RepositoryError::decode)?;

    Ok(AuditEvent {
        event_id: row.try_get("id").map_err(RepositoryError::decode)?,
        request_id: request_id.map(RequestId),
        correlation_id: row.try_get("correlation_id").map_err(RepositoryError::decode)?,
        event_type: row.try_get("event_type").map_err(RepositoryError::decode)?,
        category: parse_category(&category)?,
        actor: row.try_get("actor").map_err(RepositoryError::decode)?,
        outcome: parse_outcome(&outcome)?,
        metadata,
        occurred_at: parse_timestamp(&occurred_at)?,
    })
}

fn parse_category(value: &str) -> Result<AuditCategory, RepositoryError> {
    match value {
        "ingress" => Ok(AuditCategory::Ingress),
        "workflow" => Ok(AuditCategory::Workflow),
        "composer" => Ok(AuditCategory::Composer),
        "persistence" => Ok(AuditCategory::Persistence),
        "system" => Ok(AuditCategory::System),
        other => Err(RepositoryError::Decode(format!("unknown audit category `{other}`"))),
    }
}

fn parse_outcome(value: &str) -> Result<AuditOutcome, RepositoryError> {
    match value {
        "success" => Ok(AuditOutcome::Success),
        "rejected" => Ok(AuditOutcome::Rejected),
        "failed" => Ok(AuditOutcome::Failed),
        other => Err(RepositoryError::Decode(format!("unknown audit outcome `{other}`"))),
    }
}
