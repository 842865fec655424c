use std::sync::Arc;

use steps_core::audit::{AuditSink, CompositeAuditSink, TracingAuditSink};
use steps_core::config::{AppConfig, ConfigError, LoadOptions};
use steps_core::{FileDraftStore, Workflow};
use steps_db::{
    connect_with_settings, migrations, AuditLogRepository, DbPool, SqlAuditLogRepository,
    SqlAuditSink, SqlDocumentStore, SqlRequestStore,
};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::auth::AuthGate;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
    pub gate: AuthGate,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let requests = Arc::new(SqlRequestStore::new(db_pool.clone()));
    let audit_log: Arc<dyn AuditLogRepository> =
        Arc::new(SqlAuditLogRepository::new(db_pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(CompositeAuditSink::new(vec![
        Arc::new(TracingAuditSink),
        Arc::new(SqlAuditSink::new(audit_log)),
    ]));
    let drafts = Arc::new(FileDraftStore::new(config.drafts.directory.clone()));

    let state = ApiState {
        workflow: Workflow::new(requests.clone(), drafts, audit.clone()),
        documents: Arc::new(SqlDocumentStore::new(db_pool.clone())),
        purchase_orders: requests,
        audit,
    };
    let gate = AuthGate::new(config.auth.api_token.clone());
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        auth_enabled = gate.is_enabled(),
        drafts_directory = %config.drafts.directory.display(),
        "application state assembled"
    );

    Ok(Application { config, db_pool, state, gate })
}

#[cfg(test)]
mod tests {
    use steps_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use steps_core::domain::request::{LineItem, NewRequest, RequestStatus, SubmissionKind};
    use steps_core::store::PurchaseOrderStore;
    use steps_core::AuditContext;
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, bootstrap_with_config};

    fn overrides(drafts: &TempDir) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                drafts_directory: Some(drafts.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_a_short_api_token() {
        let drafts = TempDir::new().expect("temp dir");
        let mut options = overrides(&drafts);
        options.overrides.api_token = Some("short".to_string());

        let message = bootstrap(options).await.err().expect("short token should fail").to_string();
        assert!(message.contains("auth.api_token"), "{message}");
    }

    #[tokio::test]
    async fn bootstrapped_workflow_persists_through_sqlite() {
        let drafts = TempDir::new().expect("temp dir");
        let mut config = AppConfig::load(overrides(&drafts)).expect("config");
        config.database.max_connections = 1;
        let app = bootstrap_with_config(config).await.expect("bootstrap");
        assert!(!app.gate.is_enabled());

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('request', 'request_line', 'purchase_order', 'audit_event')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema should be migrated");
        assert_eq!(table_count, 4);

        let context = AuditContext::new(None, "corr-bootstrap", "tester");
        let submitted = app
            .state
            .workflow
            .submit(
                NewRequest {
                    kind: SubmissionKind::MaterialRequest,
                    line_items: vec![LineItem {
                        item_name: "Cement".to_string(),
                        quantity: 10.into(),
                        quantity_type: "bags".to_string(),
                        amount: 4500.into(),
                        description: String::new(),
                    }],
                    requested_by: "Kemi".to_string(),
                    department: "Projects".to_string(),
                    approver: None,
                },
                &context,
            )
            .await
            .expect("submit");

        let receipt = app
            .state
            .workflow
            .approve(submitted.category(), &submitted.id, Some("Dangote Depot"), &context)
            .await
            .expect("approve");
        assert_eq!(receipt.request.status, RequestStatus::Approved);

        let orders = app.state.purchase_orders.list_purchase_orders().await.expect("orders");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].vendor, "Dangote Depot");

        app.db_pool.close().await;
    }
}
