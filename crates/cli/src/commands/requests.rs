use std::sync::Arc;

use clap::Subcommand;
use steps_core::audit::{AuditContext, InMemoryAuditSink};
use steps_core::domain::request::{Request, RequestCategory, RequestId, RequestStatus};
use steps_core::errors::{ApplicationError, ErrorKind};
use steps_core::store::RequestFilter;
use steps_core::{FileDraftStore, Workflow};
use steps_db::{AuditLogRepository, DbPool, SqlAuditLogRepository, SqlRequestStore};
use uuid::Uuid;

use crate::commands::{migrated_pool, prepare, CommandFailure, CommandResult};

#[derive(Debug, Clone, Subcommand)]
pub enum RequestsCommand {
    #[command(about = "List requests of one category, optionally filtered by status")]
    List {
        #[arg(long, help = "material-request | advance | retirement | leave")]
        category: String,
        #[arg(long, help = "pending | approved | rejected")]
        status: Option<String>,
    },
    #[command(about = "Approve a pending request; material requests need --vendor")]
    Approve {
        #[arg(long)]
        category: String,
        id: String,
        #[arg(long)]
        vendor: Option<String>,
    },
    #[command(about = "Reject a pending request with a reason")]
    Reject {
        #[arg(long)]
        category: String,
        id: String,
        #[arg(long)]
        reason: String,
    },
    #[command(about = "Show the persisted audit trail of one request")]
    History { id: String },
}

impl RequestsCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "requests.list",
            Self::Approve { .. } => "requests.approve",
            Self::Reject { .. } => "requests.reject",
            Self::History { .. } => "requests.history",
        }
    }
}

pub fn run(command: RequestsCommand) -> CommandResult {
    let name = command.name();
    let (config, runtime) = match prepare(name) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let audit = InMemoryAuditSink::default();
        let workflow = Workflow::new(
            Arc::new(SqlRequestStore::new(pool.clone())),
            Arc::new(FileDraftStore::new(config.drafts.directory.clone())),
            Arc::new(audit.clone()),
        );

        let outcome = execute(&workflow, &pool, command).await;
        let persisted = persist_audit(&pool, &audit).await;
        pool.close().await;
        outcome.and_then(|message| persisted.map(|()| message))
    });

    match result {
        Ok(message) => CommandResult::success(name, message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(name, error_class, message, exit_code)
        }
    }
}

async fn execute(
    workflow: &Workflow,
    pool: &DbPool,
    command: RequestsCommand,
) -> Result<String, CommandFailure> {
    let context = AuditContext::new(None, format!("cli-{}", Uuid::new_v4()), "cli");

    match command {
        RequestsCommand::List { category, status } => {
            let category = parse_category(&category)?;
            let status = status.as_deref().map(parse_status).transpose()?;
            let requests = workflow
                .list(&RequestFilter::category(category).with_status(status))
                .await
                .map_err(workflow_failure)?;
            Ok(render_requests(category, &requests))
        }
        RequestsCommand::Approve { category, id, vendor } => {
            let receipt = workflow
                .approve(parse_category(&category)?, &RequestId(id), vendor.as_deref(), &context)
                .await
                .map_err(workflow_failure)?;
            Ok(match receipt.purchase_order {
                Some(order) => format!(
                    "approved {} and raised purchase order {} for {}",
                    receipt.request.id.0, order.id.0, order.vendor
                ),
                None => format!("approved {}", receipt.request.id.0),
            })
        }
        RequestsCommand::Reject { category, id, reason } => {
            let request = workflow
                .reject(parse_category(&category)?, &RequestId(id), &reason, &context)
                .await
                .map_err(workflow_failure)?;
            Ok(format!("rejected {}", request.id.0))
        }
        RequestsCommand::History { id } => {
            let events = SqlAuditLogRepository::new(pool.clone())
                .list_for_request(&RequestId(id.clone()))
                .await
                .map_err(|error| ("audit_read", error.to_string(), 4u8))?;
            let lines = events
                .iter()
                .map(|event| {
                    format!(
                        "  - {} {} [{}] by {}",
                        event.occurred_at.to_rfc3339(),
                        event.event_type,
                        event.outcome.as_str(),
                        event.actor
                    )
                })
                .collect::<Vec<_>>();
            Ok(format!("{} audit event(s) for {id}:\n{}", events.len(), lines.join("\n")))
        }
    }
}

/// Writes the events a command emitted before the pool closes.
async fn persist_audit(pool: &DbPool, audit: &InMemoryAuditSink) -> Result<(), CommandFailure> {
    let repository = SqlAuditLogRepository::new(pool.clone());
    for event in audit.events() {
        repository
            .append(&event)
            .await
            .map_err(|error| ("audit_persist", error.to_string(), 4u8))?;
    }
    Ok(())
}

fn parse_category(raw: &str) -> Result<RequestCategory, CommandFailure> {
    RequestCategory::parse(raw)
        .ok_or_else(|| ("invalid_input", format!("unknown request category `{raw}`"), 2u8))
}

fn parse_status(raw: &str) -> Result<RequestStatus, CommandFailure> {
    RequestStatus::parse(raw)
        .ok_or_else(|| ("invalid_input", format!("unknown request status `{raw}`"), 2u8))
}

fn workflow_failure(error: ApplicationError) -> CommandFailure {
    let (error_class, exit_code) = match error.kind() {
        ErrorKind::Validation => ("validation", 8),
        ErrorKind::InvalidTransition => ("invalid_transition", 9),
        ErrorKind::NotFound => ("not_found", 10),
        ErrorKind::Remote => ("db_connectivity", 4),
        ErrorKind::Internal => ("internal", 1),
    };
    (error_class, error.to_string(), exit_code)
}

fn render_requests(category: RequestCategory, requests: &[Request]) -> String {
    let lines = requests
        .iter()
        .map(|request| {
            format!(
                "  - {} [{}] {} total={} ({})",
                request.id.0,
                request.status.as_str(),
                request.requested_by,
                request.total_amount(),
                request.department
            )
        })
        .collect::<Vec<_>>();
    format!("{} {} request(s)\n{}", requests.len(), category.as_str(), lines.join("\n"))
}
