use async_trait::async_trait;
use thiserror::Error;

use steps_core::audit::AuditEvent;
use steps_core::domain::request::RequestId;
use steps_core::store::StoreError;

pub mod audit;
pub mod document;
pub mod purchase_order;
pub mod request;

pub use audit::{SqlAuditLogRepository, SqlAuditSink};
pub use document::SqlDocumentStore;
pub use request::SqlRequestStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub(crate) fn decode(error: impl ToString) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(sqlx::Error::Database(error))
                if error.is_unique_violation() =>
            {
                StoreError::Conflict(error.message().to_string())
            }
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_request(&self, id: &RequestId) -> Result<Vec<AuditEvent>, RepositoryError>;
}
