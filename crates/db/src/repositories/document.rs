use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use steps_core::docsign::DocumentStore;
use steps_core::domain::signature::{
    DocumentId, DocumentStatus, PlacedField, Recipient, SignatureDocument, SigningMode,
};
use steps_core::store::StoreError;

use super::request::parse_timestamp;
use super::RepositoryError;
use crate::DbPool;

/// Sent signature requests. Recipients and fields are stored as JSON
/// snapshots next to the digest computed at send time.
#[derive(Clone)]
pub struct SqlDocumentStore {
    pool: DbPool,
}

impl SqlDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, document: &SignatureDocument) -> Result<(), RepositoryError> {
        let recipients_json =
            serde_json::to_string(&document.recipients).map_err(RepositoryError::decode)?;
        let fields_json =
            serde_json::to_string(&document.fields).map_err(RepositoryError::decode)?;

        sqlx::query(
            "INSERT INTO signature_document (id, file_name, page_count, subject, message,
                                             signing_mode, status, recipients_json, fields_json,
                                             snapshot_digest, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status",
        )
        .bind(&document.id.0)
        .bind(&document.file_name)
        .bind(i64::from(document.page_count))
        .bind(&document.subject)
        .bind(&document.message)
        .bind(document.signing_mode.as_str())
        .bind(document.status.as_str())
        .bind(recipients_json)
        .bind(fields_json)
        .bind(&document.snapshot_digest)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(
        &self,
        id: &DocumentId,
    ) -> Result<Option<SignatureDocument>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, file_name, page_count, subject, message, signing_mode, status,
                    recipients_json, fields_json, snapshot_digest, created_at
             FROM signature_document WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn save(&self, document: SignatureDocument) -> Result<(), StoreError> {
        Ok(self.insert(&document).await?)
    }

    async fn load(&self, id: &DocumentId) -> Result<Option<SignatureDocument>, StoreError> {
        Ok(self.find_by_id(id).await?)
    }
}

fn row_to_document(row: &SqliteRow) -> Result<SignatureDocument, RepositoryError> {
    let id: String = row.try_get("id").map_err(RepositoryError::decode)?;
    let page_count: i64 = row.try_get("page_count").map_err(RepositoryError::decode)?;
    let signing_mode_str: String = row.try_get("signing_mode").map_err(RepositoryError::decode)?;
    let status_str: String = row.try_get("status").map_err(RepositoryError::decode)?;
    let recipients_json: String =
        row.try_get("recipients_json").map_err(RepositoryError::decode)?;
    let fields_json: String = row.try_get("fields_json").map_err(RepositoryError::decode)?;
    let created_at: String = row.try_get("created_at").map_err(RepositoryError::decode)?;

    let recipients: Vec<Recipient> =
        serde_json::from_str(&recipients_json).map_err(RepositoryError::decode)?;
    let fields: Vec<PlacedField> =
        serde_json::from_str(&fields_json).map_err(RepositoryError::decode)?;

    Ok(SignatureDocument {
        id: DocumentId(id),
        file_name: row.try_get("file_name").map_err(RepositoryError::decode)?,
        page_count: u32::try_from(page_count).map_err(RepositoryError::decode)?,
        subject: row.try_get("subject").map_err(RepositoryError::decode)?,
        message: row.try_get("message").map_err(RepositoryError::decode)?,
        signing_mode: SigningMode::parse(&signing_mode_str).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown signing mode `{signing_mode_str}`"))
        })?,
        status: DocumentStatus::parse(&status_str).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown document status `{status_str}`"))
        })?,
        recipients,
        fields,
        snapshot_digest: row.try_get("snapshot_digest").map_err(RepositoryError::decode)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use steps_core::docsign::{Assignee, DocumentComposer, DocumentStore};
    use steps_core::domain::signature::{DocumentId, FieldKind, FieldPosition, SigningMode};

    use super::SqlDocumentStore;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn sent_document_round_trips_with_intact_snapshot() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = SqlDocumentStore::new(pool);

        let mut composer = DocumentComposer::default();
        composer.upload_document("lease.pdf", 3).expect("upload");
        composer.set_subject("Office lease renewal");
        composer.set_signing_mode(SigningMode::Parallel);
        let landlord = composer.add_recipient("Landlord", "landlord@example.com");
        composer.add_recipient("Tenant", "tenant@example.com");
        composer
            .place_field(
                FieldKind::Signature,
                2,
                FieldPosition::new(40.0, 80.5),
                Assignee::Recipient(landlord),
            )
            .expect("place field");
        let document = composer.send_request(Utc::now()).expect("send");

        store.save(document.clone()).await.expect("save");
        let loaded = store.load(&document.id).await.expect("load").expect("present");

        assert_eq!(loaded, document);
        assert!(loaded.verify_snapshot());
        assert_eq!(loaded.next_signers().len(), 2);
        assert_eq!(
            store.load(&DocumentId("DOC-missing".to_string())).await.expect("load missing"),
            None
        );
    }
}
