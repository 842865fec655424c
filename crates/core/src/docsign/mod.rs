//! Signature request composition and storage of sent documents.

pub mod composer;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::signature::{DocumentId, SignatureDocument};
use crate::store::StoreError;

pub use composer::{Assignee, DocumentComposer, UploadedDocument, RECIPIENT_PALETTE};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, document: SignatureDocument) -> Result<(), StoreError>;
    async fn load(&self, id: &DocumentId) -> Result<Option<SignatureDocument>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, SignatureDocument>>,
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, document: SignatureDocument) -> Result<(), StoreError> {
        self.documents.write().await.insert(document.id.0.clone(), document);
        Ok(())
    }

    async fn load(&self, id: &DocumentId) -> Result<Option<SignatureDocument>, StoreError> {
        Ok(self.documents.read().await.get(&id.0).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Assignee, DocumentComposer, DocumentStore, InMemoryDocumentStore};
    use crate::domain::signature::{FieldKind, FieldPosition, SigningMode};

    fn sent(mode: SigningMode) -> crate::domain::signature::SignatureDocument {
        let mut composer = DocumentComposer::new();
        composer.upload_document("nda.pdf", 1).expect("upload");
        composer.set_subject("NDA");
        composer.set_signing_mode(mode);
        composer.add_recipient("Ada", "ada@steps.ng");
        composer.add_recipient("Bayo", "bayo@steps.ng");
        composer
            .place_field(FieldKind::Signature, 1, FieldPosition::new(60.0, 80.0), Assignee::FirstRecipient)
            .expect("place");
        composer.send_request(Utc::now()).expect("send")
    }

    #[test]
    fn next_signers_follow_signing_mode() {
        let sequential = sent(SigningMode::Sequential);
        let names = sequential.next_signers().iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Ada"]);

        let parallel = sent(SigningMode::Parallel);
        assert_eq!(parallel.next_signers().len(), 2);
    }

    #[test]
    fn tampering_with_snapshot_is_detected() {
        let mut document = sent(SigningMode::Sequential);
        assert!(document.verify_snapshot());

        document.recipients[0].email = "mallory@elsewhere.test".to_string();
        assert!(!document.verify_snapshot());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_documents() {
        let store = InMemoryDocumentStore::default();
        let document = sent(SigningMode::Parallel);

        store.save(document.clone()).await.expect("save");
        assert_eq!(store.load(&document.id).await.expect("load"), Some(document));
    }
}
