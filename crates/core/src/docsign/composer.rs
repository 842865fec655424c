use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::required_text;
use crate::domain::signature::{
    snapshot_digest, DocumentId, DocumentStatus, FieldId, FieldKind, FieldPosition, PlacedField,
    Recipient, RecipientId, SignatureDocument, SigningMode,
};
use crate::errors::DomainError;

/// Recipient colours, handed out round-robin in the order recipients are added.
pub const RECIPIENT_PALETTE: [&str; 5] = ["#2563eb", "#16a34a", "#d97706", "#db2777", "#7c3aed"];

/// Who a newly placed field belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    FirstRecipient,
    Recipient(RecipientId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub file_name: String,
    pub page_count: u32,
}

/// Editable state of a signature request before it is sent.
///
/// Every field is bound to a recipient that exists in the composer; removing a
/// recipient moves its fields to the first remaining recipient, or drops them
/// when nobody is left.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentComposer {
    document: Option<UploadedDocument>,
    subject: String,
    message: String,
    signing_mode: SigningMode,
    recipients: Vec<Recipient>,
    fields: Vec<PlacedField>,
    recipients_added: u32,
    fields_placed: u32,
}

impl DocumentComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn fields(&self) -> &[PlacedField] {
        &self.fields
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn signing_mode(&self) -> SigningMode {
        self.signing_mode
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_signing_mode(&mut self, mode: SigningMode) {
        self.signing_mode = mode;
    }

    /// Records the document being composed. Fields on pages past the end of
    /// the new document move to its last page.
    pub fn upload_document(
        &mut self,
        file_name: &str,
        page_count: u32,
    ) -> Result<(), DomainError> {
        let file_name = required_text("file_name", file_name)?;
        if page_count == 0 {
            return Err(DomainError::validation("page_count", "document must have at least one page"));
        }
        for field in &mut self.fields {
            field.page = field.page.min(page_count);
        }
        self.document = Some(UploadedDocument { file_name, page_count });
        Ok(())
    }

    /// Appends a recipient. Name and email are only checked at send time.
    pub fn add_recipient(&mut self, name: impl Into<String>, email: impl Into<String>) -> RecipientId {
        let color = RECIPIENT_PALETTE[self.recipients_added as usize % RECIPIENT_PALETTE.len()];
        self.recipients_added += 1;
        let id = RecipientId(self.recipients_added);
        let order = u32::try_from(self.recipients.len()).unwrap_or(u32::MAX).saturating_add(1);

        self.recipients.push(Recipient {
            id,
            name: name.into(),
            email: email.into(),
            order,
            color: color.to_string(),
        });
        id
    }

    pub fn update_recipient(
        &mut self,
        id: RecipientId,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(), DomainError> {
        let recipient = self
            .recipients
            .iter_mut()
            .find(|recipient| recipient.id == id)
            .ok_or_else(|| DomainError::not_found("recipient", id.0.to_string()))?;
        if let Some(name) = name {
            recipient.name = name;
        }
        if let Some(email) = email {
            recipient.email = email;
        }
        Ok(())
    }

    pub fn remove_recipient(&mut self, id: RecipientId) -> Result<Recipient, DomainError> {
        let index = self
            .recipients
            .iter()
            .position(|recipient| recipient.id == id)
            .ok_or_else(|| DomainError::not_found("recipient", id.0.to_string()))?;
        let removed = self.recipients.remove(index);
        self.renumber();
        self.rehome_orphaned_fields();
        Ok(removed)
    }

    pub fn place_field(
        &mut self,
        kind: FieldKind,
        page: u32,
        position: FieldPosition,
        assignee: Assignee,
    ) -> Result<FieldId, DomainError> {
        let assigned_to = match assignee {
            Assignee::FirstRecipient => self
                .recipients
                .first()
                .map(|recipient| recipient.id)
                .ok_or_else(|| {
                    DomainError::validation("assigned_to", "add a recipient before placing fields")
                })?,
            Assignee::Recipient(id) if self.has_recipient(id) => id,
            Assignee::Recipient(id) => {
                return Err(DomainError::validation(
                    "assigned_to",
                    format!("recipient {} does not exist", id.0),
                ));
            }
        };
        let page = self.checked_page(page)?;

        self.fields_placed += 1;
        let id = FieldId(self.fields_placed);
        self.fields.push(PlacedField {
            id,
            kind,
            page,
            position: position.clamped(),
            size: kind.default_size(),
            required: kind.required_by_default(),
            assigned_to,
        });
        Ok(id)
    }

    /// Moves a field to another recipient. Unknown fields or recipients leave
    /// the composer untouched; the return value says whether anything changed.
    pub fn reassign_field(&mut self, field_id: FieldId, recipient_id: RecipientId) -> bool {
        if !self.has_recipient(recipient_id) {
            return false;
        }
        match self.fields.iter_mut().find(|field| field.id == field_id) {
            Some(field) if field.assigned_to != recipient_id => {
                field.assigned_to = recipient_id;
                true
            }
            _ => false,
        }
    }

    pub fn reposition_field(
        &mut self,
        field_id: FieldId,
        page: u32,
        position: FieldPosition,
    ) -> Result<(), DomainError> {
        let page = self.checked_page(page)?;
        let field = self
            .fields
            .iter_mut()
            .find(|field| field.id == field_id)
            .ok_or_else(|| DomainError::not_found("field", field_id.0.to_string()))?;
        field.page = page;
        field.position = position.clamped();
        Ok(())
    }

    pub fn set_field_required(&mut self, field_id: FieldId, required: bool) -> Result<(), DomainError> {
        let field = self
            .fields
            .iter_mut()
            .find(|field| field.id == field_id)
            .ok_or_else(|| DomainError::not_found("field", field_id.0.to_string()))?;
        field.required = required;
        Ok(())
    }

    pub fn remove_field(&mut self, field_id: FieldId) -> Result<PlacedField, DomainError> {
        let index = self
            .fields
            .iter()
            .position(|field| field.id == field_id)
            .ok_or_else(|| DomainError::not_found("field", field_id.0.to_string()))?;
        Ok(self.fields.remove(index))
    }

    /// Validates the composition and freezes it into a pending document.
    ///
    /// Recipients missing a name or email are dropped from the snapshot and
    /// their fields follow the same rehoming rule as [`Self::remove_recipient`].
    pub fn send_request(&self, now: DateTime<Utc>) -> Result<SignatureDocument, DomainError> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| DomainError::validation("document", "upload a document before sending"))?;
        let subject = required_text("subject", &self.subject)?;

        let mut snapshot = self.clone();
        snapshot.recipients.retain(Recipient::is_addressable);
        if snapshot.recipients.is_empty() {
            return Err(DomainError::validation(
                "recipients",
                "at least one recipient needs both a name and an email",
            ));
        }
        for recipient in &mut snapshot.recipients {
            recipient.name = recipient.name.trim().to_string();
            recipient.email = recipient.email.trim().to_string();
        }
        snapshot.renumber();
        snapshot.rehome_orphaned_fields();

        let digest = snapshot_digest(&snapshot.recipients, &snapshot.fields);
        Ok(SignatureDocument {
            id: DocumentId::generate(),
            file_name: document.file_name.clone(),
            page_count: document.page_count,
            subject,
            message: self.message.trim().to_string(),
            signing_mode: self.signing_mode,
            status: DocumentStatus::Pending,
            recipients: snapshot.recipients,
            fields: snapshot.fields,
            snapshot_digest: digest,
            created_at: now,
        })
    }

    fn has_recipient(&self, id: RecipientId) -> bool {
        self.recipients.iter().any(|recipient| recipient.id == id)
    }

    fn checked_page(&self, page: u32) -> Result<u32, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page", "pages are numbered from 1"));
        }
        match &self.document {
            Some(document) if page > document.page_count => Err(DomainError::validation(
                "page",
                format!("document `{}` has {} page(s)", document.file_name, document.page_count),
            )),
            _ => Ok(page),
        }
    }

    fn renumber(&mut self) {
        for (order, recipient) in (1u32..).zip(self.recipients.iter_mut()) {
            recipient.order = order;
        }
    }

    fn rehome_orphaned_fields(&mut self) {
        let fallback = self.recipients.first().map(|recipient| recipient.id);
        let recipients = &self.recipients;
        self.fields.retain_mut(|field| {
            if recipients.iter().any(|recipient| recipient.id == field.assigned_to) {
                return true;
            }
            match fallback {
                Some(id) => {
                    field.assigned_to = id;
                    true
                }
                None => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Assignee, DocumentComposer, RECIPIENT_PALETTE};
    use crate::domain::signature::{
        DocumentStatus, FieldId, FieldKind, FieldPosition, RecipientId, SigningMode,
    };
    use crate::errors::DomainError;

    fn composer_with_document() -> DocumentComposer {
        let mut composer = DocumentComposer::new();
        composer.upload_document("contract.pdf", 3).expect("upload");
        composer.set_subject("Please sign the supply contract");
        composer
    }

    #[test]
    fn recipients_get_sequential_order_and_round_robin_colours() {
        let mut composer = DocumentComposer::new();
        let ids = (0..6)
            .map(|index| composer.add_recipient(format!("R{index}"), format!("r{index}@steps.ng")))
            .collect::<Vec<_>>();

        let orders = composer.recipients().iter().map(|r| r.order).collect::<Vec<_>>();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(composer.recipients()[0].color, RECIPIENT_PALETTE[0]);
        assert_eq!(composer.recipients()[5].color, RECIPIENT_PALETTE[0]);
        assert_eq!(composer.recipients()[4].color, RECIPIENT_PALETTE[4]);
        assert_eq!(ids[0], RecipientId(1));
    }

    #[test]
    fn placed_field_defaults_to_first_recipient_when_asked() {
        let mut composer = composer_with_document();
        let first = composer.add_recipient("Ada", "ada@steps.ng");

        let field = composer
            .place_field(
                FieldKind::Signature,
                1,
                FieldPosition::new(10.0, 20.0),
                Assignee::FirstRecipient,
            )
            .expect("place");

        let placed = &composer.fields()[0];
        assert_eq!(placed.id, field);
        assert_eq!(placed.assigned_to, first);
        assert!(placed.required);
        assert_eq!(placed.position, FieldPosition::new(10.0, 20.0));
    }

    #[test]
    fn optional_kinds_are_not_required_and_positions_clamp() {
        let mut composer = composer_with_document();
        let second = {
            composer.add_recipient("Ada", "ada@steps.ng");
            composer.add_recipient("Bayo", "bayo@steps.ng")
        };

        composer
            .place_field(
                FieldKind::Textbox,
                2,
                FieldPosition::new(-4.0, 140.0),
                Assignee::Recipient(second),
            )
            .expect("place");

        let placed = &composer.fields()[0];
        assert!(!placed.required);
        assert_eq!(placed.assigned_to, second);
        assert_eq!(placed.position, FieldPosition::new(0.0, 100.0));
    }

    #[test]
    fn placing_without_recipients_or_off_document_fails() {
        let mut composer = composer_with_document();
        let error = composer
            .place_field(FieldKind::Initials, 1, FieldPosition::default(), Assignee::FirstRecipient)
            .expect_err("no recipient");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "assigned_to"));

        composer.add_recipient("Ada", "ada@steps.ng");
        let error = composer
            .place_field(FieldKind::Initials, 4, FieldPosition::default(), Assignee::FirstRecipient)
            .expect_err("page out of range");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "page"));
    }

    #[test]
    fn reassigning_to_unknown_recipient_is_a_no_op() {
        let mut composer = composer_with_document();
        let first = composer.add_recipient("Ada", "ada@steps.ng");
        let second = composer.add_recipient("Bayo", "bayo@steps.ng");
        let field = composer
            .place_field(FieldKind::Signature, 1, FieldPosition::default(), Assignee::FirstRecipient)
            .expect("place");

        assert!(!composer.reassign_field(field, RecipientId(99)));
        assert_eq!(composer.fields()[0].assigned_to, first);

        assert!(composer.reassign_field(field, second));
        assert_eq!(composer.fields()[0].assigned_to, second);
        assert!(!composer.reassign_field(FieldId(42), first));
    }

    #[test]
    fn removing_recipient_rehomes_fields_and_renumbers() {
        let mut composer = composer_with_document();
        let first = composer.add_recipient("Ada", "ada@steps.ng");
        let second = composer.add_recipient("Bayo", "bayo@steps.ng");
        let third = composer.add_recipient("Chika", "chika@steps.ng");
        composer
            .place_field(FieldKind::Signature, 1, FieldPosition::default(), Assignee::Recipient(first))
            .expect("place");
        composer
            .place_field(FieldKind::DateSigned, 2, FieldPosition::default(), Assignee::Recipient(third))
            .expect("place");

        composer.remove_recipient(first).expect("remove");
        assert_eq!(composer.recipients().iter().map(|r| r.order).collect::<Vec<_>>(), vec![1, 2]);
        assert!(composer.fields().iter().all(|field| field.assigned_to != first));
        assert_eq!(composer.fields()[0].assigned_to, second);
        assert_eq!(composer.fields()[1].assigned_to, third);

        composer.remove_recipient(second).expect("remove");
        composer.remove_recipient(third).expect("remove");
        assert!(composer.fields().is_empty());
        assert!(matches!(
            composer.remove_recipient(third),
            Err(DomainError::NotFound { entity: "recipient", .. })
        ));
    }

    #[test]
    fn reposition_and_remove_fields() {
        let mut composer = composer_with_document();
        composer.add_recipient("Ada", "ada@steps.ng");
        let field = composer
            .place_field(FieldKind::Checkbox, 1, FieldPosition::new(5.0, 5.0), Assignee::FirstRecipient)
            .expect("place");

        composer.reposition_field(field, 3, FieldPosition::new(50.0, 101.0)).expect("move");
        assert_eq!(composer.fields()[0].page, 3);
        assert_eq!(composer.fields()[0].position, FieldPosition::new(50.0, 100.0));

        composer.remove_field(field).expect("remove");
        assert!(composer.fields().is_empty());
        assert!(composer.reposition_field(field, 1, FieldPosition::default()).is_err());
    }

    #[test]
    fn send_requires_document_subject_and_addressable_recipient() {
        let mut composer = DocumentComposer::new();
        composer.add_recipient("Ada", "ada@steps.ng");
        composer.set_subject("Sign");
        let error = composer.send_request(Utc::now()).expect_err("no document");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "document"));

        let mut composer = composer_with_document();
        composer.set_subject("   ");
        composer.add_recipient("Ada", "ada@steps.ng");
        let error = composer.send_request(Utc::now()).expect_err("blank subject");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "subject"));

        let mut composer = composer_with_document();
        composer.add_recipient("Ada", "");
        composer.add_recipient("", "b@steps.ng");
        let error = composer.send_request(Utc::now()).expect_err("nobody addressable");
        assert!(matches!(error, DomainError::Validation { ref field, .. } if field == "recipients"));
    }

    #[test]
    fn sent_document_freezes_addressable_snapshot() {
        let mut composer = composer_with_document();
        let blank = composer.add_recipient("", "");
        let signer = composer.add_recipient(" Ada ", "ada@steps.ng");
        composer.set_signing_mode(SigningMode::Sequential);
        composer
            .place_field(FieldKind::Signature, 1, FieldPosition::default(), Assignee::Recipient(blank))
            .expect("place");

        let document = composer.send_request(Utc::now()).expect("send");
        assert_eq!(document.status, DocumentStatus::Pending);
        assert_eq!(document.recipients.len(), 1);
        assert_eq!(document.recipients[0].name, "Ada");
        assert_eq!(document.recipients[0].order, 1);
        assert_eq!(document.fields[0].assigned_to, signer);
        assert!(document.verify_snapshot());
        assert_eq!(document.next_signers().len(), 1);

        // composer is untouched by sending
        assert_eq!(composer.recipients().len(), 2);
    }
}
