pub mod audit;
pub mod config;
pub mod docsign;
pub mod domain;
pub mod drafts;
pub mod errors;
pub mod flows;
pub mod store;
pub mod workflow;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use docsign::{Assignee, DocumentComposer, DocumentStore, InMemoryDocumentStore};
pub use domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
pub use domain::request::{
    LineItem, NewRequest, Request, RequestCategory, RequestId, RequestKind, RequestStatus,
    RetirementDetails, SubmissionKind,
};
pub use domain::signature::{
    DocumentId, FieldId, FieldKind, FieldPosition, RecipientId, SignatureDocument, SigningMode,
};
pub use drafts::{DraftStore, FileDraftStore, FormKey, InMemoryDraftStore, RequestDraft};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use store::{
    InMemoryRequestStore, LinkedRecord, PurchaseOrderStore, RequestFilter, RequestStore,
    StoreError,
};
pub use workflow::{ApprovalReceipt, RetirementReceipt, Workflow};
