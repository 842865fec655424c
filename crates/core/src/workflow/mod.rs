//! Request workflow service.
//!
//! Loads a request, runs it through the approval flow, stages the result on
//! the [`ShadowView`], then persists it together with any linked record in a
//! single store call. A store failure reverts the shadow copy and surfaces as
//! [`ApplicationError::Remote`]; reads always go to the store.

pub mod shadow;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::purchase_order::PurchaseOrder;
use crate::domain::request::{
    NewRequest, Request, RequestCategory, RequestId, RequestKind, RetirementDetails,
};
use crate::drafts::{DraftStore, FormKey};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{
    check_retirement_eligibility, ApprovalFlow, FlowEngine, TransitionContext, TransitionOutcome,
    WorkflowAction, WorkflowEffect,
};
use crate::store::{LinkedRecord, RequestFilter, RequestStore, StoreError};

pub use shadow::ShadowView;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    pub request: Request,
    pub purchase_order: Option<PurchaseOrder>,
    pub outcome: TransitionOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementReceipt {
    pub advance: Request,
    pub retirement: Request,
}

#[derive(Clone)]
pub struct Workflow {
    store: Arc<dyn RequestStore>,
    drafts: Arc<dyn DraftStore>,
    audit: Arc<dyn AuditSink>,
    engine: FlowEngine<ApprovalFlow>,
    shadow: Arc<ShadowView>,
}

impl Workflow {
    pub fn new(
        store: Arc<dyn RequestStore>,
        drafts: Arc<dyn DraftStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            drafts,
            audit,
            engine: FlowEngine::default(),
            shadow: Arc::new(ShadowView::default()),
        }
    }

    pub fn shadow(&self) -> &ShadowView {
        &self.shadow
    }

    pub fn drafts(&self) -> &dyn DraftStore {
        self.drafts.as_ref()
    }

    pub async fn submit(
        &self,
        new_request: NewRequest,
        audit: &AuditContext,
    ) -> Result<Request, ApplicationError> {
        let request = new_request.into_request(Utc::now())?;
        let audit = audit.for_request(&request.id);

        self.shadow.stage(None, request.clone()).await;
        if let Err(error) = self.store.save(request.clone()).await {
            return Err(self.remote_failure(&request.id, "submit", &audit, error).await);
        }
        self.shadow.confirm(&request.id).await;

        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "workflow.request_submitted",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("category", request.category().as_str()),
        );
        Ok(request)
    }

    /// Submits the draft stored under `key` and discards it.
    pub async fn submit_draft(
        &self,
        key: &FormKey,
        audit: &AuditContext,
    ) -> Result<Request, ApplicationError> {
        let draft = self
            .drafts
            .load(key)
            .await?
            .ok_or_else(|| DomainError::not_found("draft", key.as_str()))?;
        let request = self.submit(draft.into_new_request()?, audit).await?;

        if let Err(error) = self.drafts.discard(key).await {
            tracing::warn!(
                event_name = "workflow.draft_discard_failed",
                correlation_id = %audit.correlation_id,
                request_id = %request.id,
                form_key = %key,
                error = %error,
                "submitted request but could not discard its draft"
            );
        }
        Ok(request)
    }

    pub async fn approve(
        &self,
        category: RequestCategory,
        id: &RequestId,
        vendor: Option<&str>,
        audit: &AuditContext,
    ) -> Result<ApprovalReceipt, ApplicationError> {
        let action = WorkflowAction::Approve { vendor: vendor.map(str::to_string) };
        self.transition(category, id, action, audit).await
    }

    pub async fn reject(
        &self,
        category: RequestCategory,
        id: &RequestId,
        reason: &str,
        audit: &AuditContext,
    ) -> Result<Request, ApplicationError> {
        let action = WorkflowAction::Reject { reason: reason.to_string() };
        self.transition(category, id, action, audit).await.map(|receipt| receipt.request)
    }

    /// Files a retirement against an approved advance. The advance keeps its
    /// status and only gains the `has_retirement` flag.
    pub async fn submit_retirement(
        &self,
        advance_id: &RequestId,
        details: RetirementDetails,
        audit: &AuditContext,
    ) -> Result<RetirementReceipt, ApplicationError> {
        let audit = audit.for_request(advance_id);
        let advance = self.load_in_category(RequestCategory::Advance, advance_id).await?;

        if let Err(error) = check_retirement_eligibility(&advance) {
            self.audit.emit(
                AuditEvent::from_context(
                    &audit,
                    "workflow.retirement_refused",
                    AuditCategory::Workflow,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            );
            return Err(error.into());
        }

        let now = Utc::now();
        let retirement = details.into_request(advance_id.clone(), now)?;
        let mut updated = advance.clone();
        if let RequestKind::Advance { has_retirement, .. } = &mut updated.kind {
            *has_retirement = true;
        }
        updated.updated_at = now;

        self.shadow.stage(Some(advance), updated.clone()).await;
        if let Err(error) = self.persist_retirement(&updated, &retirement).await {
            return Err(self.remote_failure(advance_id, "submit_retirement", &audit, error).await);
        }
        self.shadow.confirm(advance_id).await;

        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "workflow.retirement_submitted",
                AuditCategory::Workflow,
                AuditOutcome::Success,
            )
            .with_metadata("retirement_id", retirement.id.to_string()),
        );
        Ok(RetirementReceipt { advance: updated, retirement })
    }

    pub async fn get(
        &self,
        category: RequestCategory,
        id: &RequestId,
    ) -> Result<Request, ApplicationError> {
        self.load_in_category(category, id).await
    }

    pub async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, ApplicationError> {
        Ok(self.store.list(filter).await?)
    }

    async fn transition(
        &self,
        category: RequestCategory,
        id: &RequestId,
        action: WorkflowAction,
        audit: &AuditContext,
    ) -> Result<ApprovalReceipt, ApplicationError> {
        let audit = audit.for_request(id);
        let current = self.load_in_category(category, id).await?;

        let outcome = self
            .engine
            .apply_with_audit(
                &current.status,
                &action,
                &TransitionContext::new(category),
                self.audit.as_ref(),
                &audit,
            )
            .map_err(DomainError::from)?;

        let now = Utc::now();
        let (next, purchase_order) = apply_effects(&current, &outcome, now)?;

        self.shadow.stage(Some(current), next.clone()).await;
        if let Err(error) = self.persist_transition(&next, purchase_order.as_ref()).await {
            return Err(self.remote_failure(id, outcome.action.to_string().as_str(), &audit, error).await);
        }
        self.shadow.confirm(id).await;

        tracing::info!(
            event_name = "workflow.request_decided",
            correlation_id = %audit.correlation_id,
            request_id = %id,
            category = category.as_str(),
            status = next.status.as_str(),
            purchase_order_id = purchase_order.as_ref().map(|order| order.id.0.as_str()).unwrap_or(""),
            "request decided"
        );
        Ok(ApprovalReceipt { request: next, purchase_order, outcome })
    }

    async fn persist_transition(
        &self,
        next: &Request,
        purchase_order: Option<&PurchaseOrder>,
    ) -> Result<(), StoreError> {
        match purchase_order {
            Some(order) => {
                self.store
                    .save_with_linked(next.clone(), LinkedRecord::PurchaseOrder(order.clone()))
                    .await
            }
            None => self.store.save(next.clone()).await,
        }
    }

    async fn persist_retirement(
        &self,
        advance: &Request,
        retirement: &Request,
    ) -> Result<(), StoreError> {
        self.store
            .save_with_linked(advance.clone(), LinkedRecord::Retirement(retirement.clone()))
            .await
    }

    async fn load_in_category(
        &self,
        category: RequestCategory,
        id: &RequestId,
    ) -> Result<Request, ApplicationError> {
        match self.store.load(id).await? {
            Some(request) if request.category() == category => Ok(request),
            _ => Err(DomainError::not_found(category.label(), id.0.as_str()).into()),
        }
    }

    async fn remote_failure(
        &self,
        id: &RequestId,
        operation: &str,
        audit: &AuditContext,
        error: StoreError,
    ) -> ApplicationError {
        self.shadow.revert(id).await;
        tracing::warn!(
            event_name = "workflow.persist_failed",
            correlation_id = %audit.correlation_id,
            request_id = %id,
            operation,
            error = %error,
            "store rejected write; shadow copy reverted"
        );
        self.audit.emit(
            AuditEvent::from_context(
                audit,
                "workflow.persist_failed",
                AuditCategory::Persistence,
                AuditOutcome::Failed,
            )
            .with_metadata("operation", operation)
            .with_metadata("error", error.to_string()),
        );
        ApplicationError::from(error)
    }
}

fn apply_effects(
    current: &Request,
    outcome: &TransitionOutcome,
    now: DateTime<Utc>,
) -> Result<(Request, Option<PurchaseOrder>), DomainError> {
    let mut next = current.clone();
    next.status = outcome.to;
    next.updated_at = now;
    next.decided_at = Some(now);

    let mut purchase_order = None;
    for effect in &outcome.effects {
        match effect {
            WorkflowEffect::LinkVendor { vendor } => match &mut next.kind {
                RequestKind::MaterialRequest { linked_vendor: Some(existing), .. } => {
                    return Err(DomainError::InvariantViolation(format!(
                        "request `{}` is already linked to vendor `{existing}`",
                        current.id
                    )));
                }
                RequestKind::MaterialRequest { linked_vendor, .. } => {
                    *linked_vendor = Some(vendor.clone());
                }
                _ => {
                    return Err(DomainError::InvariantViolation(format!(
                        "vendor can only be linked to a material request, not `{}`",
                        current.id
                    )));
                }
            },
            WorkflowEffect::CreatePurchaseOrder { vendor } => {
                let order = PurchaseOrder::for_request(&next, vendor.clone(), now);
                if let RequestKind::MaterialRequest { purchase_order_id, .. } = &mut next.kind {
                    *purchase_order_id = Some(order.id.clone());
                }
                purchase_order = Some(order);
            }
            WorkflowEffect::RecordRejectionReason { reason } => {
                next.rejection_reason = Some(reason.clone());
            }
        }
    }
    Ok((next, purchase_order))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::Workflow;
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::request::{
        LineItem, NewRequest, Request, RequestCategory, RequestId, RequestKind, RequestStatus,
        RetirementDetails, SubmissionKind,
    };
    use crate::drafts::{DraftStore, FormKey, InMemoryDraftStore, RequestDraft};
    use crate::errors::{ApplicationError, DomainError, ErrorKind};
    use crate::store::{InMemoryRequestStore, RequestFilter, RequestStore};

    struct Harness {
        store: Arc<InMemoryRequestStore>,
        drafts: Arc<InMemoryDraftStore>,
        audit: InMemoryAuditSink,
        workflow: Workflow,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryRequestStore::default());
        let drafts = Arc::new(InMemoryDraftStore::default());
        let audit = InMemoryAuditSink::default();
        let workflow = Workflow::new(store.clone(), drafts.clone(), Arc::new(audit.clone()));
        Harness { store, drafts, audit, workflow }
    }

    fn ctx() -> AuditContext {
        AuditContext::new(None, "req-test", "approver@steps")
    }

    fn line(quantity: i64, amount: i64) -> LineItem {
        LineItem {
            item_name: "cement".to_string(),
            quantity: Decimal::from(quantity),
            quantity_type: "bags".to_string(),
            amount: Decimal::from(amount),
            description: String::new(),
        }
    }

    fn new_request(kind: SubmissionKind) -> NewRequest {
        NewRequest {
            kind,
            line_items: vec![line(2, 10), line(1, 5)],
            requested_by: "Chidi".to_string(),
            department: "Site A".to_string(),
            approver: Some("Mrs. Eze".to_string()),
        }
    }

    async fn seeded_material_request(harness: &Harness) -> Request {
        let mut request = new_request(SubmissionKind::MaterialRequest)
            .into_request(Utc::now())
            .expect("valid request");
        request.id = RequestId("r1".to_string());
        harness.store.insert(request.clone()).await;
        request
    }

    async fn approved_advance(harness: &Harness) -> Request {
        let advance = harness
            .workflow
            .submit(new_request(SubmissionKind::Advance { purpose: "fuel".to_string() }), &ctx())
            .await
            .expect("submit advance");
        harness
            .workflow
            .approve(RequestCategory::Advance, &advance.id, None, &ctx())
            .await
            .expect("approve advance")
            .request
    }

    fn retirement_details() -> RetirementDetails {
        RetirementDetails {
            line_items: vec![line(1, 18)],
            requested_by: "Chidi".to_string(),
            department: "Site A".to_string(),
            approver: None,
        }
    }

    #[tokio::test]
    async fn approving_material_request_links_vendor_and_creates_one_purchase_order() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;

        let receipt = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some("VendorX"), &ctx())
            .await
            .expect("approve");

        assert_eq!(receipt.request.status, RequestStatus::Approved);
        assert_eq!(receipt.request.linked_vendor(), Some("VendorX"));
        let orders = harness.store.purchase_orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].vendor, "VendorX");
        assert_eq!(orders[0].request_id, request.id);
        assert_eq!(orders[0].total_amount, Decimal::from(25));
        assert_eq!(
            receipt.purchase_order.as_ref().map(|order| &order.id),
            Some(&orders[0].id)
        );

        let stored = harness.store.load(&request.id).await.expect("load").expect("present");
        assert_eq!(stored, receipt.request);
    }

    #[tokio::test]
    async fn empty_vendor_is_a_validation_error_and_leaves_request_pending() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;

        let error = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some(""), &ctx())
            .await
            .expect_err("vendor required");

        assert_eq!(error.kind(), ErrorKind::Validation);
        let stored = harness.store.load(&request.id).await.expect("load").expect("present");
        assert_eq!(stored.status, RequestStatus::Pending);
        assert!(harness.store.purchase_orders().await.is_empty());
    }

    #[tokio::test]
    async fn rejecting_twice_fails_the_second_time() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;

        let rejected = harness
            .workflow
            .reject(RequestCategory::MaterialRequest, &request.id, "over budget", &ctx())
            .await
            .expect("first rejection");
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("over budget"));

        let error = harness
            .workflow
            .reject(RequestCategory::MaterialRequest, &request.id, "again", &ctx())
            .await
            .expect_err("second rejection");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidTransition { from: RequestStatus::Rejected, .. })
        ));

        let events = harness.audit.events();
        assert!(events.iter().any(|event| event.event_type == "workflow.transition_rejected"));
    }

    #[tokio::test]
    async fn unknown_or_mismatched_ids_are_not_found() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;

        let missing = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &RequestId("nope".to_string()), Some("V"), &ctx())
            .await
            .expect_err("missing");
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let wrong_category = harness
            .workflow
            .approve(RequestCategory::Leave, &request.id, None, &ctx())
            .await
            .expect_err("material request is not a leave request");
        assert_eq!(wrong_category.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn retirement_can_only_be_filed_once() {
        let harness = harness();
        let advance = approved_advance(&harness).await;

        let receipt = harness
            .workflow
            .submit_retirement(&advance.id, retirement_details(), &ctx())
            .await
            .expect("first retirement");
        assert!(receipt.advance.has_retirement());
        assert_eq!(receipt.advance.status, RequestStatus::Approved);
        assert_eq!(receipt.retirement.status, RequestStatus::Pending);
        assert!(matches!(
            receipt.retirement.kind,
            RequestKind::Retirement { ref advance_id } if advance_id == &advance.id
        ));

        let error = harness
            .workflow
            .submit_retirement(&advance.id, retirement_details(), &ctx())
            .await
            .expect_err("second retirement");
        assert!(matches!(error, ApplicationError::Domain(DomainError::RetirementNotAllowed { .. })));

        let retirements = harness
            .workflow
            .list(&RequestFilter::category(RequestCategory::Retirement))
            .await
            .expect("list");
        assert_eq!(retirements.len(), 1);
    }

    #[tokio::test]
    async fn pending_advance_cannot_be_retired() {
        let harness = harness();
        let advance = harness
            .workflow
            .submit(new_request(SubmissionKind::Advance { purpose: "fuel".to_string() }), &ctx())
            .await
            .expect("submit advance");

        let error = harness
            .workflow
            .submit_retirement(&advance.id, retirement_details(), &ctx())
            .await
            .expect_err("advance still pending");
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn remote_failure_reverts_shadow_copy() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;
        harness.store.set_fail_writes(true);

        let error = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some("VendorX"), &ctx())
            .await
            .expect_err("store is down");
        assert_eq!(error.kind(), ErrorKind::Remote);

        assert!(!harness.workflow.shadow().has_staged(&request.id).await);
        assert_eq!(harness.workflow.shadow().current(&request.id).await, None);
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "workflow.persist_failed"));

        harness.store.set_fail_writes(false);
        let fetched = harness
            .workflow
            .get(RequestCategory::MaterialRequest, &request.id)
            .await
            .expect("get");
        assert_eq!(fetched.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn submitting_a_draft_discards_it() {
        let harness = harness();
        let key = FormKey::parse("leave:amaka").expect("key");
        let draft = RequestDraft {
            leave_type: Some("annual".to_string()),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 8, 1),
            end_date: chrono::NaiveDate::from_ymd_opt(2026, 8, 14),
            requested_by: Some("Amaka".to_string()),
            department: Some("HR".to_string()),
            ..RequestDraft::empty(RequestCategory::Leave)
        };
        harness.drafts.save(&key, &draft).await.expect("save draft");

        let request = harness.workflow.submit_draft(&key, &ctx()).await.expect("submit draft");
        assert_eq!(request.category(), RequestCategory::Leave);
        assert_eq!(harness.drafts.load(&key).await.expect("load"), None);

        let missing = harness.workflow.submit_draft(&key, &ctx()).await.expect_err("gone");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_filters_by_category_and_status() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;
        harness
            .workflow
            .submit(
                new_request(SubmissionKind::Leave {
                    leave_type: "annual".to_string(),
                    start_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 5).expect("date"),
                    end_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 9).expect("date"),
                }),
                &ctx(),
            )
            .await
            .expect("submit leave");
        harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some("VendorX"), &ctx())
            .await
            .expect("approve");

        let approved = harness
            .workflow
            .list(
                &RequestFilter::category(RequestCategory::MaterialRequest)
                    .with_status(Some(RequestStatus::Approved)),
            )
            .await
            .expect("list");
        assert_eq!(approved.len(), 1);

        let pending_leave = harness
            .workflow
            .list(
                &RequestFilter::category(RequestCategory::Leave)
                    .with_status(Some(RequestStatus::Pending)),
            )
            .await
            .expect("list");
        assert_eq!(pending_leave.len(), 1);
    }

    #[tokio::test]
    async fn failed_purchase_order_write_leaves_request_pending_and_retryable() {
        let harness = harness();
        let request = seeded_material_request(&harness).await;
        harness.store.set_fail_links(true);

        let error = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some("VendorX"), &ctx())
            .await
            .expect_err("purchase order write fails");
        assert_eq!(error.kind(), ErrorKind::Remote);

        let stored = harness.store.load(&request.id).await.expect("load").expect("present");
        assert_eq!(stored, request);
        assert_eq!(stored.linked_vendor(), None);
        assert!(harness.store.purchase_orders().await.is_empty());
        let fetched = harness
            .workflow
            .get(RequestCategory::MaterialRequest, &request.id)
            .await
            .expect("get");
        assert_eq!(fetched.status, RequestStatus::Pending);

        harness.store.set_fail_links(false);
        let receipt = harness
            .workflow
            .approve(RequestCategory::MaterialRequest, &request.id, Some("VendorX"), &ctx())
            .await
            .expect("retry succeeds");
        assert_eq!(receipt.request.status, RequestStatus::Approved);
        assert_eq!(harness.store.purchase_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_retirement_write_keeps_the_advance_retirable() {
        let harness = harness();
        let advance = approved_advance(&harness).await;
        harness.store.set_fail_links(true);

        let error = harness
            .workflow
            .submit_retirement(&advance.id, retirement_details(), &ctx())
            .await
            .expect_err("retirement write fails");
        assert_eq!(error.kind(), ErrorKind::Remote);

        let stored = harness.store.load(&advance.id).await.expect("load").expect("present");
        assert!(!stored.has_retirement());
        let retirements = harness
            .workflow
            .list(&RequestFilter::category(RequestCategory::Retirement))
            .await
            .expect("list");
        assert!(retirements.is_empty());

        harness.store.set_fail_links(false);
        let receipt = harness
            .workflow
            .submit_retirement(&advance.id, retirement_details(), &ctx())
            .await
            .expect("retry succeeds");
        assert!(receipt.advance.has_retirement());
    }

    #[tokio::test]
    async fn get_sees_decisions_made_by_another_workflow() {
        let server = harness();
        let cli = Workflow::new(
            server.store.clone(),
            server.drafts.clone(),
            Arc::new(InMemoryAuditSink::default()),
        );

        let submitted = server
            .workflow
            .submit(new_request(SubmissionKind::MaterialRequest), &ctx())
            .await
            .expect("submit");
        assert_eq!(server.workflow.shadow().current(&submitted.id).await, None);

        cli.reject(RequestCategory::MaterialRequest, &submitted.id, "duplicate", &ctx())
            .await
            .expect("reject elsewhere");

        let fetched = server
            .workflow
            .get(RequestCategory::MaterialRequest, &submitted.id)
            .await
            .expect("get");
        assert_eq!(fetched.status, RequestStatus::Rejected);
    }
}
