//! REST surface over the request workflow, purchase orders, signature
//! documents and drafts.
//!
//! Request routes are mounted once per category:
//! - `POST /api/{base}`                 submit
//! - `GET  /api/{base}?status=`         list
//! - `GET  /api/{base}/{id}`            fetch
//! - `POST /api/{base}/{id}/approve`    approve (`{vendor}` for material requests)
//! - `POST /api/{base}/{id}/reject`     reject (`{reason}`)
//!
//! where `base` is `material-requests`, `advances`, `retirements` or
//! `hr/leave-requests`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use steps_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use steps_core::docsign::{Assignee, DocumentComposer, DocumentStore};
use steps_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
use steps_core::domain::request::{
    LineItem, Request, RequestCategory, RequestId, RequestKind, RequestStatus, RetirementDetails,
};
use steps_core::domain::signature::{
    DocumentId, DocumentStatus, FieldKind, FieldPosition, PlacedField, Recipient, RecipientId,
    SignatureDocument, SigningMode,
};
use steps_core::drafts::{FormKey, RequestDraft};
use steps_core::errors::{ApplicationError, DomainError};
use steps_core::store::{PurchaseOrderStore, RequestFilter};
use steps_core::Workflow;

use crate::auth::{require_bearer, AuthGate};
use crate::error::ApiError;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Clone)]
pub struct ApiState {
    pub workflow: Workflow,
    pub documents: Arc<dyn DocumentStore>,
    pub purchase_orders: Arc<dyn PurchaseOrderStore>,
    pub audit: Arc<dyn AuditSink>,
}

pub fn router(state: ApiState, gate: AuthGate) -> Router {
    let routes = [
        ("/api/material-requests", RequestCategory::MaterialRequest),
        ("/api/advances", RequestCategory::Advance),
        ("/api/retirements", RequestCategory::Retirement),
        ("/api/hr/leave-requests", RequestCategory::Leave),
    ]
    .into_iter()
    .fold(Router::new(), |router, (base, category)| router.merge(category_routes(base, category)));

    routes
        .route("/api/advances/{id}/retirement", post(submit_retirement))
        .route("/api/purchase-orders", get(list_purchase_orders))
        .route("/api/purchase-orders/{id}", get(get_purchase_order))
        .route("/api/documents", post(create_document))
        .route("/api/documents/{id}", get(get_document))
        .route("/api/drafts/{form_key}", get(load_draft).put(save_draft).delete(discard_draft))
        .route("/api/drafts/{form_key}/submit", post(submit_draft))
        .route_layer(middleware::from_fn_with_state(gate, require_bearer))
        .with_state(state)
}

fn category_routes(base: &str, category: RequestCategory) -> Router<ApiState> {
    Router::new()
        .route(base, get(list_requests).post(submit_request))
        .route(&format!("{base}/{{id}}"), get(get_request))
        .route(&format!("{base}/{{id}}/approve"), post(approve_request))
        .route(&format!("{base}/{{id}}/reject"), post(reject_request))
        .layer(Extension(category))
}

/// Caller-supplied correlation id, or a fresh one.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn audit_context(headers: &HeaderMap) -> AuditContext {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("api");
    AuditContext::new(None, correlation_id(headers), actor)
}

/// Reads an optional JSON body; an empty body yields the default value.
fn optional_body<T>(body: &Bytes, correlation_id: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json_body(body, correlation_id)
}

/// Reads a required JSON body, reporting malformed input in the API error
/// envelope rather than as a plain-text extractor rejection.
fn json_body<T>(body: &Bytes, correlation_id: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::from_domain(
            DomainError::validation("body", "a JSON body is required"),
            correlation_id,
        ));
    }
    serde_json::from_slice(body).map_err(|error| {
        ApiError::from_domain(
            DomainError::validation("body", format!("invalid JSON body: {error}")),
            correlation_id,
        )
    })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub requested_by: Option<String>,
    pub department: Option<String>,
    pub approver: Option<String>,
    pub purpose: Option<String>,
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub advance_id: Option<String>,
}

impl SubmitBody {
    fn into_draft(self, category: RequestCategory) -> RequestDraft {
        RequestDraft {
            line_items: self.line_items,
            requested_by: self.requested_by,
            department: self.department,
            approver: self.approver,
            purpose: self.purpose,
            leave_type: self.leave_type,
            start_date: self.start_date,
            end_date: self.end_date,
            ..RequestDraft::empty(category)
        }
    }

    fn into_retirement_details(self) -> RetirementDetails {
        RetirementDetails {
            line_items: self.line_items,
            requested_by: self.requested_by.unwrap_or_default(),
            department: self.department.unwrap_or_default(),
            approver: self.approver,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub vendor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub success: bool,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementResponse {
    pub success: bool,
    pub retirement_id: String,
}

/// Wire shape of a request; `totalAmount` is computed on every read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    pub category: RequestCategory,
    pub status: RequestStatus,
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub requested_by: String,
    pub department: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_retirement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leave_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl From<Request> for RequestView {
    fn from(request: Request) -> Self {
        let total_amount = request.total_amount();
        let category = request.category();
        let mut view = Self {
            id: request.id.0,
            category,
            status: request.status,
            line_items: request.line_items,
            total_amount,
            requested_by: request.requested_by,
            department: request.department,
            approver: request.approver,
            rejection_reason: request.rejection_reason,
            linked_vendor: None,
            purchase_order_id: None,
            purpose: None,
            has_retirement: None,
            advance_id: None,
            leave_type: None,
            start_date: None,
            end_date: None,
            created_at: request.created_at,
            updated_at: request.updated_at,
            decided_at: request.decided_at,
        };
        match request.kind {
            RequestKind::MaterialRequest { linked_vendor, purchase_order_id } => {
                view.linked_vendor = linked_vendor;
                view.purchase_order_id = purchase_order_id.map(|id| id.0);
            }
            RequestKind::Advance { purpose, has_retirement } => {
                view.purpose = Some(purpose);
                view.has_retirement = Some(has_retirement);
            }
            RequestKind::Retirement { advance_id } => view.advance_id = Some(advance_id.0),
            RequestKind::Leave { leave_type, start_date, end_date } => {
                view.leave_type = Some(leave_type);
                view.start_date = Some(start_date);
                view.end_date = Some(end_date);
            }
        }
        view
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderView {
    pub id: String,
    pub request_id: String,
    pub vendor: String,
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<PurchaseOrder> for PurchaseOrderView {
    fn from(order: PurchaseOrder) -> Self {
        Self {
            id: order.id.0,
            request_id: order.request_id.0,
            vendor: order.vendor,
            line_items: order.line_items,
            total_amount: order.total_amount,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    pub kind: FieldKind,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    /// Index into `recipients`; the first recipient when absent.
    pub recipient: Option<usize>,
    pub required: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentBody {
    #[serde(default)]
    pub file_name: String,
    pub page_count: u32,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub signing_mode: SigningMode,
    #[serde(default)]
    pub recipients: Vec<RecipientInput>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

impl CreateDocumentBody {
    /// Replays the composition on a fresh composer and sends it.
    fn compose(self, now: DateTime<Utc>) -> Result<SignatureDocument, DomainError> {
        let mut composer = DocumentComposer::default();
        composer.upload_document(&self.file_name, self.page_count)?;
        composer.set_subject(self.subject);
        composer.set_message(self.message);
        composer.set_signing_mode(self.signing_mode);

        let recipient_ids = self
            .recipients
            .into_iter()
            .map(|recipient| composer.add_recipient(recipient.name, recipient.email))
            .collect::<Vec<_>>();

        for field in self.fields {
            let assignee = match field.recipient {
                Some(index) => Assignee::Recipient(*recipient_ids.get(index).ok_or_else(|| {
                    DomainError::validation(
                        "fields.recipient",
                        format!("no recipient at index {index}"),
                    )
                })?),
                None => Assignee::FirstRecipient,
            };
            let field_id = composer.place_field(
                field.kind,
                field.page,
                FieldPosition::new(field.x, field.y),
                assignee,
            )?;
            if let Some(required) = field.required {
                composer.set_field_required(field_id, required)?;
            }
        }

        composer.send_request(now)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCreated {
    pub success: bool,
    pub id: String,
    pub snapshot_digest: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: String,
    pub file_name: String,
    pub page_count: u32,
    pub subject: String,
    pub message: String,
    pub signing_mode: SigningMode,
    pub status: DocumentStatus,
    pub recipients: Vec<Recipient>,
    pub fields: Vec<PlacedField>,
    pub next_signers: Vec<RecipientId>,
    pub snapshot_digest: String,
    pub snapshot_intact: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SignatureDocument> for DocumentView {
    fn from(document: SignatureDocument) -> Self {
        let next_signers = document.next_signers().iter().map(|recipient| recipient.id).collect();
        let snapshot_intact = document.verify_snapshot();
        Self {
            id: document.id.0,
            file_name: document.file_name,
            page_count: document.page_count,
            subject: document.subject,
            message: document.message,
            signing_mode: document.signing_mode,
            status: document.status,
            recipients: document.recipients,
            fields: document.fields,
            next_signers,
            snapshot_digest: document.snapshot_digest,
            snapshot_intact,
            created_at: document.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSaved {
    pub success: bool,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DraftDiscarded {
    pub success: bool,
    pub discarded: bool,
}

// ---------------------------------------------------------------------------
// Request handlers
// ---------------------------------------------------------------------------

async fn submit_request(
    Extension(category): Extension<RequestCategory>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RequestView>), ApiError> {
    let audit = audit_context(&headers);
    let correlation_id = audit.correlation_id.clone();
    let body: SubmitBody = json_body(&body, &correlation_id)?;

    let request = if category == RequestCategory::Retirement {
        let advance_id = body
            .advance_id
            .clone()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::from_domain(
                    DomainError::validation("advance_id", "advance_id is required"),
                    &correlation_id,
                )
            })?;
        state
            .workflow
            .submit_retirement(&RequestId(advance_id), body.into_retirement_details(), &audit)
            .await
            .map(|receipt| receipt.retirement)
    } else {
        match body.into_draft(category).into_new_request() {
            Ok(new_request) => state.workflow.submit(new_request, &audit).await,
            Err(error) => Err(ApplicationError::from(error)),
        }
    }
    .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(RequestView::from(request))))
}

async fn list_requests(
    Extension(category): Extension<RequestCategory>,
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequestView>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let status = match query.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Some(RequestStatus::parse(raw).ok_or_else(|| {
            ApiError::from_domain(
                DomainError::validation("status", format!("unknown status `{raw}`")),
                &correlation_id,
            )
        })?),
        None => None,
    };

    let requests = state
        .workflow
        .list(&RequestFilter::category(category).with_status(status))
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(requests.into_iter().map(RequestView::from).collect()))
}

async fn get_request(
    Extension(category): Extension<RequestCategory>,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestView>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = state
        .workflow
        .get(category, &RequestId(id))
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(RequestView::from(request)))
}

async fn approve_request(
    Extension(category): Extension<RequestCategory>,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DecisionResponse>, ApiError> {
    let audit = audit_context(&headers);
    let body: ApproveBody = optional_body(&body, &audit.correlation_id)?;

    let receipt = state
        .workflow
        .approve(category, &RequestId(id), body.vendor.as_deref(), &audit)
        .await
        .map_err(|error| ApiError::from_application(error, &audit.correlation_id))?;

    Ok(Json(DecisionResponse {
        success: true,
        status: receipt.request.status,
        purchase_order_id: receipt.purchase_order.map(|order| order.id.0),
    }))
}

async fn reject_request(
    Extension(category): Extension<RequestCategory>,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DecisionResponse>, ApiError> {
    let audit = audit_context(&headers);
    let body: RejectBody = optional_body(&body, &audit.correlation_id)?;

    let request = state
        .workflow
        .reject(category, &RequestId(id), &body.reason, &audit)
        .await
        .map_err(|error| ApiError::from_application(error, &audit.correlation_id))?;

    Ok(Json(DecisionResponse { success: true, status: request.status, purchase_order_id: None }))
}

async fn submit_retirement(
    State(state): State<ApiState>,
    Path(advance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RetirementResponse>), ApiError> {
    let audit = audit_context(&headers);
    let body: SubmitBody = json_body(&body, &audit.correlation_id)?;
    let receipt = state
        .workflow
        .submit_retirement(&RequestId(advance_id), body.into_retirement_details(), &audit)
        .await
        .map_err(|error| ApiError::from_application(error, &audit.correlation_id))?;

    Ok((
        StatusCode::CREATED,
        Json(RetirementResponse { success: true, retirement_id: receipt.retirement.id.0 }),
    ))
}

// ---------------------------------------------------------------------------
// Purchase orders
// ---------------------------------------------------------------------------

async fn list_purchase_orders(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PurchaseOrderView>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let orders = state
        .purchase_orders
        .list_purchase_orders()
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    Ok(Json(orders.into_iter().map(PurchaseOrderView::from).collect()))
}

async fn get_purchase_order(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PurchaseOrderView>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let order = state
        .purchase_orders
        .load_purchase_order(&PurchaseOrderId(id.clone()))
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?
        .ok_or_else(|| {
            ApiError::from_domain(DomainError::not_found("purchase order", id), &correlation_id)
        })?;
    Ok(Json(PurchaseOrderView::from(order)))
}

// ---------------------------------------------------------------------------
// Signature documents
// ---------------------------------------------------------------------------

async fn create_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentCreated>), ApiError> {
    let audit = audit_context(&headers);
    let body: CreateDocumentBody = json_body(&body, &audit.correlation_id)?;
    let document = body
        .compose(Utc::now())
        .map_err(|error| ApiError::from_domain(error, &audit.correlation_id))?;

    state
        .documents
        .save(document.clone())
        .await
        .map_err(|error| ApiError::from_application(error.into(), &audit.correlation_id))?;

    state.audit.emit(
        AuditEvent::from_context(
            &audit,
            "composer.document_sent",
            AuditCategory::Composer,
            AuditOutcome::Success,
        )
        .with_metadata("document_id", document.id.0.as_str())
        .with_metadata("recipients", document.recipients.len().to_string())
        .with_metadata("signing_mode", document.signing_mode.as_str()),
    );

    Ok((
        StatusCode::CREATED,
        Json(DocumentCreated {
            success: true,
            id: document.id.0,
            snapshot_digest: document.snapshot_digest,
        }),
    ))
}

async fn get_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DocumentView>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let document = state
        .documents
        .load(&DocumentId(id.clone()))
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?
        .ok_or_else(|| ApiError::from_domain(DomainError::not_found("document", id), &correlation_id))?;
    Ok(Json(DocumentView::from(document)))
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

fn form_key(raw: &str, correlation_id: &str) -> Result<FormKey, ApiError> {
    FormKey::parse(raw).map_err(|error| ApiError::from_domain(error, correlation_id))
}

async fn load_draft(
    State(state): State<ApiState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestDraft>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let key = form_key(&raw_key, &correlation_id)?;
    let draft = state
        .workflow
        .drafts()
        .load(&key)
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?
        .ok_or_else(|| {
            ApiError::from_domain(DomainError::not_found("draft", key.as_str()), &correlation_id)
        })?;
    Ok(Json(draft))
}

async fn save_draft(
    State(state): State<ApiState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DraftSaved>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let key = form_key(&raw_key, &correlation_id)?;
    let mut draft: RequestDraft = json_body(&body, &correlation_id)?;
    draft.saved_at = Utc::now();

    state
        .workflow
        .drafts()
        .save(&key, &draft)
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    Ok(Json(DraftSaved { success: true, saved_at: draft.saved_at }))
}

async fn discard_draft(
    State(state): State<ApiState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DraftDiscarded>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let key = form_key(&raw_key, &correlation_id)?;
    let discarded = state
        .workflow
        .drafts()
        .discard(&key)
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    Ok(Json(DraftDiscarded { success: true, discarded }))
}

async fn submit_draft(
    State(state): State<ApiState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<RequestView>), ApiError> {
    let audit = audit_context(&headers);
    let key = form_key(&raw_key, &audit.correlation_id)?;
    let request = state
        .workflow
        .submit_draft(&key, &audit)
        .await
        .map_err(|error| ApiError::from_application(error, &audit.correlation_id))?;
    Ok((StatusCode::CREATED, Json(RequestView::from(request))))
}
