//! Persistence boundary consumed by the workflow service.
//!
//! The store is treated as an opaque key-value service: no retries, caching or
//! transactions happen on this side. A transition that creates a linked record
//! goes through [`RequestStore::save_with_linked`], which the implementation
//! must apply all-or-nothing. Any failure is surfaced as a [`StoreError`] and
//! becomes a remote error for the caller.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
use crate::domain::request::{Request, RequestCategory, RequestId, RequestKind, RequestStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
    #[error("store rejected write: {0}")]
    Conflict(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub category: Option<RequestCategory>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn category(category: RequestCategory) -> Self {
        Self { category: Some(category), status: None }
    }

    pub fn with_status(mut self, status: Option<RequestStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.category.map(|category| category == request.category()).unwrap_or(true)
            && self.status.map(|status| status == request.status).unwrap_or(true)
    }
}

/// Records created as a side effect of a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkedRecord {
    PurchaseOrder(PurchaseOrder),
    Retirement(Request),
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, StoreError>;
    async fn save(&self, request: Request) -> Result<(), StoreError>;
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;
    async fn create_linked(&self, record: LinkedRecord) -> Result<(), StoreError>;
    /// Saves `request` and creates `record` as one unit. On error neither is
    /// visible to later reads.
    async fn save_with_linked(
        &self,
        request: Request,
        record: LinkedRecord,
    ) -> Result<(), StoreError>;
}

/// Read side for purchase orders raised by approvals.
#[async_trait]
pub trait PurchaseOrderStore: Send + Sync {
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, StoreError>;
    async fn load_purchase_order(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<BTreeMap<RequestId, Request>>,
    purchase_orders: RwLock<Vec<PurchaseOrder>>,
    fail_writes: AtomicBool,
    fail_links: AtomicBool,
}

impl InMemoryRequestStore {
    pub async fn insert(&self, request: Request) {
        self.requests.write().await.insert(request.id.clone(), request);
    }

    pub async fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        self.purchase_orders.read().await.clone()
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes linked-record creation fail while plain saves keep working.
    pub fn set_fail_links(&self, fail: bool) {
        self.fail_links.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }

    fn check_linkable(&self) -> Result<(), StoreError> {
        self.check_writable()?;
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("linked records are disabled".to_string()));
        }
        Ok(())
    }

    /// Writes `request` (if any) and `record` while holding both locks, after
    /// every conflict check has passed.
    async fn write_linked(
        &self,
        request: Option<Request>,
        record: LinkedRecord,
    ) -> Result<(), StoreError> {
        self.check_linkable()?;
        let mut requests = self.requests.write().await;
        let mut orders = self.purchase_orders.write().await;

        match &record {
            LinkedRecord::PurchaseOrder(order) => {
                if orders.iter().any(|existing| existing.request_id == order.request_id) {
                    return Err(StoreError::Conflict(format!(
                        "request `{}` already has a purchase order",
                        order.request_id
                    )));
                }
            }
            LinkedRecord::Retirement(retirement) => {
                let advance_id = retirement_advance(retirement);
                if requests.values().any(|existing| {
                    existing.id != retirement.id && retirement_advance(existing) == advance_id
                }) {
                    return Err(StoreError::Conflict(format!(
                        "advance `{}` already has a retirement",
                        advance_id.map(|id| id.0.as_str()).unwrap_or("")
                    )));
                }
            }
        }

        if let Some(request) = request {
            requests.insert(request.id.clone(), request);
        }
        match record {
            LinkedRecord::PurchaseOrder(order) => orders.push(order),
            LinkedRecord::Retirement(retirement) => {
                requests.insert(retirement.id.clone(), retirement);
            }
        }
        Ok(())
    }
}

fn retirement_advance(request: &Request) -> Option<&RequestId> {
    match &request.kind {
        RequestKind::Retirement { advance_id } => Some(advance_id),
        _ => None,
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.requests.read().await.get(id).cloned())
    }

    async fn save(&self, request: Request) -> Result<(), StoreError> {
        self.check_writable()?;
        self.insert(request).await;
        Ok(())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let requests = self.requests.read().await;
        let mut matching =
            requests.values().filter(|request| filter.matches(request)).cloned().collect::<Vec<_>>();
        matching.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(matching)
    }

    async fn create_linked(&self, record: LinkedRecord) -> Result<(), StoreError> {
        self.write_linked(None, record).await
    }

    async fn save_with_linked(
        &self,
        request: Request,
        record: LinkedRecord,
    ) -> Result<(), StoreError> {
        self.write_linked(Some(request), record).await
    }
}

#[async_trait]
impl PurchaseOrderStore for InMemoryRequestStore {
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, StoreError> {
        Ok(self.purchase_orders().await)
    }

    async fn load_purchase_order(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(self.purchase_orders.read().await.iter().find(|order| &order.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{
        InMemoryRequestStore, LinkedRecord, PurchaseOrderStore, RequestFilter, RequestStore,
        StoreError,
    };
    use crate::domain::purchase_order::PurchaseOrder;
    use crate::domain::request::{
        NewRequest, Request, RequestCategory, RequestKind, RequestStatus, RetirementDetails,
        SubmissionKind,
    };

    fn request(kind: SubmissionKind, minutes_ago: i64) -> Request {
        NewRequest {
            kind,
            line_items: Vec::new(),
            requested_by: "Femi".to_string(),
            department: "Logistics".to_string(),
            approver: None,
        }
        .into_request(Utc::now() - Duration::minutes(minutes_ago))
        .expect("valid request")
    }

    #[tokio::test]
    async fn list_applies_filter_in_creation_order() {
        let store = InMemoryRequestStore::default();
        let newer = request(SubmissionKind::MaterialRequest, 1);
        let older = request(SubmissionKind::MaterialRequest, 10);
        let advance = request(SubmissionKind::Advance { purpose: "per diem".to_string() }, 5);
        for item in [newer.clone(), older.clone(), advance.clone()] {
            store.save(item).await.expect("save");
        }

        let materials = store
            .list(&RequestFilter::category(RequestCategory::MaterialRequest))
            .await
            .expect("list");
        assert_eq!(materials.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), vec![older.id, newer.id]);

        let approved = store
            .list(&RequestFilter::default().with_status(Some(RequestStatus::Approved)))
            .await
            .expect("list");
        assert!(approved.is_empty());
        assert_eq!(store.list(&RequestFilter::default()).await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn second_purchase_order_for_a_request_conflicts() {
        let store = InMemoryRequestStore::default();
        let material = request(SubmissionKind::MaterialRequest, 0);
        let first = PurchaseOrder::for_request(&material, "VendorX", Utc::now());
        let second = PurchaseOrder::for_request(&material, "VendorY", Utc::now());

        store.create_linked(LinkedRecord::PurchaseOrder(first.clone())).await.expect("first");
        let error = store
            .create_linked(LinkedRecord::PurchaseOrder(second))
            .await
            .expect_err("duplicate");
        assert!(matches!(error, StoreError::Conflict(_)));

        assert_eq!(store.load_purchase_order(&first.id).await.expect("load"), Some(first));
        assert_eq!(store.list_purchase_orders().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn failing_writes_leave_reads_intact() {
        let store = InMemoryRequestStore::default();
        let material = request(SubmissionKind::MaterialRequest, 0);
        store.save(material.clone()).await.expect("save");
        store.set_fail_writes(true);

        let error = store.save(material.clone()).await.expect_err("writes disabled");
        assert!(matches!(error, StoreError::Unavailable(_)));
        assert_eq!(store.load(&material.id).await.expect("load"), Some(material));
    }

    #[tokio::test]
    async fn failed_linked_write_keeps_the_request_unchanged() {
        let store = InMemoryRequestStore::default();
        let material = request(SubmissionKind::MaterialRequest, 0);
        store.save(material.clone()).await.expect("save");

        let order = PurchaseOrder::for_request(&material, "VendorX", Utc::now());
        let mut approved = material.clone();
        approved.status = RequestStatus::Approved;
        approved.kind = RequestKind::MaterialRequest {
            linked_vendor: Some("VendorX".to_string()),
            purchase_order_id: Some(order.id.clone()),
        };

        store.set_fail_links(true);
        let error = store
            .save_with_linked(approved.clone(), LinkedRecord::PurchaseOrder(order.clone()))
            .await
            .expect_err("links disabled");
        assert!(matches!(error, StoreError::Unavailable(_)));
        assert_eq!(store.load(&material.id).await.expect("load"), Some(material.clone()));
        assert!(store.purchase_orders().await.is_empty());

        store.set_fail_links(false);
        store
            .save_with_linked(approved.clone(), LinkedRecord::PurchaseOrder(order))
            .await
            .expect("linked write");
        assert_eq!(store.load(&material.id).await.expect("load"), Some(approved));
        assert_eq!(store.purchase_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn second_retirement_for_an_advance_conflicts_without_touching_it() {
        let store = InMemoryRequestStore::default();
        let advance = request(SubmissionKind::Advance { purpose: "fuel".to_string() }, 0);
        store.save(advance.clone()).await.expect("save");
        let details = RetirementDetails {
            line_items: Vec::new(),
            requested_by: "Femi".to_string(),
            department: "Logistics".to_string(),
            approver: None,
        };
        let first = details.clone().into_request(advance.id.clone(), Utc::now()).expect("first");
        let second = details.into_request(advance.id.clone(), Utc::now()).expect("second");
        store.create_linked(LinkedRecord::Retirement(first)).await.expect("first retirement");

        let mut retired = advance.clone();
        retired.kind = RequestKind::Advance { purpose: "fuel".to_string(), has_retirement: true };
        let error = store
            .save_with_linked(retired, LinkedRecord::Retirement(second))
            .await
            .expect_err("duplicate retirement");
        assert!(matches!(error, StoreError::Conflict(_)));
        assert_eq!(store.load(&advance.id).await.expect("load"), Some(advance));
    }
}
