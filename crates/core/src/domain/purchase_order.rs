use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{Request, RequestId, LineItem};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseOrderId(pub String);

impl PurchaseOrderId {
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("PO-{}", &suffix[..12]))
    }
}

/// Raised when a material request is approved; carries the vendor chosen at
/// approval and a copy of the request lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub request_id: RequestId,
    pub vendor: String,
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn for_request(request: &Request, vendor: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PurchaseOrderId::generate(),
            request_id: request.id.clone(),
            vendor: vendor.into(),
            line_items: request.line_items.clone(),
            total_amount: request.total_amount(),
            created_at: now,
        }
    }
}
