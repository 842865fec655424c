use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::purchase_order::PurchaseOrderId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate(category: RequestCategory) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", category.id_prefix(), &suffix[..12]))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Discriminant of [`RequestKind`], used for routing, filtering and storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    MaterialRequest,
    Advance,
    Retirement,
    Leave,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 4] =
        [Self::MaterialRequest, Self::Advance, Self::Retirement, Self::Leave];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "material_request",
            Self::Advance => "advance",
            Self::Retirement => "retirement",
            Self::Leave => "leave",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "material_request" => Some(Self::MaterialRequest),
            "advance" => Some(Self::Advance),
            "retirement" => Some(Self::Retirement),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "material request",
            Self::Advance => "advance",
            Self::Retirement => "retirement",
            Self::Leave => "leave request",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "MR",
            Self::Advance => "ADV",
            Self::Retirement => "RET",
            Self::Leave => "LV",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    MaterialRequest {
        linked_vendor: Option<String>,
        purchase_order_id: Option<PurchaseOrderId>,
    },
    Advance {
        purpose: String,
        has_retirement: bool,
    },
    Retirement {
        advance_id: RequestId,
    },
    Leave {
        leave_type: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

impl RequestKind {
    pub fn category(&self) -> RequestCategory {
        match self {
            Self::MaterialRequest { .. } => RequestCategory::MaterialRequest,
            Self::Advance { .. } => RequestCategory::Advance,
            Self::Retirement { .. } => RequestCategory::Retirement,
            Self::Leave { .. } => RequestCategory::Leave,
        }
    }
}

/// One requested line. Numeric inputs are read leniently: anything missing or
/// non-numeric counts as zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity: Decimal,
    #[serde(default)]
    pub quantity_type: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity.saturating_mul(self.amount)
    }
}

pub fn total_amount(lines: &[LineItem]) -> Decimal {
    lines.iter().fold(Decimal::ZERO, |total, line| total.saturating_add(line.line_total()))
}

/// Reads a decimal from a JSON number or numeric string; everything else is zero.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(decimal_from_json).unwrap_or(Decimal::ZERO))
}

pub fn decimal_from_json(value: &Value) -> Decimal {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Decimal::from(integer)
            } else if let Some(unsigned) = number.as_u64() {
                Decimal::from(unsigned)
            } else {
                number.as_f64().and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO)
            }
        }
        Value::String(raw) => raw.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub status: RequestStatus,
    pub kind: RequestKind,
    pub line_items: Vec<LineItem>,
    pub requested_by: String,
    pub department: String,
    pub approver: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Request {
    pub fn category(&self) -> RequestCategory {
        self.kind.category()
    }

    /// Sum of `quantity * amount` over all lines, recomputed on every call.
    pub fn total_amount(&self) -> Decimal {
        total_amount(&self.line_items)
    }

    pub fn linked_vendor(&self) -> Option<&str> {
        match &self.kind {
            RequestKind::MaterialRequest { linked_vendor, .. } => linked_vendor.as_deref(),
            _ => None,
        }
    }

    pub fn has_retirement(&self) -> bool {
        matches!(self.kind, RequestKind::Advance { has_retirement: true, .. })
    }
}

/// Kind-specific input accepted at submission time. Retirements are not
/// listed: they are only created against an approved advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionKind {
    MaterialRequest,
    Advance { purpose: String },
    Leave { leave_type: String, start_date: NaiveDate, end_date: NaiveDate },
}

impl SubmissionKind {
    pub fn category(&self) -> RequestCategory {
        match self {
            Self::MaterialRequest => RequestCategory::MaterialRequest,
            Self::Advance { .. } => RequestCategory::Advance,
            Self::Leave { .. } => RequestCategory::Leave,
        }
    }

    fn into_request_kind(self) -> Result<RequestKind, DomainError> {
        match self {
            Self::MaterialRequest => {
                Ok(RequestKind::MaterialRequest { linked_vendor: None, purchase_order_id: None })
            }
            Self::Advance { purpose } => {
                let purpose = required_text("purpose", &purpose)?;
                Ok(RequestKind::Advance { purpose, has_retirement: false })
            }
            Self::Leave { leave_type, start_date, end_date } => {
                let leave_type = required_text("leave_type", &leave_type)?;
                if end_date < start_date {
                    return Err(DomainError::validation(
                        "end_date",
                        "leave must not end before it starts",
                    ));
                }
                Ok(RequestKind::Leave { leave_type, start_date, end_date })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub kind: SubmissionKind,
    pub line_items: Vec<LineItem>,
    pub requested_by: String,
    pub department: String,
    pub approver: Option<String>,
}

impl NewRequest {
    /// Builds the pending record for this submission.
    pub fn into_request(self, now: DateTime<Utc>) -> Result<Request, DomainError> {
        let category = self.kind.category();
        let requested_by = required_text("requested_by", &self.requested_by)?;
        let department = required_text("department", &self.department)?;
        let kind = self.kind.into_request_kind()?;

        Ok(Request {
            id: RequestId::generate(category),
            status: RequestStatus::Pending,
            kind,
            line_items: self.line_items,
            requested_by,
            department,
            approver: optional_text(self.approver),
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        })
    }
}

/// Input for a retirement filed against an approved advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementDetails {
    pub line_items: Vec<LineItem>,
    pub requested_by: String,
    pub department: String,
    pub approver: Option<String>,
}

impl RetirementDetails {
    pub fn into_request(
        self,
        advance_id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<Request, DomainError> {
        let requested_by = required_text("requested_by", &self.requested_by)?;
        let department = required_text("department", &self.department)?;

        Ok(Request {
            id: RequestId::generate(RequestCategory::Retirement),
            status: RequestStatus::Pending,
            kind: RequestKind::Retirement { advance_id },
            line_items: self.line_items,
            requested_by,
            department,
            approver: optional_text(self.approver),
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        })
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
