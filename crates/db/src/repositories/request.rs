use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use steps_core::domain::purchase_order::PurchaseOrderId;
use steps_core::domain::request::{
    LineItem, Request, RequestCategory, RequestId, RequestKind, RequestStatus,
};
use steps_core::store::{LinkedRecord, RequestFilter, RequestStore, StoreError};

use super::{purchase_order, RepositoryError};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, category, status, requested_by, department, approver,
    rejection_reason, linked_vendor, purchase_order_id, purpose, has_retirement, advance_id,
    leave_type, start_date, end_date, created_at, updated_at, decided_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// [`RequestStore`] over the `request` and `request_line` tables.
#[derive(Clone)]
pub struct SqlRequestStore {
    pub(super) pool: DbPool,
}

impl SqlRequestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => {
                let lines = self.lines_for(id).await?;
                Ok(Some(row_to_request(row, lines)?))
            }
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, request: &Request) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        write_request(&mut tx, request).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Writes the linked record and then `request` in one transaction. The
    /// linked insert runs first so a uniqueness conflict leaves `request`
    /// untouched.
    pub async fn upsert_with_linked(
        &self,
        request: Option<&Request>,
        record: &LinkedRecord,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        match record {
            LinkedRecord::PurchaseOrder(order) => purchase_order::insert(&mut tx, order).await?,
            LinkedRecord::Retirement(retirement) => write_request(&mut tx, retirement).await?,
        }
        if let Some(request) = request {
            write_request(&mut tx, request).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_matching(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<Request>, RepositoryError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {REQUEST_COLUMNS} FROM request WHERE 1 = 1"));
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at ASC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(RepositoryError::decode)?;
            let lines = self.lines_for(&RequestId(id)).await?;
            requests.push(row_to_request(row, lines)?);
        }
        Ok(requests)
    }

    async fn lines_for(&self, id: &RequestId) -> Result<Vec<LineItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT item_name, quantity, quantity_type, amount, description
             FROM request_line WHERE request_id = ? ORDER BY position ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect()
    }
}

#[async_trait]
impl RequestStore for SqlRequestStore {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.find_by_id(id).await?)
    }

    async fn save(&self, request: Request) -> Result<(), StoreError> {
        Ok(self.upsert(&request).await?)
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        Ok(self.find_matching(filter).await?)
    }

    async fn create_linked(&self, record: LinkedRecord) -> Result<(), StoreError> {
        Ok(self.upsert_with_linked(None, &record).await?)
    }

    async fn save_with_linked(
        &self,
        request: Request,
        record: LinkedRecord,
    ) -> Result<(), StoreError> {
        Ok(self.upsert_with_linked(Some(&request), &record).await?)
    }
}

async fn write_request(
    conn: &mut SqliteConnection,
    request: &Request,
) -> Result<(), RepositoryError> {
    let columns = KindColumns::from(&request.kind);

    sqlx::query(
        "INSERT INTO request (id, category, status, requested_by, department, approver,
                              rejection_reason, linked_vendor, purchase_order_id, purpose,
                              has_retirement, advance_id, leave_type, start_date, end_date,
                              created_at, updated_at, decided_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             status = excluded.status,
             rejection_reason = excluded.rejection_reason,
             linked_vendor = excluded.linked_vendor,
             purchase_order_id = excluded.purchase_order_id,
             has_retirement = excluded.has_retirement,
             updated_at = excluded.updated_at,
             decided_at = excluded.decided_at",
    )
    .bind(&request.id.0)
    .bind(request.category().as_str())
    .bind(request.status.as_str())
    .bind(&request.requested_by)
    .bind(&request.department)
    .bind(&request.approver)
    .bind(&request.rejection_reason)
    .bind(columns.linked_vendor)
    .bind(columns.purchase_order_id)
    .bind(columns.purpose)
    .bind(columns.has_retirement)
    .bind(columns.advance_id)
    .bind(columns.leave_type)
    .bind(columns.start_date)
    .bind(columns.end_date)
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .bind(request.decided_at.map(|at| at.to_rfc3339()))
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM request_line WHERE request_id = ?")
        .bind(&request.id.0)
        .execute(&mut *conn)
        .await?;

    for (position, line) in request.line_items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO request_line (request_id, position, item_name, quantity,
                                       quantity_type, amount, description)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .bind(&line.item_name)
        .bind(line.quantity.to_string())
        .bind(&line.quantity_type)
        .bind(line.amount.to_string())
        .bind(&line.description)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Kind-specific columns of a request row.
#[derive(Default)]
struct KindColumns {
    linked_vendor: Option<String>,
    purchase_order_id: Option<String>,
    purpose: Option<String>,
    has_retirement: bool,
    advance_id: Option<String>,
    leave_type: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl From<&RequestKind> for KindColumns {
    fn from(kind: &RequestKind) -> Self {
        match kind {
            RequestKind::MaterialRequest { linked_vendor, purchase_order_id } => Self {
                linked_vendor: linked_vendor.clone(),
                purchase_order_id: purchase_order_id.as_ref().map(|id| id.0.clone()),
                ..Self::default()
            },
            RequestKind::Advance { purpose, has_retirement } => Self {
                purpose: Some(purpose.clone()),
                has_retirement: *has_retirement,
                ..Self::default()
            },
            RequestKind::Retirement { advance_id } => {
                Self { advance_id: Some(advance_id.0.clone()), ..Self::default() }
            }
            RequestKind::Leave { leave_type, start_date, end_date } => Self {
                leave_type: Some(leave_type.clone()),
                start_date: Some(start_date.format(DATE_FORMAT).to_string()),
                end_date: Some(end_date.format(DATE_FORMAT).to_string()),
                ..Self::default()
            },
        }
    }
}

fn row_to_request(row: &SqliteRow, line_items: Vec<LineItem>) -> Result<Request, RepositoryError> {
    let id: String = row.try_get("id").map_err(RepositoryError::decode)?;
    let category_str: String = row.try_get("category").map_err(RepositoryError::decode)?;
    let status_str: String = row.try_get("status").map_err(RepositoryError::decode)?;
    let created_at: String = row.try_get("created_at").map_err(RepositoryError::decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(RepositoryError::decode)?;
    let decided_at: Option<String> = row.try_get("decided_at").map_err(RepositoryError::decode)?;

    let category = RequestCategory::parse(&category_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request category `{category_str}`")))?;
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{status_str}`")))?;

    Ok(Request {
        kind: row_to_kind(row, category, &id)?,
        id: RequestId(id),
        status,
        line_items,
        requested_by: row.try_get("requested_by").map_err(RepositoryError::decode)?,
        department: row.try_get("department").map_err(RepositoryError::decode)?,
        approver: row.try_get("approver").map_err(RepositoryError::decode)?,
        rejection_reason: row.try_get("rejection_reason").map_err(RepositoryError::decode)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        decided_at: decided_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn row_to_kind(
    row: &SqliteRow,
    category: RequestCategory,
    id: &str,
) -> Result<RequestKind, RepositoryError> {
    let required = |column: &str| -> Result<String, RepositoryError> {
        let value: Option<String> = row.try_get(column).map_err(RepositoryError::decode)?;
        value.ok_or_else(|| RepositoryError::Decode(format!("request `{id}` is missing `{column}`")))
    };

    match category {
        RequestCategory::MaterialRequest => {
            let purchase_order_id: Option<String> =
                row.try_get("purchase_order_id").map_err(RepositoryError::decode)?;
            Ok(RequestKind::MaterialRequest {
                linked_vendor: row.try_get("linked_vendor").map_err(RepositoryError::decode)?,
                purchase_order_id: purchase_order_id.map(PurchaseOrderId),
            })
        }
        RequestCategory::Advance => {
            let has_retirement: i64 =
                row.try_get("has_retirement").map_err(RepositoryError::decode)?;
            Ok(RequestKind::Advance { purpose: required("purpose")?, has_retirement: has_retirement != 0 })
        }
        RequestCategory::Retirement => {
            Ok(RequestKind::Retirement { advance_id: RequestId(required("advance_id")?) })
        }
        RequestCategory::Leave => Ok(RequestKind::Leave {
            leave_type: required("leave_type")?,
            start_date: parse_date(&required("start_date")?)?,
            end_date: parse_date(&required("end_date")?)?,
        }),
    }
}

fn row_to_line(row: &SqliteRow) -> Result<LineItem, RepositoryError> {
    let quantity: String = row.try_get("quantity").map_err(RepositoryError::decode)?;
    let amount: String = row.try_get("amount").map_err(RepositoryError::decode)?;

    Ok(LineItem {
        item_name: row.try_get("item_name").map_err(RepositoryError::decode)?,
        quantity: parse_decimal(&quantity)?,
        quantity_type: row.try_get("quantity_type").map_err(RepositoryError::decode)?,
        amount: parse_decimal(&amount)?,
        description: row.try_get("description").map_err(RepositoryError::decode)?,
    })
}

pub(super) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

pub(super) fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal `{value}`: {error}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("invalid date `{value}`: {error}")))
}
