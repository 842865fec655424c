use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use steps_core::domain::purchase_order::{PurchaseOrder, PurchaseOrderId};
use steps_core::domain::request::{LineItem, RequestId};
use steps_core::store::{PurchaseOrderStore, StoreError};

use super::request::{parse_decimal, parse_timestamp, SqlRequestStore};
use super::RepositoryError;
use crate::DbPool;

const PURCHASE_ORDER_COLUMNS: &str =
    "id, request_id, vendor, line_items_json, total_amount, created_at";

pub(super) async fn insert(
    conn: &mut SqliteConnection,
    order: &PurchaseOrder,
) -> Result<(), RepositoryError> {
    let line_items_json =
        serde_json::to_string(&order.line_items).map_err(RepositoryError::decode)?;

    sqlx::query(
        "INSERT INTO purchase_order (id, request_id, vendor, line_items_json, total_amount, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id.0)
    .bind(&order.request_id.0)
    .bind(&order.vendor)
    .bind(line_items_json)
    .bind(order.total_amount.to_string())
    .bind(order.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

pub(super) async fn find_by_id(
    pool: &DbPool,
    id: &PurchaseOrderId,
) -> Result<Option<PurchaseOrder>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {PURCHASE_ORDER_COLUMNS} FROM purchase_order WHERE id = ?"
    ))
    .bind(&id.0)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_purchase_order).transpose()
}

pub(super) async fn list_all(pool: &DbPool) -> Result<Vec<PurchaseOrder>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {PURCHASE_ORDER_COLUMNS} FROM purchase_order ORDER BY created_at ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_purchase_order).collect()
}

fn row_to_purchase_order(row: &SqliteRow) -> Result<PurchaseOrder, RepositoryError> {
    let id: String = row.try_get("id").map_err(RepositoryError::decode)?;
    let request_id: String = row.try_get("request_id").map_err(RepositoryError::decode)?;
    let line_items_json: String = row.try_get("line_items_json").map_err(RepositoryError::decode)?;
    let total_amount: String = row.try_get("total_amount").map_err(RepositoryError::decode)?;
    let created_at: String = row.try_get("created_at").map_err(RepositoryError::decode)?;

    let line_items: Vec<LineItem> =
        serde_json::from_str(&line_items_json).map_err(RepositoryError::decode)?;

    Ok(PurchaseOrder {
        id: PurchaseOrderId(id),
        request_id: RequestId(request_id),
        vendor: row.try_get("vendor").map_err(RepositoryError::decode)?,
        line_items,
        total_amount: parse_decimal(&total_amount)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl PurchaseOrderStore for SqlRequestStore {
    async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrder>, StoreError> {
        Ok(list_all(&self.pool).await?)
    }

    async fn load_purchase_order(
        &self,
        id: &PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(find_by_id(&self.pool, id).await?)
    }
}
