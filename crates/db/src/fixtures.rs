use sqlx::Executor;

use steps_core::domain::request::RequestId;
use steps_core::store::RequestStore;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlRequestStore};

/// Seeded request scenarios and the facts `verify` checks for each.
const SEED_SCENARIOS: &[SeedScenario] = &[
    SeedScenario {
        scenario: "material_pending",
        request_id: "MR-seed-001",
        category: "material_request",
        status: "pending",
        expected_line_count: 2,
        purchase_order_id: None,
        description: "Material request awaiting a decision",
    },
    SeedScenario {
        scenario: "material_approved",
        request_id: "MR-seed-002",
        category: "material_request",
        status: "approved",
        expected_line_count: 1,
        purchase_order_id: Some("PO-seed-001"),
        description: "Approved material request with its purchase order",
    },
    SeedScenario {
        scenario: "advance_retirable",
        request_id: "ADV-seed-001",
        category: "advance",
        status: "approved",
        expected_line_count: 1,
        purchase_order_id: None,
        description: "Approved advance with no retirement filed yet",
    },
    SeedScenario {
        scenario: "leave_rejected",
        request_id: "LV-seed-001",
        category: "leave",
        status: "rejected",
        expected_line_count: 0,
        purchase_order_id: None,
        description: "Rejected leave request with a recorded reason",
    },
];

const SEED_AUDIT_EVENT_IDS: &[&str] = &["ae-seed-001", "ae-seed-002", "ae-seed-003", "ae-seed-004"];

const SEED_PURCHASE_ORDER_IDS: &[&str] = &["PO-seed-001"];

pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let scenarios_seeded = SEED_SCENARIOS
            .iter()
            .map(|scenario| ScenarioSeedInfo {
                scenario: scenario.scenario,
                request_id: scenario.request_id,
                description: scenario.description,
            })
            .collect();

        Ok(SeedResult { scenarios_seeded })
    }

    /// Checks that every seeded record is present and still in its seeded
    /// shape. Also decodes each request through [`SqlRequestStore`] so a seed
    /// file that drifts from the schema fails here.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();
        let store = SqlRequestStore::new(pool.clone());

        let audit_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM audit_event WHERE id IN {}",
            sql_array_from_ids(SEED_AUDIT_EVENT_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("audit-events", audit_count == SEED_AUDIT_EVENT_IDS.len() as i64));

        for scenario in SEED_SCENARIOS {
            let status_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM request WHERE id = ?1 AND category = ?2 AND status = ?3)",
            )
            .bind(scenario.request_id)
            .bind(scenario.category)
            .bind(scenario.status)
            .fetch_one(pool)
            .await?;
            checks.push((scenario.scenario, status_ok == 1));

            let line_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM request_line WHERE request_id = ?1")
                    .bind(scenario.request_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((scenario.request_id, line_count == scenario.expected_line_count));

            let decoded = store
                .load(&RequestId(scenario.request_id.to_string()))
                .await
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            checks.push(("decodes", decoded.is_some()));

            if let Some(purchase_order_id) = scenario.purchase_order_id {
                let linked: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM request r JOIN purchase_order po ON po.request_id = r.id
                     WHERE r.id = ?1 AND po.id = ?2 AND r.purchase_order_id = po.id)",
                )
                .bind(scenario.request_id)
                .bind(purchase_order_id)
                .fetch_one(pool)
                .await?;
                checks.push((purchase_order_id, linked == 1));
            }
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let request_ids = SEED_SCENARIOS.iter().map(|scenario| scenario.request_id).collect::<Vec<_>>();
        let quoted_requests = sql_array_from_ids(&request_ids);
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM audit_event WHERE id IN {}",
            sql_array_from_ids(SEED_AUDIT_EVENT_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM purchase_order WHERE id IN {} OR request_id IN {quoted_requests}",
            sql_array_from_ids(SEED_PURCHASE_ORDER_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM request WHERE advance_id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM request_line WHERE request_id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM request WHERE id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedScenario {
    scenario: &'static str,
    request_id: &'static str,
    category: &'static str,
    status: &'static str,
    expected_line_count: i64,
    purchase_order_id: Option<&'static str>,
    description: &'static str,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub scenarios_seeded: Vec<ScenarioSeedInfo>,
}

#[derive(Debug)]
pub struct ScenarioSeedInfo {
    pub scenario: &'static str,
    pub request_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
