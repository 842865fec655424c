use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use steps_core::domain::request::{RequestCategory, RequestId, RequestStatus};
use steps_core::store::{PurchaseOrderStore, RequestStore};
use steps_db::{connect_with_settings, migrations, SeedDataset, SqlRequestStore};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

#[derive(Debug, Deserialize)]
struct SeedScenarioContract {
    scenario: String,
    request_id: String,
    category: String,
    status: String,
    expected_line_count: usize,
    expected_total: String,
    purchase_order_id: Option<String>,
    expected_audit_events: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedContract {
    dataset_version: String,
    seed_dataset: String,
    scenarios: Vec<SeedScenarioContract>,
}

fn contract() -> SeedContractTestResult<SeedContract> {
    serde_json::from_str(include_str!("../../../config/fixtures/seed_contract.json"))
        .map_err(|error| format!("seed contract JSON must parse: {error}"))
}

#[test]
fn seed_contract_matches_seed_sql_fixture() -> SeedContractTestResult {
    let fixture_sql = SeedDataset::SQL;
    let contract = contract()?;
    let mut scenarios_seen = HashSet::new();

    require_eq!(contract.dataset_version, "2026-03-seed-1");
    require_eq!(contract.seed_dataset, "deterministic_request_scenarios");
    require_eq!(contract.scenarios.len(), 4);

    for scenario in &contract.scenarios {
        require!(
            scenarios_seen.insert(scenario.scenario.clone()),
            "duplicate scenario: {}",
            scenario.scenario
        );
        require!(
            RequestCategory::parse(&scenario.category).is_some(),
            "unknown category {} in {}",
            scenario.category,
            scenario.scenario
        );
        require!(
            RequestStatus::parse(&scenario.status).is_some(),
            "unknown status {} in {}",
            scenario.status,
            scenario.scenario
        );
        require!(
            fixture_sql.contains(&format!(
                "('{}', '{}', '{}'",
                scenario.request_id, scenario.category, scenario.status
            )),
            "seed SQL fixture should insert {} as {} {}",
            scenario.request_id,
            scenario.category,
            scenario.status
        );
        require!(!scenario.expected_audit_events.is_empty());
        for event_type in &scenario.expected_audit_events {
            require!(
                fixture_sql.contains(&format!("'{}', 'seed-corr", scenario.request_id))
                    && fixture_sql.contains(event_type.as_str()),
                "seed SQL fixture should include {} for {}",
                event_type,
                scenario.request_id
            );
        }
        if let Some(purchase_order_id) = &scenario.purchase_order_id {
            require!(
                fixture_sql.contains(&format!("('{}', '{}'", purchase_order_id, scenario.request_id)),
                "purchase order {} should reference {}",
                purchase_order_id,
                scenario.request_id
            );
        }
    }

    for expected in ["material_pending", "material_approved", "advance_retirable", "leave_rejected"] {
        require!(scenarios_seen.contains(expected), "missing scenario: {expected}");
    }
    Ok(())
}

#[tokio::test]
async fn seeded_database_matches_contract() -> SeedContractTestResult {
    let contract = contract()?;
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    SeedDataset::load(&pool).await.map_err(|error| format!("seed: {error}"))?;
    let store = SqlRequestStore::new(pool);

    for scenario in &contract.scenarios {
        let request = store
            .load(&RequestId(scenario.request_id.clone()))
            .await
            .map_err(|error| format!("load {}: {error}", scenario.request_id))?
            .ok_or_else(|| format!("{} should be seeded", scenario.request_id))?;

        require_eq!(request.category().as_str(), scenario.category.as_str());
        require_eq!(request.status.as_str(), scenario.status.as_str());
        require_eq!(request.line_items.len(), scenario.expected_line_count);
        let expected_total = Decimal::from_str(&scenario.expected_total)
            .map_err(|error| format!("expected_total for {}: {error}", scenario.scenario))?;
        require_eq!(
            request.total_amount(),
            expected_total,
            "total for {} should be {}",
            scenario.request_id,
            expected_total
        );

        if let Some(purchase_order_id) = &scenario.purchase_order_id {
            let order = store
                .load_purchase_order(&steps_core::domain::purchase_order::PurchaseOrderId(
                    purchase_order_id.clone(),
                ))
                .await
                .map_err(|error| format!("load purchase order: {error}"))?
                .ok_or_else(|| format!("{purchase_order_id} should be seeded"))?;
            require_eq!(order.request_id, request.id);
            require_eq!(order.total_amount, expected_total);
            require_eq!(Some(order.vendor.as_str()), request.linked_vendor());
        }
    }
    Ok(())
}
