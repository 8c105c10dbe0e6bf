// ==========================================
// 定制制造扩展 - 工作站部件更换报表
// ==========================================

use crate::domain::workstation::{Workstation, WorkstationWearMonitor};
use crate::i18n::t;
use crate::report::{ReportColumn, ReportFilters, ReportOutput};
use crate::repository::error::RepositoryResult;
use crate::repository::report_repo::{ReportRepository, WorkstationWearRow};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

pub struct PartsReplacementReport {
    report_repo: Arc<ReportRepository>,
}

impl PartsReplacementReport {
    pub fn new(report_repo: Arc<ReportRepository>) -> Self {
        Self { report_repo }
    }

    pub fn columns() -> Vec<ReportColumn> {
        vec![
            ReportColumn::link(t("report.column.workstation"), "workstation", "Workstation", 180),
            ReportColumn::link(t("report.column.plant"), "plant_floor", "Plant Floor", 140),
            ReportColumn::new(t("report.column.threshold_qty"), "threshold_qty", "Float", 170),
            ReportColumn::new(t("report.column.completed_qty"), "completed_qty", "Float", 140),
            ReportColumn::new(t("report.column.remaining_qty"), "remaining_qty", "Float", 140),
            ReportColumn::new(t("report.column.status"), "status", "Data", 180),
        ]
    }

    #[instrument(skip(self))]
    pub fn execute(&self, filters: &ReportFilters) -> RepositoryResult<ReportOutput> {
        let data = self
            .report_repo
            .fetch_workstation_wear(filters.plant())?
            .into_iter()
            .map(build_row)
            .collect();
        Ok(ReportOutput::table(Self::columns(), data))
    }
}

fn build_row(row: WorkstationWearRow) -> Value {
    let ws = Workstation {
        worked_quantity: row.completed_qty,
        quantity_before_replacement: row.threshold_qty,
        ..Workstation::new(row.name, row.plant_floor)
    };

    let status = if ws.needs_parts_replacement() {
        t("report.status.replacement_required")
    } else {
        t("report.status.within_limit")
    };

    json!({
        "workstation": ws.name,
        "plant_floor": ws.plant_floor,
        "threshold_qty": ws.quantity_before_replacement,
        "completed_qty": ws.worked_quantity,
        "remaining_qty": ws.remaining_quantity(),
        "status": status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{set_locale, LOCALE_TEST_LOCK};
    use crate::repository::workstation_repo::WorkstationRepository;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn wear_row(threshold: f64, completed: f64) -> WorkstationWearRow {
        WorkstationWearRow {
            name: "WS-1".to_string(),
            plant_floor: Some("Plant A".to_string()),
            threshold_qty: threshold,
            completed_qty: completed,
        }
    }

    #[test]
    fn test_build_row_status() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_locale("en");

        let row = build_row(wear_row(100.0, 40.0));
        assert_eq!(row["remaining_qty"], 60.0);
        assert_eq!(row["status"], "Within Limit");

        let row = build_row(wear_row(100.0, 100.0));
        assert_eq!(row["remaining_qty"], 0.0);
        assert_eq!(row["status"], "Parts Replacement Required");

        let row = build_row(wear_row(0.0, 900.0));
        assert_eq!(row["remaining_qty"], 0.0);
        assert_eq!(row["status"], "Within Limit");
    }

    #[test]
    fn test_execute_filters_by_plant_and_orders() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_locale("en");

        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let ws_repo = WorkstationRepository::from_connection(conn.clone());
        for (name, plant) in [("WS-B", "Plant A"), ("WS-A", "Plant A"), ("WS-C", "Plant B")] {
            ws_repo
                .insert(&Workstation::new(name, Some(plant.to_string())))
                .unwrap();
        }

        let report = PartsReplacementReport::new(Arc::new(ReportRepository::from_connection(conn)));

        let all = report.execute(&ReportFilters::default()).unwrap();
        let names: Vec<&str> = all.data.iter().map(|r| r["workstation"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["WS-A", "WS-B", "WS-C"]);
        assert_eq!(all.columns.len(), 6);

        let filtered = report
            .execute(&ReportFilters {
                plant: Some("Plant B".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.data.len(), 1);
        assert_eq!(filtered.data[0]["workstation"], "WS-C");
    }
}
