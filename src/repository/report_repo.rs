// ==========================================
// 定制制造扩展 - 报表只读仓储
// ==========================================
// 职责: 为三张报表提供原始数据行（只读）
// 红线: 不做汇总展示逻辑，聚合口径由 report 层负责
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Result as SqliteResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// 班次汇总用的作业卡行
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftJobCardRow {
    pub name: String,
    pub shift_number: Option<String>,
    pub total_completed_qty: f64,
    pub production_item: Option<String>,
    pub item_name: Option<String>,
    pub work_order: Option<String>,
}

/// 作业卡废料行
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapRow {
    pub parent: String,
    pub item_code: Option<String>,
    pub item_name: Option<String>,
    pub stock_qty: f64,
}

/// 故障统计行
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub workstation: String,
    pub breakdown_type: String,
    pub breakdown_count: i64,
}

/// 工作站磨损行
#[derive(Debug, Clone, PartialEq)]
pub struct WorkstationWearRow {
    pub name: String,
    pub plant_floor: Option<String>,
    pub threshold_qty: f64,
    pub completed_qty: f64,
}

// ==========================================
// ReportRepository - 报表仓储
// ==========================================
pub struct ReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReportRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 已提交作业卡（按过账日期/车间过滤）
    pub fn fetch_submitted_job_cards(
        &self,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        plant: Option<&str>,
    ) -> RepositoryResult<Vec<ShiftJobCardRow>> {
        let mut conditions = vec!["docstatus = 1".to_string()];
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(d) = from_date {
            values.push(SqlValue::Text(d.to_string()));
            conditions.push(format!("posting_date >= ?{}", values.len()));
        }
        if let Some(d) = to_date {
            values.push(SqlValue::Text(d.to_string()));
            conditions.push(format!("posting_date <= ?{}", values.len()));
        }
        if let Some(p) = plant.filter(|p| !p.is_empty()) {
            values.push(SqlValue::Text(p.to_string()));
            conditions.push(format!("plant_name = ?{}", values.len()));
        }

        let sql = format!(
            r#"
            SELECT name, shift_number, IFNULL(total_completed_qty, 0),
                   production_item, item_name, work_order
            FROM job_card
            WHERE {}
            ORDER BY name
            "#,
            conditions.join(" AND ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(ShiftJobCardRow {
                    name: row.get(0)?,
                    shift_number: row.get(1)?,
                    total_completed_qty: row.get(2)?,
                    production_item: row.get(3)?,
                    item_name: row.get(4)?,
                    work_order: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 指定作业卡的废料行
    pub fn fetch_scrap_items(&self, job_cards: &[String]) -> RepositoryResult<Vec<ScrapRow>> {
        if job_cards.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT parent, item_code, item_name, IFNULL(stock_qty, 0)
            FROM job_card_scrap_item
            WHERE parent IN ({})
            ORDER BY parent, idx
            "#,
            placeholders(job_cards.len())
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(job_cards.iter()), |row| {
                Ok(ScrapRow {
                    parent: row.get(0)?,
                    item_code: row.get(1)?,
                    item_name: row.get(2)?,
                    stock_qty: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 工单 → 批次号集合（来自已提交库存凭证明细或批次包）
    pub fn fetch_work_order_batches(
        &self,
        work_orders: &[String],
    ) -> RepositoryResult<HashMap<String, BTreeSet<String>>> {
        let mut result: HashMap<String, BTreeSet<String>> = HashMap::new();
        if work_orders.is_empty() {
            return Ok(result);
        }

        let marks = placeholders(work_orders.len());
        let sql = format!(
            r#"
            SELECT DISTINCT se.work_order, sed.batch_no
            FROM stock_entry se
            INNER JOIN stock_entry_detail sed ON sed.parent = se.name
            WHERE se.docstatus = 1
              AND se.work_order IN ({marks})
              AND COALESCE(sed.batch_no, '') != ''

            UNION

            SELECT DISTINCT se.work_order, sbe.batch_no
            FROM stock_entry se
            INNER JOIN stock_entry_detail sed ON sed.parent = se.name
            INNER JOIN serial_and_batch_entry sbe ON sbe.parent = sed.serial_and_batch_bundle
            WHERE se.docstatus = 1
              AND se.work_order IN ({marks})
              AND COALESCE(sed.serial_and_batch_bundle, '') != ''
              AND COALESCE(sbe.batch_no, '') != ''
            "#,
            marks = marks
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(work_orders.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        for (work_order, batch_no) in rows {
            result.entry(work_order).or_default().insert(batch_no);
        }
        Ok(result)
    }

    /// 故障统计（未取消、有故障类型与工作站）
    pub fn fetch_breakdown_counts(
        &self,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<BreakdownRow>> {
        let mut conditions = vec![
            "docstatus < 2".to_string(),
            "COALESCE(breakdown_type, '') != ''".to_string(),
            "COALESCE(workstation, '') != ''".to_string(),
        ];
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(d) = from_date {
            values.push(SqlValue::Text(d.to_string()));
            conditions.push(format!("posting_date >= ?{}", values.len()));
        }
        if let Some(d) = to_date {
            values.push(SqlValue::Text(d.to_string()));
            conditions.push(format!("posting_date <= ?{}", values.len()));
        }

        let sql = format!(
            r#"
            SELECT workstation, breakdown_type, COUNT(*) AS breakdown_count
            FROM job_card
            WHERE {}
            GROUP BY workstation, breakdown_type
            ORDER BY workstation ASC, breakdown_count DESC
            "#,
            conditions.join(" AND ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(BreakdownRow {
                    workstation: row.get(0)?,
                    breakdown_type: row.get(1)?,
                    breakdown_count: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 工作站阈值与累计数量（按车间、名称排序）
    pub fn fetch_workstation_wear(&self, plant: Option<&str>) -> RepositoryResult<Vec<WorkstationWearRow>> {
        let mut sql = String::from(
            r#"
            SELECT name, plant_floor,
                   IFNULL(quantity_before_replacement, 0),
                   IFNULL(worked_quantity, 0)
            FROM workstation
            "#,
        );
        let mut values: Vec<SqlValue> = Vec::new();
        if let Some(p) = plant.filter(|p| !p.is_empty()) {
            values.push(SqlValue::Text(p.to_string()));
            sql.push_str(" WHERE plant_floor = ?1");
        }
        sql.push_str(" ORDER BY plant_floor, name");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(WorkstationWearRow {
                    name: row.get(0)?,
                    plant_floor: row.get(1)?,
                    threshold_qty: row.get(2)?,
                    completed_qty: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

/// 生成 "?1, ?2, ..." 占位符
fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
