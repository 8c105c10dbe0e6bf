// ==========================================
// 定制制造扩展 - 作业卡数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: job_card 及其子表 (时间日志/废料/每袋重量) 的读写
// ==========================================

use crate::domain::job_card::{JobCard, JobCardKey, JobCardScrapItem, TimeLog, WeightRow};
use crate::domain::types::DocStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT
        name, work_order, workstation, workstation_type,
        operation, operation_id, shift_number, bom_no,
        sequence_id, batch_size, production_item, item_name,
        plant_name, posting_date,
        for_quantity, total_completed_qty, process_loss_qty,
        total_time_in_mins, total_machine_operation_time_float,
        breakdown_type, wip_warehouse, source_warehouse, hour_rate,
        docstatus
    FROM job_card
"#;

// ==========================================
// JobCardRepository - 作业卡仓储
// ==========================================
pub struct JobCardRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobCardRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<JobCard> {
        Ok(JobCard {
            name: row.get(0)?,
            work_order: row.get(1)?,
            workstation: row.get(2)?,
            workstation_type: row.get(3)?,
            operation: row.get(4)?,
            operation_id: row.get(5)?,
            shift_number: row.get(6)?,
            bom_no: row.get(7)?,
            sequence_id: row.get(8)?,
            batch_size: row.get(9)?,
            production_item: row.get(10)?,
            item_name: row.get(11)?,
            plant_name: row.get(12)?,
            posting_date: row.get(13)?,
            for_quantity: row.get(14)?,
            total_completed_qty: row.get(15)?,
            process_loss_qty: row.get(16)?,
            total_time_in_mins: row.get(17)?,
            total_machine_operation_time_float: row.get(18)?,
            breakdown_type: row.get(19)?,
            wip_warehouse: row.get(20)?,
            source_warehouse: row.get(21)?,
            hour_rate: row.get(22)?,
            docstatus: DocStatus::from_i64(row.get(23)?),
            time_logs: Vec::new(),
            scrap_items: Vec::new(),
            weight_per_bag: Vec::new(),
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新建作业卡（含子表）
    pub fn insert(&self, jc: &JobCard) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        Self::insert_on(&tx, jc)?;
        tx.commit()?;
        Ok(())
    }

    /// 新建作业卡（调用方持有连接并负责事务）
    pub fn insert_on(conn: &Connection, jc: &JobCard) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO job_card (
                name, work_order, workstation, workstation_type,
                operation, operation_id, shift_number, bom_no,
                sequence_id, batch_size, production_item, item_name,
                plant_name, posting_date,
                for_quantity, total_completed_qty, process_loss_qty,
                total_time_in_mins, total_machine_operation_time_float,
                breakdown_type, wip_warehouse, source_warehouse, hour_rate,
                docstatus
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            "#,
            params![
                jc.name,
                jc.work_order,
                jc.workstation,
                jc.workstation_type,
                jc.operation,
                jc.operation_id,
                jc.shift_number,
                jc.bom_no,
                jc.sequence_id,
                jc.batch_size,
                jc.production_item,
                jc.item_name,
                jc.plant_name,
                jc.posting_date,
                jc.for_quantity,
                jc.total_completed_qty,
                jc.process_loss_qty,
                jc.total_time_in_mins,
                jc.total_machine_operation_time_float,
                jc.breakdown_type,
                jc.wip_warehouse,
                jc.source_warehouse,
                jc.hour_rate,
                jc.docstatus.as_i64(),
            ],
        )?;
        Self::write_children(conn, jc)
    }

    /// 更新作业卡（含子表，子表整体替换）
    pub fn update(&self, jc: &JobCard) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        Self::update_on(&tx, jc)?;
        tx.commit()?;
        Ok(())
    }

    pub fn update_on(conn: &Connection, jc: &JobCard) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE job_card SET
                work_order = ?2, workstation = ?3, workstation_type = ?4,
                operation = ?5, operation_id = ?6, shift_number = ?7, bom_no = ?8,
                sequence_id = ?9, batch_size = ?10, production_item = ?11, item_name = ?12,
                plant_name = ?13, posting_date = ?14,
                for_quantity = ?15, total_completed_qty = ?16, process_loss_qty = ?17,
                total_time_in_mins = ?18, total_machine_operation_time_float = ?19,
                breakdown_type = ?20, wip_warehouse = ?21, source_warehouse = ?22,
                hour_rate = ?23, docstatus = ?24,
                modified = datetime('now')
            WHERE name = ?1
            "#,
            params![
                jc.name,
                jc.work_order,
                jc.workstation,
                jc.workstation_type,
                jc.operation,
                jc.operation_id,
                jc.shift_number,
                jc.bom_no,
                jc.sequence_id,
                jc.batch_size,
                jc.production_item,
                jc.item_name,
                jc.plant_name,
                jc.posting_date,
                jc.for_quantity,
                jc.total_completed_qty,
                jc.process_loss_qty,
                jc.total_time_in_mins,
                jc.total_machine_operation_time_float,
                jc.breakdown_type,
                jc.wip_warehouse,
                jc.source_warehouse,
                jc.hour_rate,
                jc.docstatus.as_i64(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "JobCard".to_string(),
                id: jc.name.clone(),
            });
        }

        conn.execute("DELETE FROM job_card_time_log WHERE parent = ?1", params![jc.name])?;
        conn.execute("DELETE FROM job_card_scrap_item WHERE parent = ?1", params![jc.name])?;
        conn.execute("DELETE FROM job_card_weight_per_bag WHERE parent = ?1", params![jc.name])?;
        Self::write_children(conn, jc)
    }

    fn write_children(conn: &Connection, jc: &JobCard) -> RepositoryResult<()> {
        for row in &jc.time_logs {
            conn.execute(
                r#"
                INSERT INTO job_card_time_log (
                    parent, idx, name, from_time, to_time, time_in_mins, completed_qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    jc.name,
                    row.idx,
                    row.name,
                    row.from_time,
                    row.to_time,
                    row.time_in_mins,
                    row.completed_qty,
                ],
            )?;
        }

        for row in &jc.scrap_items {
            conn.execute(
                r#"
                INSERT INTO job_card_scrap_item (
                    parent, idx, item_code, item_name, stock_qty, stock_uom, qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    jc.name,
                    row.idx,
                    row.item_code,
                    row.item_name,
                    row.stock_qty,
                    row.stock_uom,
                    row.qty,
                ],
            )?;
        }

        for row in &jc.weight_per_bag {
            let values_json = serde_json::to_string(&row.values)?;
            conn.execute(
                r#"
                INSERT INTO job_card_weight_per_bag (parent, idx, doctype, values_json)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![jc.name, row.idx, row.doctype, values_json],
            )?;
        }

        Ok(())
    }

    /// 更新单据状态
    pub fn set_docstatus(&self, name: &str, status: DocStatus) -> RepositoryResult<()> {
        Self::set_docstatus_on(&*self.get_conn()?, name, status)
    }

    pub fn set_docstatus_on(conn: &Connection, name: &str, status: DocStatus) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE job_card SET docstatus = ?1, modified = datetime('now') WHERE name = ?2",
            params![status.as_i64(), name],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "JobCard".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按名称查询（含子表）
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<JobCard>> {
        Self::find_by_name_on(&*self.get_conn()?, name)
    }

    pub fn find_by_name_on(conn: &Connection, name: &str) -> RepositoryResult<Option<JobCard>> {
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        let jc = conn.query_row(&sql, params![name], Self::map_row).optional()?;

        let mut jc = match jc {
            Some(jc) => jc,
            None => return Ok(None),
        };

        jc.time_logs = Self::load_time_logs(conn, name)?;
        jc.scrap_items = Self::load_scrap_items(conn, name)?;
        jc.weight_per_bag = Self::load_weight_rows(conn, name)?;
        Ok(Some(jc))
    }

    fn load_time_logs(conn: &Connection, parent: &str) -> RepositoryResult<Vec<TimeLog>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT name, idx, from_time, to_time, time_in_mins, completed_qty
            FROM job_card_time_log
            WHERE parent = ?1
            ORDER BY idx
            "#,
        )?;
        let rows = stmt
            .query_map(params![parent], |row| {
                Ok(TimeLog {
                    name: row.get(0)?,
                    idx: row.get(1)?,
                    from_time: row.get(2)?,
                    to_time: row.get(3)?,
                    time_in_mins: row.get(4)?,
                    completed_qty: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn load_scrap_items(conn: &Connection, parent: &str) -> RepositoryResult<Vec<JobCardScrapItem>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT idx, item_code, item_name, stock_qty, stock_uom, qty
            FROM job_card_scrap_item
            WHERE parent = ?1
            ORDER BY idx
            "#,
        )?;
        let rows = stmt
            .query_map(params![parent], |row| {
                Ok(JobCardScrapItem {
                    idx: row.get(0)?,
                    item_code: row.get(1)?,
                    item_name: row.get(2)?,
                    stock_qty: row.get(3)?,
                    stock_uom: row.get(4)?,
                    qty: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn load_weight_rows(conn: &Connection, parent: &str) -> RepositoryResult<Vec<WeightRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT idx, doctype, values_json
            FROM job_card_weight_per_bag
            WHERE parent = ?1
            ORDER BY idx
            "#,
        )?;
        let raw = stmt
            .query_map(params![parent], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (idx, doctype, values_json) in raw {
            let values: BTreeMap<String, Value> = serde_json::from_str(&values_json)?;
            rows.push(WeightRow {
                idx,
                doctype,
                values,
            });
        }
        Ok(rows)
    }

    /// 作业卡是否存在
    pub fn exists(&self, name: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM job_card WHERE name = ?1 LIMIT 1",
                params![name],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 工单下已存在的 (工序行, 工作站, 班次) 组合
    pub fn find_keys_by_work_order(&self, work_order: &str) -> RepositoryResult<HashSet<JobCardKey>> {
        Self::find_keys_by_work_order_on(&*self.get_conn()?, work_order)
    }

    pub fn find_keys_by_work_order_on(
        conn: &Connection,
        work_order: &str,
    ) -> RepositoryResult<HashSet<JobCardKey>> {
        let mut stmt = conn.prepare(
            "SELECT operation_id, workstation, shift_number FROM job_card WHERE work_order = ?1",
        )?;
        let keys = stmt
            .query_map(params![work_order], |row| {
                Ok(JobCardKey {
                    operation_id: row.get(0)?,
                    workstation: row.get(1)?,
                    shift_number: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<HashSet<_>>>()?;
        Ok(keys)
    }

    /// 工单下作业卡数量
    pub fn count_by_work_order(&self, work_order: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM job_card WHERE work_order = ?1",
            params![work_order],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 工单下已提交作业卡的完工数量合计
    pub fn sum_completed_qty_by_work_order(&self, work_order: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let total: Option<f64> = conn.query_row(
            r#"
            SELECT COALESCE(SUM(total_completed_qty), 0)
            FROM job_card
            WHERE docstatus = 1 AND work_order = ?1
            "#,
            params![work_order],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn setup_repo() -> JobCardRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        JobCardRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn sample(name: &str) -> JobCard {
        let mut jc = JobCard::new(name);
        jc.work_order = Some("WO-1".to_string());
        jc.workstation = Some("WS-1".to_string());
        jc.operation_id = Some("op-1".to_string());
        jc.shift_number = Some("Shift 1".to_string());
        jc.posting_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        jc.append_time_log(TimeLog {
            name: Some("tl-1".to_string()),
            time_in_mins: 60.0,
            completed_qty: 5.0,
            ..Default::default()
        });
        jc.append_scrap_item(JobCardScrapItem {
            item_code: "SCRAP-1".to_string(),
            stock_qty: 2.0,
            qty: 2.0,
            ..Default::default()
        });
        let mut values = BTreeMap::new();
        values.insert("1".to_string(), json!(12.5));
        jc.weight_per_bag.push(WeightRow::new(1, values));
        jc
    }

    #[test]
    fn test_insert_and_find_with_children() {
        let repo = setup_repo();
        repo.insert(&sample("JC-1")).unwrap();

        let found = repo.find_by_name("JC-1").unwrap().unwrap();
        assert_eq!(found.workstation.as_deref(), Some("WS-1"));
        assert_eq!(found.posting_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(found.time_logs.len(), 1);
        assert_eq!(found.time_logs[0].name.as_deref(), Some("tl-1"));
        assert_eq!(found.scrap_items[0].item_code, "SCRAP-1");
        assert_eq!(found.weight_per_bag[0].get("1"), Some(&json!(12.5)));
    }

    #[test]
    fn test_update_replaces_children() {
        let repo = setup_repo();
        let mut jc = sample("JC-1");
        repo.insert(&jc).unwrap();

        jc.time_logs.clear();
        jc.for_quantity = 42.0;
        repo.update(&jc).unwrap();

        let found = repo.find_by_name("JC-1").unwrap().unwrap();
        assert!(found.time_logs.is_empty());
        assert_eq!(found.for_quantity, 42.0);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let repo = setup_repo();
        let err = repo.update(&sample("NOPE")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_sum_completed_counts_only_submitted() {
        let repo = setup_repo();
        let mut a = sample("JC-A");
        a.total_completed_qty = 5.0;
        a.docstatus = DocStatus::Submitted;
        let mut b = sample("JC-B");
        b.total_completed_qty = 7.0;
        b.docstatus = DocStatus::Cancelled;
        let mut c = sample("JC-C");
        c.total_completed_qty = 3.0;
        repo.insert(&a).unwrap();
        repo.insert(&b).unwrap();
        repo.insert(&c).unwrap();

        assert_eq!(repo.sum_completed_qty_by_work_order("WO-1").unwrap(), 5.0);
        assert_eq!(repo.sum_completed_qty_by_work_order("WO-X").unwrap(), 0.0);
    }

    #[test]
    fn test_find_keys_by_work_order() {
        let repo = setup_repo();
        repo.insert(&sample("JC-1")).unwrap();

        let keys = repo.find_keys_by_work_order("WO-1").unwrap();
        assert!(keys.contains(&JobCardKey::new("op-1", "WS-1", "Shift 1")));
        assert_eq!(repo.count_by_work_order("WO-1").unwrap(), 1);
    }
}
