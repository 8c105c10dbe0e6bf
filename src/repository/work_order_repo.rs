// ==========================================
// 定制制造扩展 - 工单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::DocStatus;
use crate::domain::work_order::{WorkOrder, WorkOrderOperation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建工单（含工序行）
    pub fn insert(&self, wo: &WorkOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO work_order (
                name, production_item, item_name, bom_no, qty, plant_name, docstatus
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                wo.name,
                wo.production_item,
                wo.item_name,
                wo.bom_no,
                wo.qty,
                wo.plant_name,
                wo.docstatus.as_i64(),
            ],
        )?;

        Self::write_operations(&tx, wo)?;
        tx.commit()?;
        Ok(())
    }

    /// 更新工单（工序行整体替换）
    pub fn update(&self, wo: &WorkOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let affected = tx.execute(
            r#"
            UPDATE work_order SET
                production_item = ?2, item_name = ?3, bom_no = ?4, qty = ?5,
                plant_name = ?6, docstatus = ?7, modified = datetime('now')
            WHERE name = ?1
            "#,
            params![
                wo.name,
                wo.production_item,
                wo.item_name,
                wo.bom_no,
                wo.qty,
                wo.plant_name,
                wo.docstatus.as_i64(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: wo.name.clone(),
            });
        }

        tx.execute("DELETE FROM work_order_operation WHERE parent = ?1", params![wo.name])?;
        Self::write_operations(&tx, wo)?;
        tx.commit()?;
        Ok(())
    }

    fn write_operations(conn: &Connection, wo: &WorkOrder) -> RepositoryResult<()> {
        for op in &wo.operations {
            conn.execute(
                r#"
                INSERT INTO work_order_operation (
                    parent, name, idx, operation, bom, sequence_id, batch_size,
                    wip_warehouse, source_warehouse, hour_rate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    wo.name,
                    op.name,
                    op.idx,
                    op.operation,
                    op.bom,
                    op.sequence_id,
                    op.batch_size,
                    op.wip_warehouse,
                    op.source_warehouse,
                    op.hour_rate,
                ],
            )?;
        }
        Ok(())
    }

    /// 按名称查询（含工序行，按 idx 排序）
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<WorkOrder>> {
        Self::find_by_name_on(&*self.get_conn()?, name)
    }

    pub fn find_by_name_on(conn: &Connection, name: &str) -> RepositoryResult<Option<WorkOrder>> {
        let wo = conn
            .query_row(
                r#"
                SELECT name, production_item, item_name, bom_no, qty, plant_name, docstatus
                FROM work_order
                WHERE name = ?1
                "#,
                params![name],
                |row| {
                    Ok(WorkOrder {
                        name: row.get(0)?,
                        production_item: row.get(1)?,
                        item_name: row.get(2)?,
                        bom_no: row.get(3)?,
                        qty: row.get(4)?,
                        plant_name: row.get(5)?,
                        docstatus: DocStatus::from_i64(row.get(6)?),
                        operations: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut wo = match wo {
            Some(wo) => wo,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT name, idx, operation, bom, sequence_id, batch_size,
                   wip_warehouse, source_warehouse, hour_rate
            FROM work_order_operation
            WHERE parent = ?1
            ORDER BY idx
            "#,
        )?;
        wo.operations = stmt
            .query_map(params![name], |row| {
                Ok(WorkOrderOperation {
                    name: row.get(0)?,
                    idx: row.get(1)?,
                    operation: row.get(2)?,
                    bom: row.get(3)?,
                    sequence_id: row.get(4)?,
                    batch_size: row.get(5)?,
                    wip_warehouse: row.get(6)?,
                    source_warehouse: row.get(7)?,
                    hour_rate: row.get(8)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(wo))
    }

    /// 更新单据状态
    pub fn set_docstatus(&self, name: &str, status: DocStatus) -> RepositoryResult<()> {
        Self::set_docstatus_on(&*self.get_conn()?, name, status)
    }

    pub fn set_docstatus_on(
        conn: &Connection,
        name: &str,
        status: DocStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE work_order SET docstatus = ?1, modified = datetime('now') WHERE name = ?2",
            params![status.as_i64(), name],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
    }
}
