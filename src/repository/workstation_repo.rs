// ==========================================
// 定制制造扩展 - 工作站数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 累计数量只通过单条 UPDATE 语句增减 (存储层读改写)，
//       并且不修改 modified 字段
// ==========================================

use crate::domain::workstation::Workstation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT
        name, workstation_type, plant_floor,
        IFNULL(worked_quantity, 0), IFNULL(quantity_before_replacement, 0)
    FROM workstation
"#;

// ==========================================
// WorkstationRepository - 工作站仓储
// ==========================================
pub struct WorkstationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkstationRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Workstation> {
        Ok(Workstation {
            name: row.get(0)?,
            workstation_type: row.get(1)?,
            plant_floor: row.get(2)?,
            worked_quantity: row.get(3)?,
            quantity_before_replacement: row.get(4)?,
        })
    }

    /// 新建工作站
    pub fn insert(&self, ws: &Workstation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO workstation (
                name, workstation_type, plant_floor,
                worked_quantity, quantity_before_replacement
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                ws.name,
                ws.workstation_type,
                ws.plant_floor,
                ws.worked_quantity,
                ws.quantity_before_replacement,
            ],
        )?;
        Ok(())
    }

    /// 按名称查询
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Workstation>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        let ws = conn
            .query_row(&sql, params![name], Self::map_row)
            .optional()?;
        Ok(ws)
    }

    /// 工作站是否存在
    pub fn exists(&self, name: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM workstation WHERE name = ?1 LIMIT 1",
                params![name],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 读取累计数量
    ///
    /// # 返回
    /// - Ok(Some(v)): 工作站存在（NULL 视为 0）
    /// - Ok(None): 工作站不存在
    pub fn get_worked_quantity(&self, name: &str) -> RepositoryResult<Option<f64>> {
        Self::get_worked_quantity_on(&*self.get_conn()?, name)
    }

    pub fn get_worked_quantity_on(conn: &Connection, name: &str) -> RepositoryResult<Option<f64>> {
        let value = conn
            .query_row(
                "SELECT IFNULL(worked_quantity, 0) FROM workstation WHERE name = ?1",
                params![name],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 原子增减累计数量（下限为 0）
    ///
    /// 单条语句完成读改写，并发提交不会丢失更新
    ///
    /// # 返回
    /// 受影响行数（工作站不存在时为 0）
    pub fn increment_worked_quantity(&self, name: &str, delta: f64) -> RepositoryResult<usize> {
        Self::increment_worked_quantity_on(&*self.get_conn()?, name, delta)
    }

    pub fn increment_worked_quantity_on(
        conn: &Connection,
        name: &str,
        delta: f64,
    ) -> RepositoryResult<usize> {
        let affected = conn.execute(
            r#"
            UPDATE workstation
            SET worked_quantity = MAX(IFNULL(worked_quantity, 0) + ?1, 0)
            WHERE name = ?2
            "#,
            params![delta, name],
        )?;
        Ok(affected)
    }

    /// 直接写入累计数量（保养清零/恢复）
    ///
    /// # 返回
    /// 受影响行数（工作站不存在时为 0）
    pub fn set_worked_quantity(&self, name: &str, value: f64) -> RepositoryResult<usize> {
        Self::set_worked_quantity_on(&*self.get_conn()?, name, value)
    }

    pub fn set_worked_quantity_on(conn: &Connection, name: &str, value: f64) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "UPDATE workstation SET worked_quantity = ?1 WHERE name = ?2",
            params![value, name],
        )?;
        Ok(affected)
    }

    /// 查询车间内的工作站（按名称排序）
    pub fn find_by_plant(&self, plant_floor: &str) -> RepositoryResult<Vec<Workstation>> {
        Self::find_by_plant_on(&*self.get_conn()?, plant_floor)
    }

    pub fn find_by_plant_on(conn: &Connection, plant_floor: &str) -> RepositoryResult<Vec<Workstation>> {
        let sql = format!("{} WHERE plant_floor = ?1 ORDER BY name ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![plant_floor], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询全部工作站（可按车间过滤，按车间、名称排序）
    pub fn list(&self, plant_floor: Option<&str>) -> RepositoryResult<Vec<Workstation>> {
        let conn = self.get_conn()?;
        let rows = match plant_floor {
            Some(plant) => {
                let sql = format!("{} WHERE plant_floor = ?1 ORDER BY plant_floor, name", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![plant], Self::map_row)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!("{} ORDER BY plant_floor, name", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], Self::map_row)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// 读取 modified 时间戳（用于校验业务写入不改动它）
    pub fn get_modified(&self, name: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT modified FROM workstation WHERE name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}
