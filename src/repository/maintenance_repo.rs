// ==========================================
// 定制制造扩展 - 设备保养数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: maintenance_done 以 JSON 文本保存原始取值
// ==========================================

use crate::domain::maintenance::{DocFlags, MachineMaintenance};
use crate::domain::types::DocStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Arc, Mutex};

// ==========================================
// MachineMaintenanceRepository - 设备保养仓储
// ==========================================
pub struct MachineMaintenanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineMaintenanceRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn encode_done(value: &Value) -> RepositoryResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode_done(raw: Option<String>) -> Value {
        match raw {
            // 非 JSON 文本按原始字符串保留
            Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            None => Value::Null,
        }
    }

    /// 新建保养单
    pub fn insert(&self, doc: &MachineMaintenance) -> RepositoryResult<()> {
        Self::insert_on(&*self.get_conn()?, doc)
    }

    pub fn insert_on(conn: &Connection, doc: &MachineMaintenance) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO machine_maintenance (
                name, machine_name, maintenance_done, previous_worked_hours, docstatus
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                doc.name,
                doc.machine_name,
                Self::encode_done(&doc.maintenance_done)?,
                doc.previous_worked_hours,
                doc.docstatus.as_i64(),
            ],
        )?;
        Ok(())
    }

    /// 更新保养单
    pub fn update(&self, doc: &MachineMaintenance) -> RepositoryResult<()> {
        Self::update_on(&*self.get_conn()?, doc)
    }

    pub fn update_on(conn: &Connection, doc: &MachineMaintenance) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE machine_maintenance SET
                machine_name = ?2,
                maintenance_done = ?3,
                previous_worked_hours = ?4,
                docstatus = ?5,
                modified = datetime('now')
            WHERE name = ?1
            "#,
            params![
                doc.name,
                doc.machine_name,
                Self::encode_done(&doc.maintenance_done)?,
                doc.previous_worked_hours,
                doc.docstatus.as_i64(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MachineMaintenance".to_string(),
                id: doc.name.clone(),
            });
        }
        Ok(())
    }

    /// 按名称查询
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<MachineMaintenance>> {
        Self::find_by_name_on(&*self.get_conn()?, name)
    }

    pub fn find_by_name_on(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<MachineMaintenance>> {
        let doc = conn
            .query_row(
                r#"
                SELECT name, machine_name, maintenance_done, previous_worked_hours, docstatus
                FROM machine_maintenance
                WHERE name = ?1
                "#,
                params![name],
                |row| {
                    Ok(MachineMaintenance {
                        name: row.get(0)?,
                        machine_name: row.get(1)?,
                        maintenance_done: Self::decode_done(row.get(2)?),
                        previous_worked_hours: row.get(3)?,
                        docstatus: DocStatus::from_i64(row.get(4)?),
                        flags: DocFlags::default(),
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    /// 读取已持久化的快照值
    ///
    /// # 返回
    /// - Ok(Some(v)) / Ok(None): 记录存在，快照有值 / 为空
    /// - Err(NotFound): 记录不存在
    pub fn get_previous_worked_hours(&self, name: &str) -> RepositoryResult<Option<f64>> {
        Self::get_previous_worked_hours_on(&*self.get_conn()?, name)
    }

    pub fn get_previous_worked_hours_on(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<f64>> {
        let value = conn
            .query_row(
                "SELECT previous_worked_hours FROM machine_maintenance WHERE name = ?1",
                params![name],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()?;

        value.ok_or_else(|| RepositoryError::NotFound {
            entity: "MachineMaintenance".to_string(),
            id: name.to_string(),
        })
    }

    /// 写入快照值（不修改 modified）
    pub fn set_previous_worked_hours(&self, name: &str, value: Option<f64>) -> RepositoryResult<()> {
        Self::set_previous_worked_hours_on(&*self.get_conn()?, name, value)
    }

    pub fn set_previous_worked_hours_on(
        conn: &Connection,
        name: &str,
        value: Option<f64>,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE machine_maintenance SET previous_worked_hours = ?1 WHERE name = ?2",
            params![value, name],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MachineMaintenance".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
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
            "UPDATE machine_maintenance SET docstatus = ?1, modified = datetime('now') WHERE name = ?2",
            params![status.as_i64(), name],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MachineMaintenance".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
    }

    /// 删除保养单
    ///
    /// # 返回
    /// 是否删除了记录
    pub fn delete(&self, name: &str) -> RepositoryResult<bool> {
        Self::delete_on(&*self.get_conn()?, name)
    }

    pub fn delete_on(conn: &Connection, name: &str) -> RepositoryResult<bool> {
        let affected = conn.execute(
            "DELETE FROM machine_maintenance WHERE name = ?1",
            params![name],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_repo() -> MachineMaintenanceRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        MachineMaintenanceRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_raw_done_value_roundtrip() {
        let repo = setup_repo();
        let mut doc = MachineMaintenance::new("MM-1", Some("WS-1".to_string()));
        doc.maintenance_done = json!("Yes");
        repo.insert(&doc).unwrap();

        let found = repo.find_by_name("MM-1").unwrap().unwrap();
        assert_eq!(found.maintenance_done, json!("Yes"));
        assert!(found.is_done());
    }

    #[test]
    fn test_snapshot_read_write() {
        let repo = setup_repo();
        repo.insert(&MachineMaintenance::new("MM-1", Some("WS-1".to_string())))
            .unwrap();

        assert_eq!(repo.get_previous_worked_hours("MM-1").unwrap(), None);
        repo.set_previous_worked_hours("MM-1", Some(17.5)).unwrap();
        assert_eq!(repo.get_previous_worked_hours("MM-1").unwrap(), Some(17.5));
        repo.set_previous_worked_hours("MM-1", None).unwrap();
        assert_eq!(repo.get_previous_worked_hours("MM-1").unwrap(), None);
    }

    #[test]
    fn test_snapshot_read_missing_record() {
        let repo = setup_repo();
        let err = repo.get_previous_worked_hours("NOPE").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_delete() {
        let repo = setup_repo();
        repo.insert(&MachineMaintenance::new("MM-1", None)).unwrap();
        assert!(repo.delete("MM-1").unwrap());
        assert!(!repo.delete("MM-1").unwrap());
        assert!(repo.find_by_name("MM-1").unwrap().is_none());
    }
}
