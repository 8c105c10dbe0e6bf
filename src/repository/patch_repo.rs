// ==========================================
// 定制制造扩展 - 数据补丁仓储
// ==========================================
// 职责: patch_log 记录 + 表结构探查/变更原语
// 说明: 补丁主体在单个事务中执行，成功后写入 patch_log
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 表字段信息（PRAGMA table_info）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
}

impl ColumnInfo {
    /// 声明类型是否为小数/浮点亲和
    pub fn is_decimal(&self) -> bool {
        let t = self.decl_type.to_lowercase();
        t.contains("decimal") || t.contains("real") || t.contains("float") || t.contains("double")
    }
}

// ==========================================
// PatchRepository - 数据补丁仓储
// ==========================================
pub struct PatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PatchRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 补丁是否已执行
    pub fn is_applied(&self, patch: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::is_applied_on(&conn, patch)
    }

    fn is_applied_on(conn: &Connection, patch: &str) -> RepositoryResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM patch_log WHERE patch = ?1",
                params![patch],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 在事务中执行补丁（已执行过则跳过）
    ///
    /// # 返回
    /// - Ok(Some(T)): 本次执行的结果
    /// - Ok(None): 补丁已执行过
    pub fn apply<T, F>(&self, patch: &str, body: F) -> RepositoryResult<Option<T>>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.get_conn()?;
        if Self::is_applied_on(&conn, patch)? {
            return Ok(None);
        }

        let tx = conn.unchecked_transaction()?;
        let output = body(&tx)?;
        tx.execute("INSERT INTO patch_log (patch) VALUES (?1)", params![patch])?;
        tx.commit()?;
        Ok(Some(output))
    }

    // ==========================================
    // 表结构原语
    // ==========================================

    /// 查询字段信息（不存在时返回 None）
    pub fn column_info(conn: &Connection, table: &str, column: &str) -> RepositoryResult<Option<ColumnInfo>> {
        let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
        let mut rows = stmt.query(params![table])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            if name == column {
                return Ok(Some(ColumnInfo {
                    name,
                    decl_type: row.get(1)?,
                }));
            }
        }
        Ok(None)
    }

    /// 字段是否存在
    pub fn column_exists(conn: &Connection, table: &str, column: &str) -> RepositoryResult<bool> {
        Ok(Self::column_info(conn, table, column)?.is_some())
    }

    /// 新增小数字段（NOT NULL DEFAULT 0）
    pub fn add_decimal_column(conn: &Connection, table: &str, column: &str) -> RepositoryResult<()> {
        conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} REAL NOT NULL DEFAULT 0;",
            quote_ident(table),
            quote_ident(column)
        ))?;
        Ok(())
    }

    /// 重命名字段
    pub fn rename_column(conn: &Connection, table: &str, from: &str, to: &str) -> RepositoryResult<()> {
        conn.execute_batch(&format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            quote_ident(table),
            quote_ident(from),
            quote_ident(to)
        ))?;
        Ok(())
    }

    /// 删除字段
    pub fn drop_column(conn: &Connection, table: &str, column: &str) -> RepositoryResult<()> {
        conn.execute_batch(&format!(
            "ALTER TABLE {} DROP COLUMN {};",
            quote_ident(table),
            quote_ident(column)
        ))?;
        Ok(())
    }

    /// 以 IFNULL(from, 0) 覆盖目标字段
    ///
    /// # 返回
    /// 受影响行数
    pub fn copy_numeric_column(conn: &Connection, table: &str, from: &str, to: &str) -> RepositoryResult<usize> {
        let affected = conn.execute(
            &format!(
                "UPDATE {} SET {} = IFNULL({}, 0)",
                quote_ident(table),
                quote_ident(to),
                quote_ident(from)
            ),
            [],
        )?;
        Ok(affected)
    }

    /// 删除自定义字段元数据
    ///
    /// # 返回
    /// 是否删除了记录
    pub fn delete_custom_field(conn: &Connection, name: &str) -> RepositoryResult<bool> {
        let affected = conn.execute("DELETE FROM custom_field WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }
}

/// 标识符加双引号（表名/字段名来自代码常量）
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
