// ==========================================
// 定制制造扩展 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，并发提交工单时减少偶发 busy 错误
// - 提供幂等建表 (CREATE TABLE IF NOT EXISTS)
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::OptionalExtension;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Mutex;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 在共享连接上执行单据写事务
///
/// 说明：
/// - BEGIN IMMEDIATE：开始即取得写锁，多连接并发提交时按 busy_timeout 排队
/// - 闭包返回 Err 时事务回滚，单据状态与事件处理的写入一并撤销
pub fn with_write_transaction<T, E, F>(conn: &Mutex<Connection>, body: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<RepositoryError>,
{
    let guard = conn
        .lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))?;
    let tx = Transaction::new_unchecked(&guard, TransactionBehavior::Immediate)
        .map_err(RepositoryError::from)?;
    let value = body(&tx)?;
    tx.commit().map_err(RepositoryError::from)?;
    Ok(value)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部业务表（幂等）
///
/// 说明：
/// - workstation.worked_quantity 允许 NULL，读取时按 0 处理
/// - machine_maintenance.previous_worked_hours 为 NULL 表示无待恢复快照
/// - 子表以 (parent, idx) 排序
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS workstation (
            name TEXT PRIMARY KEY,
            workstation_type TEXT,
            plant_floor TEXT,
            worked_quantity REAL DEFAULT 0,
            quantity_before_replacement REAL DEFAULT 0,
            modified TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_workstation_plant ON workstation(plant_floor);

        CREATE TABLE IF NOT EXISTS shift (
            name TEXT PRIMARY KEY,
            from_time TEXT,
            to_time TEXT
        );

        CREATE TABLE IF NOT EXISTS bom_scrap_item (
            parent TEXT NOT NULL,
            idx INTEGER NOT NULL,
            item_code TEXT NOT NULL,
            item_name TEXT,
            stock_qty REAL NOT NULL DEFAULT 0,
            stock_uom TEXT,
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS work_order (
            name TEXT PRIMARY KEY,
            production_item TEXT,
            item_name TEXT,
            bom_no TEXT,
            qty REAL NOT NULL DEFAULT 0,
            plant_name TEXT,
            docstatus INTEGER NOT NULL DEFAULT 0,
            modified TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS work_order_operation (
            parent TEXT NOT NULL REFERENCES work_order(name) ON DELETE CASCADE,
            name TEXT NOT NULL,
            idx INTEGER NOT NULL,
            operation TEXT NOT NULL,
            bom TEXT,
            sequence_id INTEGER,
            batch_size REAL,
            wip_warehouse TEXT,
            source_warehouse TEXT,
            hour_rate REAL,
            PRIMARY KEY (parent, name)
        );

        CREATE TABLE IF NOT EXISTS job_card (
            name TEXT PRIMARY KEY,
            work_order TEXT,
            workstation TEXT,
            workstation_type TEXT,
            operation TEXT,
            operation_id TEXT,
            shift_number TEXT,
            bom_no TEXT,
            sequence_id INTEGER,
            batch_size REAL,
            production_item TEXT,
            item_name TEXT,
            plant_name TEXT,
            posting_date TEXT,
            for_quantity REAL NOT NULL DEFAULT 0,
            total_completed_qty REAL NOT NULL DEFAULT 0,
            process_loss_qty REAL NOT NULL DEFAULT 0,
            total_time_in_mins REAL NOT NULL DEFAULT 0,
            total_machine_operation_time_float REAL NOT NULL DEFAULT 0,
            breakdown_type TEXT,
            wip_warehouse TEXT,
            source_warehouse TEXT,
            hour_rate REAL,
            docstatus INTEGER NOT NULL DEFAULT 0,
            modified TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_job_card_work_order ON job_card(work_order);
        CREATE INDEX IF NOT EXISTS idx_job_card_posting_date ON job_card(posting_date);

        CREATE TABLE IF NOT EXISTS job_card_time_log (
            parent TEXT NOT NULL REFERENCES job_card(name) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            name TEXT,
            from_time TEXT,
            to_time TEXT,
            time_in_mins REAL NOT NULL DEFAULT 0,
            completed_qty REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS job_card_scrap_item (
            parent TEXT NOT NULL REFERENCES job_card(name) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            item_code TEXT NOT NULL,
            item_name TEXT,
            stock_qty REAL NOT NULL DEFAULT 0,
            stock_uom TEXT,
            qty REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS job_card_weight_per_bag (
            parent TEXT NOT NULL REFERENCES job_card(name) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            doctype TEXT NOT NULL,
            values_json TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS machine_maintenance (
            name TEXT PRIMARY KEY,
            machine_name TEXT,
            maintenance_done TEXT,
            previous_worked_hours REAL,
            docstatus INTEGER NOT NULL DEFAULT 0,
            modified TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS stock_entry (
            name TEXT PRIMARY KEY,
            work_order TEXT,
            docstatus INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS stock_entry_detail (
            parent TEXT NOT NULL REFERENCES stock_entry(name) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            item_code TEXT,
            batch_no TEXT,
            serial_and_batch_bundle TEXT,
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS serial_and_batch_entry (
            parent TEXT NOT NULL,
            idx INTEGER NOT NULL,
            batch_no TEXT,
            PRIMARY KEY (parent, idx)
        );

        CREATE TABLE IF NOT EXISTS custom_field (
            name TEXT PRIMARY KEY,
            dt TEXT NOT NULL,
            fieldname TEXT NOT NULL,
            label TEXT,
            fieldtype TEXT NOT NULL,
            precision TEXT,
            insert_after TEXT,
            UNIQUE(dt, fieldname)
        );

        CREATE TABLE IF NOT EXISTS patch_log (
            patch TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    fn shift_count(conn: &Mutex<Connection>) -> i64 {
        conn.lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM shift", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_write_transaction_commits_or_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Mutex::new(conn);

        let failed: Result<(), RepositoryError> = with_write_transaction(&conn, |tx| {
            tx.execute("INSERT INTO shift (name) VALUES ('Shift 1')", [])?;
            Err(RepositoryError::InternalError("handler failed".to_string()))
        });
        assert!(failed.is_err());
        assert_eq!(shift_count(&conn), 0);

        let inserted: Result<usize, RepositoryError> = with_write_transaction(&conn, |tx| {
            Ok(tx.execute("INSERT INTO shift (name) VALUES ('Shift 1')", [])?)
        });
        assert_eq!(inserted.unwrap(), 1);
        assert_eq!(shift_count(&conn), 1);
    }
}
