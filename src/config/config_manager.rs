// ==========================================
// 定制制造扩展 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::config_reader::LedgerConfigReader;
use crate::domain::types::FieldType;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// 默认值
// ==========================================
pub const DEFAULT_WEIGHT_NUMERIC_FIELD_TYPES: &str = "Float,Currency,Int,Percent";
pub const DEFAULT_MACHINE_TIME_PRECISION: u32 = 2;
pub const DEFAULT_BREAKDOWN_CHART_TOP_N: usize = 10;
pub const DEFAULT_LOCALE: &str = "en";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        ConfigView::new(&conn).get_config_value(key)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 界面语言
    pub fn get_locale(&self) -> Result<String, Box<dyn Error>> {
        let value = self
            .get_config_value(config_keys::LOCALE)?
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let value = value.trim();
        if value.is_empty() {
            Ok(DEFAULT_LOCALE.to_string())
        } else {
            Ok(value.to_string())
        }
    }
}

// ==========================================
// ConfigView - 借用连接的只读配置视图
// ==========================================
// 单据事务内已持有连接锁时使用
pub struct ConfigView<'a> {
    conn: &'a Connection,
}

impl<'a> ConfigView<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let result = self.conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }
}

// ==========================================
// LedgerConfigReader Trait 实现
// ==========================================
impl LedgerConfigReader for ConfigManager {
    fn get_weight_numeric_field_types(&self) -> Result<Vec<FieldType>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        ConfigView::new(&conn).get_weight_numeric_field_types()
    }

    fn get_machine_time_precision(&self) -> Result<u32, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        ConfigView::new(&conn).get_machine_time_precision()
    }

    fn get_breakdown_chart_top_n(&self) -> Result<usize, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        ConfigView::new(&conn).get_breakdown_chart_top_n()
    }
}

impl LedgerConfigReader for ConfigView<'_> {
    fn get_weight_numeric_field_types(&self) -> Result<Vec<FieldType>, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::WEIGHT_NUMERIC_FIELD_TYPES,
            DEFAULT_WEIGHT_NUMERIC_FIELD_TYPES,
        )?;

        let types: Vec<FieldType> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(FieldType::from_str)
            .collect();

        if types.is_empty() {
            Ok(DEFAULT_WEIGHT_NUMERIC_FIELD_TYPES
                .split(',')
                .map(FieldType::from_str)
                .collect())
        } else {
            Ok(types)
        }
    }

    fn get_machine_time_precision(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::MACHINE_TIME_PRECISION,
            &DEFAULT_MACHINE_TIME_PRECISION.to_string(),
        )?;
        Ok(value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|p| *p <= 9)
            .unwrap_or(DEFAULT_MACHINE_TIME_PRECISION))
    }

    fn get_breakdown_chart_top_n(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::BREAKDOWN_CHART_TOP_N,
            &DEFAULT_BREAKDOWN_CHART_TOP_N.to_string(),
        )?;
        Ok(value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BREAKDOWN_CHART_TOP_N))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 作业卡
    pub const WEIGHT_NUMERIC_FIELD_TYPES: &str = "weight_numeric_field_types";
    pub const MACHINE_TIME_PRECISION: &str = "machine_time_precision";

    // 报表
    pub const BREAKDOWN_CHART_TOP_N: &str = "breakdown_chart_top_n";

    // 界面
    pub const LOCALE: &str = "locale";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cm = setup_manager();
        assert_eq!(
            cm.get_weight_numeric_field_types().unwrap(),
            vec![FieldType::Float, FieldType::Currency, FieldType::Int, FieldType::Percent]
        );
        assert_eq!(cm.get_machine_time_precision().unwrap(), 2);
        assert_eq!(cm.get_breakdown_chart_top_n().unwrap(), 10);
        assert_eq!(cm.get_locale().unwrap(), "en");
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let cm = setup_manager();
        cm.set_global_config_value(config_keys::WEIGHT_NUMERIC_FIELD_TYPES, "Float, Int")
            .unwrap();
        cm.set_global_config_value(config_keys::MACHINE_TIME_PRECISION, "3").unwrap();
        cm.set_global_config_value(config_keys::BREAKDOWN_CHART_TOP_N, "0").unwrap();

        assert_eq!(
            cm.get_weight_numeric_field_types().unwrap(),
            vec![FieldType::Float, FieldType::Int]
        );
        assert_eq!(cm.get_machine_time_precision().unwrap(), 3);
        assert_eq!(cm.get_breakdown_chart_top_n().unwrap(), 10);
    }

    #[test]
    fn test_snapshot() {
        let cm = setup_manager();
        cm.set_global_config_value(config_keys::LOCALE, "zh-CN").unwrap();
        let snapshot: HashMap<String, String> =
            serde_json::from_str(&cm.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("locale").map(String::as_str), Some("zh-CN"));
    }
}
