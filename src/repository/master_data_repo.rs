// ==========================================
// 定制制造扩展 - 主数据仓储
// ==========================================
// 范围: 班次 / BOM 废料 / 库存凭证批次 / 自定义字段元数据
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::custom_field::CustomField;
use crate::domain::types::{DocStatus, FieldType};
use crate::domain::work_order::{BomScrapItem, Shift};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 解析班次时刻（"HH:MM:SS" 或 "HH:MM"），无法解析时返回 None
pub fn parse_time_of_day(raw: Option<String>) -> Option<NaiveTime> {
    let raw = raw?;
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// 库存凭证明细（仅批次相关字段）
#[derive(Debug, Clone, Default)]
pub struct StockEntryDetailInput {
    pub item_code: Option<String>,
    pub batch_no: Option<String>,
    pub serial_and_batch_bundle: Option<String>,
}

// ==========================================
// MasterDataRepository - 主数据仓储
// ==========================================
pub struct MasterDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MasterDataRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 班次
    // ==========================================

    /// 新建班次（时刻以 "HH:MM:SS" 文本保存）
    pub fn insert_shift(&self, shift: &Shift) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO shift (name, from_time, to_time) VALUES (?1, ?2, ?3)",
            params![
                shift.name,
                shift.from_time.map(|t| t.format("%H:%M:%S").to_string()),
                shift.to_time.map(|t| t.format("%H:%M:%S").to_string()),
            ],
        )?;
        Ok(())
    }

    fn map_shift(row: &Row<'_>) -> SqliteResult<Shift> {
        Ok(Shift {
            name: row.get(0)?,
            from_time: parse_time_of_day(row.get(1)?),
            to_time: parse_time_of_day(row.get(2)?),
        })
    }

    /// 全部班次（按名称排序）
    pub fn list_shifts(&self) -> RepositoryResult<Vec<Shift>> {
        Self::list_shifts_on(&*self.get_conn()?)
    }

    pub fn list_shifts_on(conn: &Connection) -> RepositoryResult<Vec<Shift>> {
        let mut stmt = conn.prepare("SELECT name, from_time, to_time FROM shift ORDER BY name ASC")?;
        let shifts = stmt
            .query_map([], Self::map_shift)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(shifts)
    }

    /// 按名称查询班次
    pub fn find_shift(&self, name: &str) -> RepositoryResult<Option<Shift>> {
        Self::find_shift_on(&*self.get_conn()?, name)
    }

    pub fn find_shift_on(conn: &Connection, name: &str) -> RepositoryResult<Option<Shift>> {
        let shift = conn
            .query_row(
                "SELECT name, from_time, to_time FROM shift WHERE name = ?1",
                params![name],
                Self::map_shift,
            )
            .optional()?;
        Ok(shift)
    }

    // ==========================================
    // BOM 废料
    // ==========================================

    /// 新建 BOM 废料行
    pub fn insert_bom_scrap_item(&self, bom: &str, idx: i64, item: &BomScrapItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO bom_scrap_item (parent, idx, item_code, item_name, stock_qty, stock_uom)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![bom, idx, item.item_code, item.item_name, item.stock_qty, item.stock_uom],
        )?;
        Ok(())
    }

    /// BOM 的废料行（按 idx 排序）
    pub fn find_bom_scrap_items(&self, bom: &str) -> RepositoryResult<Vec<BomScrapItem>> {
        Self::find_bom_scrap_items_on(&*self.get_conn()?, bom)
    }

    pub fn find_bom_scrap_items_on(
        conn: &Connection,
        bom: &str,
    ) -> RepositoryResult<Vec<BomScrapItem>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT item_code, item_name, stock_qty, stock_uom
            FROM bom_scrap_item
            WHERE parent = ?1
            ORDER BY idx
            "#,
        )?;
        let items = stmt
            .query_map(params![bom], |row| {
                Ok(BomScrapItem {
                    item_code: row.get(0)?,
                    item_name: row.get(1)?,
                    stock_qty: row.get(2)?,
                    stock_uom: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    // ==========================================
    // 库存凭证
    // ==========================================

    /// 新建库存凭证（含明细）
    pub fn insert_stock_entry(
        &self,
        name: &str,
        work_order: &str,
        docstatus: DocStatus,
        details: &[StockEntryDetailInput],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO stock_entry (name, work_order, docstatus) VALUES (?1, ?2, ?3)",
            params![name, work_order, docstatus.as_i64()],
        )?;
        for (i, d) in details.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO stock_entry_detail (parent, idx, item_code, batch_no, serial_and_batch_bundle)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![name, i as i64 + 1, d.item_code, d.batch_no, d.serial_and_batch_bundle],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 新建序列号与批次包明细
    pub fn insert_serial_and_batch_entry(&self, bundle: &str, idx: i64, batch_no: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO serial_and_batch_entry (parent, idx, batch_no) VALUES (?1, ?2, ?3)",
            params![bundle, idx, batch_no],
        )?;
        Ok(())
    }

    // ==========================================
    // 自定义字段元数据
    // ==========================================

    /// 新建或覆盖自定义字段
    pub fn upsert_custom_field(&self, field: &CustomField) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_custom_field_on(&conn, field)
    }

    /// 在给定连接（可为事务）上写入自定义字段
    pub fn upsert_custom_field_on(conn: &Connection, field: &CustomField) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO custom_field (name, dt, fieldname, label, fieldtype, precision, insert_after)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(name) DO UPDATE SET
                label = excluded.label,
                fieldtype = excluded.fieldtype,
                precision = excluded.precision,
                insert_after = excluded.insert_after
            "#,
            params![
                field.name(),
                field.dt,
                field.fieldname,
                field.label,
                field.fieldtype.as_str(),
                field.precision,
                field.insert_after,
            ],
        )?;
        Ok(())
    }

    fn map_custom_field(row: &Row<'_>) -> SqliteResult<CustomField> {
        Ok(CustomField {
            dt: row.get(0)?,
            fieldname: row.get(1)?,
            label: row.get(2)?,
            fieldtype: FieldType::from_str(&row.get::<_, String>(3)?),
            precision: row.get(4)?,
            insert_after: row.get(5)?,
        })
    }

    /// 查询单个自定义字段
    pub fn find_custom_field(&self, dt: &str, fieldname: &str) -> RepositoryResult<Option<CustomField>> {
        let conn = self.get_conn()?;
        Self::find_custom_field_on(&conn, dt, fieldname)
    }

    pub fn find_custom_field_on(
        conn: &Connection,
        dt: &str,
        fieldname: &str,
    ) -> RepositoryResult<Option<CustomField>> {
        let field = conn
            .query_row(
                r#"
                SELECT dt, fieldname, label, fieldtype, precision, insert_after
                FROM custom_field
                WHERE name = ?1
                "#,
                params![CustomField::key(dt, fieldname)],
                Self::map_custom_field,
            )
            .optional()?;
        Ok(field)
    }

    /// 单据类型的全部字段元数据
    pub fn find_custom_fields(&self, dt: &str) -> RepositoryResult<Vec<CustomField>> {
        Self::find_custom_fields_on(&*self.get_conn()?, dt)
    }

    pub fn find_custom_fields_on(
        conn: &Connection,
        dt: &str,
    ) -> RepositoryResult<Vec<CustomField>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT dt, fieldname, label, fieldtype, precision, insert_after
            FROM custom_field
            WHERE dt = ?1
            ORDER BY fieldname
            "#,
        )?;
        let fields = stmt
            .query_map(params![dt], Self::map_custom_field)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_repo() -> MasterDataRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        MasterDataRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day(Some("22:00".to_string())),
            NaiveTime::from_hms_opt(22, 0, 0)
        );
        assert_eq!(
            parse_time_of_day(Some("06:30:15".to_string())),
            NaiveTime::from_hms_opt(6, 30, 15)
        );
        assert_eq!(parse_time_of_day(Some("not a time".to_string())), None);
        assert_eq!(parse_time_of_day(Some(" ".to_string())), None);
        assert_eq!(parse_time_of_day(None), None);
    }

    #[test]
    fn test_shifts_sorted_by_name() {
        let repo = setup_repo();
        for name in ["Shift 3", "Shift 1", "Shift 2"] {
            repo.insert_shift(&Shift {
                name: name.to_string(),
                from_time: NaiveTime::from_hms_opt(6, 0, 0),
                to_time: NaiveTime::from_hms_opt(14, 0, 0),
            })
            .unwrap();
        }
        let names: Vec<String> = repo.list_shifts().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Shift 1", "Shift 2", "Shift 3"]);

        let s = repo.find_shift("Shift 2").unwrap().unwrap();
        assert_eq!(s.to_time, NaiveTime::from_hms_opt(14, 0, 0));
    }

    #[test]
    fn test_custom_field_upsert() {
        let repo = setup_repo();
        let mut field = CustomField {
            dt: "job_card".to_string(),
            fieldname: "x".to_string(),
            label: None,
            fieldtype: FieldType::Int,
            precision: None,
            insert_after: None,
        };
        repo.upsert_custom_field(&field).unwrap();
        field.fieldtype = FieldType::Float;
        repo.upsert_custom_field(&field).unwrap();

        let found = repo.find_custom_field("job_card", "x").unwrap().unwrap();
        assert_eq!(found.fieldtype, FieldType::Float);
        assert_eq!(repo.find_custom_fields("job_card").unwrap().len(), 1);
    }
}
