// ==========================================
// 补丁: 作业卡机台作业时长改为小数字段
// ==========================================
// 步骤:
// 1. 确保 job_card-total_machine_operation_time_float 字段元数据
//    (Float / 精度 2 / 位于 total_time_in_mins 之后)
// 2. 确保 job_card.total_machine_operation_time_float 为 REAL 列
// 3. 旧整数列存在时复制数据并删除旧列
// 4. 删除旧字段元数据
// ==========================================

use crate::domain::custom_field::CustomField;
use crate::domain::types::FieldType;
use crate::patches::PatchReport;
use crate::repository::error::RepositoryResult;
use crate::repository::master_data_repo::MasterDataRepository;
use crate::repository::patch_repo::PatchRepository;
use rusqlite::Connection;
use tracing::{info, instrument};

pub const PATCH_NAME: &str = "convert_job_card_machine_time_to_float";

const DOCTYPE: &str = "job_card";
const OLD_FIELD: &str = "total_machine_operation_time";
const NEW_FIELD: &str = "total_machine_operation_time_float";
const FIELD_LABEL: &str = "Total Machine operation time";
const FIELD_PRECISION: &str = "2";
const INSERT_AFTER: &str = "total_time_in_mins";

/// 执行补丁（已执行过时返回 applied=false 的报告）
#[instrument(skip(repo))]
pub fn execute(repo: &PatchRepository) -> RepositoryResult<PatchReport> {
    let outcome = repo.apply(PATCH_NAME, |conn| {
        let mut report = PatchReport::new(PATCH_NAME);
        report.applied = true;

        ensure_field_metadata(conn, &mut report)?;
        ensure_decimal_column(conn, &mut report)?;
        migrate_legacy_column(conn, &mut report)?;

        let legacy = CustomField::key(DOCTYPE, OLD_FIELD);
        if PatchRepository::delete_custom_field(conn, &legacy)? {
            report.step(format!("deleted custom field {}", legacy));
        }
        Ok(report)
    })?;

    match outcome {
        Some(report) => {
            info!(patch = PATCH_NAME, steps = report.steps.len(), "补丁执行完成");
            Ok(report)
        }
        None => {
            info!(patch = PATCH_NAME, "补丁已执行过，跳过");
            Ok(PatchReport::new(PATCH_NAME))
        }
    }
}

fn ensure_field_metadata(conn: &Connection, report: &mut PatchReport) -> RepositoryResult<()> {
    let existing = MasterDataRepository::find_custom_field_on(conn, DOCTYPE, NEW_FIELD)?;

    let field = match existing {
        Some(mut field) => {
            let mut changed = Vec::new();
            if field.fieldtype != FieldType::Float {
                field.fieldtype = FieldType::Float;
                changed.push("fieldtype");
            }
            if field.precision.as_deref().map(str::trim) != Some(FIELD_PRECISION) {
                field.precision = Some(FIELD_PRECISION.to_string());
                changed.push("precision");
            }
            if field.insert_after.as_deref() != Some(INSERT_AFTER) {
                field.insert_after = Some(INSERT_AFTER.to_string());
                changed.push("insert_after");
            }
            if changed.is_empty() {
                return Ok(());
            }
            report.step(format!("updated custom field {} ({})", field.name(), changed.join(", ")));
            field
        }
        None => {
            let field = CustomField {
                dt: DOCTYPE.to_string(),
                fieldname: NEW_FIELD.to_string(),
                label: Some(FIELD_LABEL.to_string()),
                fieldtype: FieldType::Float,
                precision: Some(FIELD_PRECISION.to_string()),
                insert_after: Some(INSERT_AFTER.to_string()),
            };
            report.step(format!("created custom field {}", field.name()));
            field
        }
    };

    MasterDataRepository::upsert_custom_field_on(conn, &field)
}

fn ensure_decimal_column(conn: &Connection, report: &mut PatchReport) -> RepositoryResult<()> {
    let info = match PatchRepository::column_info(conn, DOCTYPE, NEW_FIELD)? {
        Some(info) => info,
        None => {
            PatchRepository::add_decimal_column(conn, DOCTYPE, NEW_FIELD)?;
            report.step(format!("added column {}.{}", DOCTYPE, NEW_FIELD));
            return Ok(());
        }
    };

    if info.is_decimal() {
        return Ok(());
    }

    // SQLite 不支持修改列类型：改名 → 新建 → 复制 → 删除
    let staging = format!("{}_legacy_type", NEW_FIELD);
    PatchRepository::rename_column(conn, DOCTYPE, NEW_FIELD, &staging)?;
    PatchRepository::add_decimal_column(conn, DOCTYPE, NEW_FIELD)?;
    PatchRepository::copy_numeric_column(conn, DOCTYPE, &staging, NEW_FIELD)?;
    PatchRepository::drop_column(conn, DOCTYPE, &staging)?;
    report.step(format!(
        "rebuilt column {}.{} as REAL (was {})",
        DOCTYPE, NEW_FIELD, info.decl_type
    ));
    Ok(())
}

fn migrate_legacy_column(conn: &Connection, report: &mut PatchReport) -> RepositoryResult<()> {
    if !PatchRepository::column_exists(conn, DOCTYPE, OLD_FIELD)? {
        return Ok(());
    }

    let rows = PatchRepository::copy_numeric_column(conn, DOCTYPE, OLD_FIELD, NEW_FIELD)?;
    PatchRepository::drop_column(conn, DOCTYPE, OLD_FIELD)?;
    report.step(format!("copied {} rows from {} and dropped it", rows, OLD_FIELD));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use std::sync::{Arc, Mutex};

    fn setup() -> (PatchRepository, Arc<Mutex<Connection>>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (PatchRepository::from_connection(conn.clone()), conn)
    }

    fn machine_time(conn: &Connection, name: &str) -> f64 {
        conn.query_row(
            "SELECT total_machine_operation_time_float FROM job_card WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_database_only_creates_metadata() {
        let (repo, conn) = setup();

        let report = execute(&repo).unwrap();
        assert!(report.applied);
        assert_eq!(report.steps.len(), 1);

        let guard = conn.lock().unwrap();
        let field = MasterDataRepository::find_custom_field_on(&guard, DOCTYPE, NEW_FIELD)
            .unwrap()
            .unwrap();
        assert_eq!(field.fieldtype, FieldType::Float);
        assert_eq!(field.precision.as_deref(), Some("2"));
        assert_eq!(field.insert_after.as_deref(), Some("total_time_in_mins"));
    }

    #[test]
    fn test_legacy_column_is_copied_and_dropped() {
        let (repo, conn) = setup();
        {
            let guard = conn.lock().unwrap();
            guard
                .execute_batch(
                    r#"
                    ALTER TABLE job_card ADD COLUMN total_machine_operation_time INTEGER;
                    INSERT INTO job_card (name, total_machine_operation_time) VALUES ('JC-1', 3);
                    INSERT INTO job_card (name, total_machine_operation_time) VALUES ('JC-2', NULL);
                    INSERT INTO custom_field (name, dt, fieldname, fieldtype)
                    VALUES ('job_card-total_machine_operation_time', 'job_card',
                            'total_machine_operation_time', 'Int');
                    "#,
                )
                .unwrap();
        }

        let report = execute(&repo).unwrap();
        assert!(report.applied);

        let guard = conn.lock().unwrap();
        assert_eq!(machine_time(&guard, "JC-1"), 3.0);
        assert_eq!(machine_time(&guard, "JC-2"), 0.0);
        assert!(!PatchRepository::column_exists(&guard, DOCTYPE, OLD_FIELD).unwrap());
        assert!(MasterDataRepository::find_custom_field_on(&guard, DOCTYPE, OLD_FIELD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_integer_column_is_rebuilt_and_metadata_fixed() {
        let (repo, conn) = setup();
        {
            let guard = conn.lock().unwrap();
            guard
                .execute_batch(
                    r#"
                    ALTER TABLE job_card DROP COLUMN total_machine_operation_time_float;
                    ALTER TABLE job_card ADD COLUMN total_machine_operation_time_float INTEGER;
                    INSERT INTO job_card (name, total_machine_operation_time_float) VALUES ('JC-1', 2);
                    INSERT INTO custom_field (name, dt, fieldname, fieldtype, precision, insert_after)
                    VALUES ('job_card-total_machine_operation_time_float', 'job_card',
                            'total_machine_operation_time_float', 'Int', ' 2 ', 'operation');
                    "#,
                )
                .unwrap();
        }

        let report = execute(&repo).unwrap();
        assert!(report.steps.iter().any(|s| s.starts_with("rebuilt column")));
        assert!(report.steps.iter().any(|s| s.contains("fieldtype, insert_after")));

        let guard = conn.lock().unwrap();
        let info = PatchRepository::column_info(&guard, DOCTYPE, NEW_FIELD).unwrap().unwrap();
        assert!(info.is_decimal());
        assert_eq!(machine_time(&guard, "JC-1"), 2.0);
    }

    #[test]
    fn test_second_run_is_skipped() {
        let (repo, _conn) = setup();
        assert!(execute(&repo).unwrap().applied);

        let second = execute(&repo).unwrap();
        assert!(!second.applied);
        assert!(second.steps.is_empty());
    }
}
