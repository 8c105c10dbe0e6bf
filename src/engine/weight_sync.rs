// ==========================================
// 定制制造扩展 - 作业卡保存前同步引擎
// ==========================================
// 职责: 每袋重量汇总 → 目标数量；分钟 → 机台作业小时；
//       无时间日志时按班次补默认日志；时间日志未变时保留原完工数量
// 输入: 作业卡当前值 + 保存前版本
// 输出: 原地修改作业卡
// ==========================================

use crate::config::config_manager::{
    DEFAULT_MACHINE_TIME_PRECISION, DEFAULT_WEIGHT_NUMERIC_FIELD_TYPES,
};
use crate::config::config_manager::ConfigView;
use crate::config::config_reader::LedgerConfigReader;
use crate::domain::job_card::{JobCard, TimeLog, TimeLogKey};
use crate::domain::types::{flt, is_blank, round_to, FieldType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::master_data_repo::MasterDataRepository;
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

// ==========================================
// WeightSyncEngine - 保存前同步引擎
// ==========================================
// 配置与主数据均在调用方持有的连接（事务）上读取
#[derive(Default)]
pub struct WeightSyncEngine {
    // 单据类型 → 数值字段名（引擎生命周期内缓存）
    numeric_fields_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl WeightSyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 完整保存前流程：校验阶段重算合计，然后执行同步
    pub fn prepare_for_save(
        &self,
        conn: &Connection,
        doc: &mut JobCard,
        previous: Option<&JobCard>,
        today: NaiveDate,
    ) -> RepositoryResult<()> {
        doc.recompute_totals();
        self.sync_weight_totals(conn, doc, previous, today)
    }

    /// 保存前同步
    ///
    /// # 步骤
    /// 1. 每袋重量数值列合计非 0 时覆盖 for_quantity
    /// 2. total_machine_operation_time_float = 分钟 / 60（按精度四舍五入）
    /// 3. 无时间日志且班次起止时间齐全时补一条默认日志
    /// 4. 时间日志（行数 + 各行完工数量）未变时恢复保存前的完工/损耗数量
    #[instrument(skip(self, conn, doc, previous), fields(job_card = %doc.name))]
    pub fn sync_weight_totals(
        &self,
        conn: &Connection,
        doc: &mut JobCard,
        previous: Option<&JobCard>,
        today: NaiveDate,
    ) -> RepositoryResult<()> {
        let config = ConfigView::new(conn);
        let total_weight = self.weight_total(conn, &config, doc)?;
        if total_weight != 0.0 {
            debug!(total_weight, "按每袋重量覆盖目标数量");
            doc.for_quantity = total_weight;
        }

        let precision = machine_time_precision(&config);
        let total_minutes = doc.total_time_in_mins;
        let total_hours = if total_minutes != 0.0 {
            total_minutes / 60.0
        } else {
            0.0
        };
        doc.total_machine_operation_time_float = round_to(total_hours, precision);

        ensure_shift_time_log(conn, doc, today)?;

        let previous = match previous {
            Some(p) => p,
            None => return Ok(()),
        };

        if time_logs_changed(&doc.time_logs, &previous.time_logs) {
            return Ok(());
        }

        doc.total_completed_qty = previous.total_completed_qty;
        doc.process_loss_qty = previous.process_loss_qty;

        let prev_qty = completed_qty_by_key(&previous.time_logs);
        for row in doc.time_logs.iter_mut() {
            if let Some(qty) = prev_qty.get(&row.key()) {
                row.completed_qty = *qty;
            }
        }
        Ok(())
    }

    // ==========================================
    // 每袋重量
    // ==========================================

    fn weight_total(
        &self,
        conn: &Connection,
        config: &dyn LedgerConfigReader,
        doc: &JobCard,
    ) -> RepositoryResult<f64> {
        let first = match doc.weight_per_bag.first() {
            Some(row) => row,
            None => return Ok(0.0),
        };

        let numeric_fields = self.numeric_fields(conn, config, &first.doctype)?;

        let mut total = 0.0;
        for row in &doc.weight_per_bag {
            for fieldname in &numeric_fields {
                if let Some(value) = row.get(fieldname) {
                    if !is_blank(value) {
                        total += flt(value);
                    }
                }
            }
        }
        Ok(total)
    }

    /// 子表中按数值汇总的字段（按单据类型缓存）
    pub fn numeric_fields(
        &self,
        conn: &Connection,
        config: &dyn LedgerConfigReader,
        doctype: &str,
    ) -> RepositoryResult<Vec<String>> {
        {
            let cache = self
                .numeric_fields_cache
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            if let Some(fields) = cache.get(doctype) {
                return Ok(fields.clone());
            }
        }

        let numeric_types = numeric_field_types(config);
        let fields: Vec<String> = MasterDataRepository::find_custom_fields_on(conn, doctype)?
            .into_iter()
            .filter(|f| f.is_numeric(&numeric_types))
            .map(|f| f.fieldname)
            .collect();

        debug!(doctype, count = fields.len(), "数值字段已缓存");
        let mut cache = self
            .numeric_fields_cache
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        cache.insert(doctype.to_string(), fields.clone());
        Ok(fields)
    }
}

// ==========================================
// 班次默认时间日志
// ==========================================

fn ensure_shift_time_log(conn: &Connection, doc: &mut JobCard, today: NaiveDate) -> RepositoryResult<()> {
    if !doc.time_logs.is_empty() {
        return Ok(());
    }

    let shift_name = match doc.shift_number.clone().filter(|s| !s.is_empty()) {
        Some(s) => s,
        None => return Ok(()),
    };

    let shift = match MasterDataRepository::find_shift_on(conn, &shift_name)? {
        Some(s) => s,
        None => return Ok(()),
    };

    let (from_time, to_time) = match (shift.from_time, shift.to_time) {
        (Some(f), Some(t)) => (f, t),
        _ => return Ok(()),
    };

    let from_dt = today.and_time(from_time);
    let to_date = if to_time <= from_time {
        today + Duration::days(1)
    } else {
        today
    };
    let to_dt = to_date.and_time(to_time);

    let minutes = (to_dt - from_dt).num_seconds() as f64 / 60.0;

    doc.append_time_log(TimeLog {
        from_time: Some(from_dt),
        to_time: Some(to_dt),
        time_in_mins: minutes,
        completed_qty: 0.0,
        ..Default::default()
    });
    debug!(shift = %shift_name, minutes, "已按班次补充时间日志");
    Ok(())
}

// ==========================================
// 配置读取（失败时使用默认值）
// ==========================================

fn numeric_field_types(config: &dyn LedgerConfigReader) -> Vec<FieldType> {
    match config.get_weight_numeric_field_types() {
        Ok(types) => types,
        Err(e) => {
            warn!(error = %e, "读取数值字段类型配置失败，使用默认值");
            DEFAULT_WEIGHT_NUMERIC_FIELD_TYPES
                .split(',')
                .map(FieldType::from_str)
                .collect()
        }
    }
}

fn machine_time_precision(config: &dyn LedgerConfigReader) -> u32 {
    match config.get_machine_time_precision() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "读取机台时长精度配置失败，使用默认值");
            DEFAULT_MACHINE_TIME_PRECISION
        }
    }
}

fn completed_qty_by_key(rows: &[TimeLog]) -> HashMap<TimeLogKey, f64> {
    rows.iter().map(|r| (r.key(), r.completed_qty)).collect()
}

/// 时间日志是否变化（行数或任一行完工数量）
fn time_logs_changed(current: &[TimeLog], previous: &[TimeLog]) -> bool {
    if current.len() != previous.len() {
        return true;
    }
    let prev_qty = completed_qty_by_key(previous);
    current
        .iter()
        .any(|row| prev_qty.get(&row.key()) != Some(&row.completed_qty))
}
