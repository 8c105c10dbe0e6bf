// ==========================================
// 定制制造扩展 - 作业卡领域模型
// ==========================================
// 对齐: job_card / job_card_time_log / job_card_scrap_item /
//       job_card_weight_per_bag 表
// ==========================================

use crate::domain::types::DocStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 每袋重量子表的默认单据类型
pub const WEIGHT_PER_BAG_DOCTYPE: &str = "job_card_weight_per_bag";

// ==========================================
// JobCard - 作业卡
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobCard {
    pub name: String,
    pub work_order: Option<String>,
    pub workstation: Option<String>,
    pub workstation_type: Option<String>,
    pub operation: Option<String>,
    pub operation_id: Option<String>, // 工单工序行ID
    pub shift_number: Option<String>, // 班次
    pub bom_no: Option<String>,
    pub sequence_id: Option<i64>,
    pub batch_size: Option<f64>,
    pub production_item: Option<String>,
    pub item_name: Option<String>,
    pub plant_name: Option<String>,
    pub posting_date: Option<NaiveDate>,

    // ===== 数量与工时 =====
    pub for_quantity: f64,
    pub total_completed_qty: f64,
    pub process_loss_qty: f64,
    pub total_time_in_mins: f64,
    pub total_machine_operation_time_float: f64, // 机台作业时长 (小时)

    pub breakdown_type: Option<String>,
    pub wip_warehouse: Option<String>,
    pub source_warehouse: Option<String>,
    pub hour_rate: Option<f64>,

    pub docstatus: DocStatus,

    // ===== 子表 =====
    pub time_logs: Vec<TimeLog>,
    pub scrap_items: Vec<JobCardScrapItem>,
    pub weight_per_bag: Vec<WeightRow>,
}

impl JobCard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 按时间日志重算完工数量与总工时（无时间日志时保持原值）
    pub fn recompute_totals(&mut self) {
        if self.time_logs.is_empty() {
            return;
        }
        self.total_completed_qty = self.time_logs.iter().map(|r| r.completed_qty).sum();
        self.total_time_in_mins = self.time_logs.iter().map(|r| r.time_in_mins).sum();
    }

    /// 追加时间日志（自动编号 idx）
    pub fn append_time_log(&mut self, mut row: TimeLog) {
        row.idx = self.time_logs.len() as i64 + 1;
        self.time_logs.push(row);
    }

    /// 追加废料行（自动编号 idx）
    pub fn append_scrap_item(&mut self, mut row: JobCardScrapItem) {
        row.idx = self.scrap_items.len() as i64 + 1;
        self.scrap_items.push(row);
    }
}

// ==========================================
// JobCardKey - 自动生成去重键
// ==========================================
// 工序行 × 工作站 × 班次
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobCardKey {
    pub operation_id: Option<String>,
    pub workstation: Option<String>,
    pub shift_number: Option<String>,
}

impl JobCardKey {
    pub fn new(operation_id: &str, workstation: &str, shift_number: &str) -> Self {
        Self {
            operation_id: Some(operation_id.to_string()),
            workstation: Some(workstation.to_string()),
            shift_number: Some(shift_number.to_string()),
        }
    }
}

// ==========================================
// TimeLog - 时间日志子表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimeLog {
    pub name: Option<String>, // 持久化后分配
    pub idx: i64,
    pub from_time: Option<NaiveDateTime>,
    pub to_time: Option<NaiveDateTime>,
    pub time_in_mins: f64,
    pub completed_qty: f64,
}

/// 时间日志行标识：优先行名，其次序号
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimeLogKey {
    Name(String),
    Idx(i64),
}

impl TimeLog {
    pub fn key(&self) -> TimeLogKey {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => TimeLogKey::Name(name.to_string()),
            None => TimeLogKey::Idx(self.idx),
        }
    }
}

// ==========================================
// JobCardScrapItem - 废料/副产品子表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobCardScrapItem {
    pub idx: i64,
    pub item_code: String,
    pub item_name: Option<String>,
    pub stock_qty: f64,
    pub stock_uom: Option<String>,
    pub qty: f64,
}

// ==========================================
// WeightRow - 每袋重量子表
// ==========================================
// 列为动态字段，数值列由字段元数据判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub idx: i64,
    pub doctype: String,
    pub values: BTreeMap<String, Value>,
}

impl WeightRow {
    pub fn new(idx: i64, values: BTreeMap<String, Value>) -> Self {
        Self {
            idx,
            doctype: WEIGHT_PER_BAG_DOCTYPE.to_string(),
            values,
        }
    }

    pub fn get(&self, fieldname: &str) -> Option<&Value> {
        self.values.get(fieldname)
    }
}
