// ==========================================
// 定制制造扩展 - 工单 / 班次 / BOM 废料
// ==========================================
// 对齐: work_order / work_order_operation / shift / bom_scrap_item 表
// ==========================================

use crate::domain::types::DocStatus;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ==========================================
// WorkOrder - 工单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkOrder {
    pub name: String,
    pub production_item: Option<String>,
    pub item_name: Option<String>,
    pub bom_no: Option<String>,
    pub qty: f64,
    pub plant_name: Option<String>, // 生产车间（为空时不自动生成作业卡）
    pub docstatus: DocStatus,
    pub operations: Vec<WorkOrderOperation>,
}

impl WorkOrder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn plant(&self) -> Option<&str> {
        self.plant_name.as_deref().filter(|p| !p.trim().is_empty())
    }
}

// ==========================================
// WorkOrderOperation - 工单工序行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkOrderOperation {
    pub name: String, // 工序行ID
    pub idx: i64,
    pub operation: String,
    pub bom: Option<String>, // 工序级 BOM（为空时使用工单 BOM）
    pub sequence_id: Option<i64>,
    pub batch_size: Option<f64>,
    pub wip_warehouse: Option<String>,
    pub source_warehouse: Option<String>,
    pub hour_rate: Option<f64>,
}

// ==========================================
// Shift - 班次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub name: String,
    pub from_time: Option<NaiveTime>,
    pub to_time: Option<NaiveTime>,
}

// ==========================================
// BomScrapItem - BOM 废料行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomScrapItem {
    pub item_code: String,
    pub item_name: Option<String>,
    pub stock_qty: f64,
    pub stock_uom: Option<String>,
}
