// ==========================================
// 定制制造扩展 - 报表层
// ==========================================
// 职责: 只读报表（列定义 + 数据行 + 汇总卡片 + 图表数据）
// 红线: 不做渲染；数据访问经由 ReportRepository
// ==========================================

pub mod breakdown_summary;
pub mod parts_replacement;
pub mod shift_summary;

pub use breakdown_summary::BreakdownSummaryReport;
pub use parts_replacement::PartsReplacementReport;
pub use shift_summary::{get_shift_key, ShiftSummaryReport};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

// ==========================================
// 报表类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    JobCardShiftSummary,
    MachineBreakdownSummary,
    WorkstationPartsReplacement,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::JobCardShiftSummary => "job_card_shift_summary",
            ReportKind::MachineBreakdownSummary => "machine_breakdown_summary",
            ReportKind::WorkstationPartsReplacement => "workstation_parts_replacement",
        }
    }

    /// 解析报表名称（支持下划线全名与 CLI 短名）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "job_card_shift_summary" | "shift_summary" => Some(ReportKind::JobCardShiftSummary),
            "machine_breakdown_summary" | "breakdown_summary" => {
                Some(ReportKind::MachineBreakdownSummary)
            }
            "workstation_parts_replacement" | "parts_replacement" => {
                Some(ReportKind::WorkstationPartsReplacement)
            }
            _ => None,
        }
    }
}

// ==========================================
// 报表输入 / 输出结构
// ==========================================

/// 报表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilters {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub plant: Option<String>,
}

impl ReportFilters {
    pub fn plant(&self) -> Option<&str> {
        self.plant.as_deref().filter(|p| !p.is_empty())
    }
}

/// 列定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub label: String,
    pub fieldname: String,
    pub fieldtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    pub width: u32,
}

impl ReportColumn {
    pub fn new(label: String, fieldname: &str, fieldtype: &str, width: u32) -> Self {
        Self {
            label,
            fieldname: fieldname.to_string(),
            fieldtype: fieldtype.to_string(),
            options: None,
            width,
        }
    }

    pub fn link(label: String, fieldname: &str, options: &str, width: u32) -> Self {
        Self {
            options: Some(options.to_string()),
            ..Self::new(label, fieldname, "Link", width)
        }
    }
}

/// 汇总卡片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub value: Value,
    pub label: String,
    pub indicator: String,
}

/// 图表数据集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub name: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarOptions {
    #[serde(rename = "spaceRatio")]
    pub space_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTitle {
    pub title: String,
}

/// 图表定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub data: ChartPayload,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub colors: Vec<String>,
    #[serde(rename = "barOptions")]
    pub bar_options: BarOptions,
    #[serde(rename = "valuesOverPoints")]
    pub values_over_points: bool,
    pub fieldtype: String,
    #[serde(rename = "yAxis")]
    pub y_axis: Vec<AxisTitle>,
    pub title: String,
}

/// 报表输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub columns: Vec<ReportColumn>,
    pub data: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<SummaryCard>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartData>,
}

impl ReportOutput {
    pub fn table(columns: Vec<ReportColumn>, data: Vec<Value>) -> Self {
        Self {
            columns,
            data,
            summary: None,
            chart: None,
        }
    }

    /// 以 CSV 输出（表头为列标签，按列顺序取值）
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.label.as_str()))?;

        for row in &self.data {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| match row.get(&c.fieldname) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(v) => v.to_string(),
                })
                .collect();
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
