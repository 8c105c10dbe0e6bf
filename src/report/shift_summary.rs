// ==========================================
// 定制制造扩展 - 作业卡班次汇总报表
// ==========================================
// 口径: 已提交作业卡，按产品 × 班次汇总完工数量；
//       每个产品行后附副产品（废料）行
// ==========================================

use crate::i18n::{t, t_with_args};
use crate::report::{ReportColumn, ReportFilters, ReportOutput};
use crate::repository::error::RepositoryResult;
use crate::repository::report_repo::ReportRepository;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::instrument;

pub const SHIFT_1_QTY: &str = "shift_1_qty";
pub const SHIFT_2_QTY: &str = "shift_2_qty";
pub const SHIFT_3_QTY: &str = "shift_3_qty";

/// 班次名称 → 汇总列
///
/// 含 "1" 或以 "one" 结尾 → 1 班，依此类推；其余不计入
pub fn get_shift_key(shift_name: Option<&str>) -> Option<&'static str> {
    let value = shift_name?.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if value.contains('1') || value.ends_with("one") {
        return Some(SHIFT_1_QTY);
    }
    if value.contains('2') || value.ends_with("two") {
        return Some(SHIFT_2_QTY);
    }
    if value.contains('3') || value.ends_with("three") {
        return Some(SHIFT_3_QTY);
    }
    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ShiftTotals {
    shift_1: f64,
    shift_2: f64,
    shift_3: f64,
}

impl ShiftTotals {
    fn add(&mut self, key: &str, qty: f64) {
        match key {
            SHIFT_1_QTY => self.shift_1 += qty,
            SHIFT_2_QTY => self.shift_2 += qty,
            SHIFT_3_QTY => self.shift_3 += qty,
            _ => {}
        }
    }

    fn total(&self) -> f64 {
        self.shift_1 + self.shift_2 + self.shift_3
    }
}

#[derive(Debug, Serialize)]
struct ShiftSummaryRow {
    metric: String,
    batch_numbers: String,
    total_qty: f64,
    shift_1_qty: f64,
    shift_2_qty: f64,
    shift_3_qty: f64,
}

impl ShiftSummaryRow {
    fn new(metric: String, batch_numbers: String, totals: &ShiftTotals) -> Self {
        Self {
            metric,
            batch_numbers,
            total_qty: totals.total(),
            shift_1_qty: totals.shift_1,
            shift_2_qty: totals.shift_2,
            shift_3_qty: totals.shift_3,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

// ==========================================
// ShiftSummaryReport
// ==========================================
pub struct ShiftSummaryReport {
    report_repo: Arc<ReportRepository>,
}

impl ShiftSummaryReport {
    pub fn new(report_repo: Arc<ReportRepository>) -> Self {
        Self { report_repo }
    }

    pub fn columns() -> Vec<ReportColumn> {
        vec![
            ReportColumn::new(t("report.column.items"), "metric", "Data", 260),
            ReportColumn::new(t("report.column.batch_numbers"), "batch_numbers", "Data", 200),
            ReportColumn::new(t("report.column.total_qty"), "total_qty", "Float", 130),
            ReportColumn::new(t("report.column.shift_1_qty"), SHIFT_1_QTY, "Float", 120),
            ReportColumn::new(t("report.column.shift_2_qty"), SHIFT_2_QTY, "Float", 120),
            ReportColumn::new(t("report.column.shift_3_qty"), SHIFT_3_QTY, "Float", 120),
        ]
    }

    #[instrument(skip(self))]
    pub fn execute(&self, filters: &ReportFilters) -> RepositoryResult<ReportOutput> {
        let data = self
            .build_rows(filters)?
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReportOutput::table(Self::columns(), data))
    }

    fn build_rows(&self, filters: &ReportFilters) -> RepositoryResult<Vec<ShiftSummaryRow>> {
        let job_cards = self.report_repo.fetch_submitted_job_cards(
            filters.from_date,
            filters.to_date,
            filters.plant(),
        )?;
        if job_cards.is_empty() {
            return Ok(Vec::new());
        }

        let unknown_item = t("report.unknown_item");

        let mut item_totals: HashMap<String, ShiftTotals> = HashMap::new();
        let mut item_labels: HashMap<String, String> = HashMap::new();
        let mut item_work_orders: HashMap<String, BTreeSet<String>> = HashMap::new();
        // 作业卡 → (班次列, 产品)
        let mut shift_lookup: HashMap<String, (Option<&'static str>, String)> = HashMap::new();
        let mut all_work_orders: BTreeSet<String> = BTreeSet::new();

        for jc in &job_cards {
            let item_code = non_empty(jc.production_item.as_ref())
                .unwrap_or(unknown_item.as_str())
                .to_string();
            let label = non_empty(jc.item_name.as_ref())
                .or_else(|| non_empty(jc.production_item.as_ref()))
                .unwrap_or(unknown_item.as_str())
                .to_string();
            item_labels.insert(item_code.clone(), label);

            if let Some(wo) = non_empty(jc.work_order.as_ref()) {
                item_work_orders
                    .entry(item_code.clone())
                    .or_default()
                    .insert(wo.to_string());
                all_work_orders.insert(wo.to_string());
            }

            let entry = item_totals.entry(item_code.clone()).or_default();
            let shift_key = get_shift_key(jc.shift_number.as_deref());
            if let Some(key) = shift_key {
                entry.add(key, jc.total_completed_qty);
            }

            shift_lookup.insert(jc.name.clone(), (shift_key, item_code));
        }

        // 批次号
        let all_work_orders: Vec<String> = all_work_orders.into_iter().collect();
        let work_order_batches = self.report_repo.fetch_work_order_batches(&all_work_orders)?;
        let mut item_batches: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (item_code, work_orders) in &item_work_orders {
            let batches: BTreeSet<String> = work_orders
                .iter()
                .filter_map(|wo| work_order_batches.get(wo))
                .flat_map(|set| set.iter().cloned())
                .collect();
            if !batches.is_empty() {
                item_batches.insert(item_code.clone(), batches);
            }
        }

        // 副产品
        let names: Vec<String> = job_cards.iter().map(|jc| jc.name.clone()).collect();
        let scrap_rows = self.report_repo.fetch_scrap_items(&names)?;
        let co_product = t("report.co_product");
        let mut scrap_totals: HashMap<String, BTreeMap<String, ShiftTotals>> = HashMap::new();

        for row in &scrap_rows {
            let (shift_key, item_code) = match shift_lookup.get(&row.parent) {
                Some((Some(key), item_code)) => (*key, item_code),
                _ => continue,
            };
            let label = non_empty(row.item_name.as_ref())
                .or_else(|| non_empty(row.item_code.as_ref()))
                .unwrap_or(co_product.as_str())
                .to_string();
            scrap_totals
                .entry(item_code.clone())
                .or_default()
                .entry(label)
                .or_default()
                .add(shift_key, row.stock_qty);
        }

        // 按产品标签排序输出
        let mut items: Vec<(&String, &String)> = item_totals
            .keys()
            .map(|code| (item_labels.get(code).unwrap_or(code), code))
            .collect();
        items.sort();

        let mut rows = Vec::new();
        for (label, item_code) in items {
            let batches = item_batches
                .get(item_code)
                .map(|set| set.iter().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            let totals = item_totals.get(item_code).copied().unwrap_or_default();
            rows.push(ShiftSummaryRow::new(label.clone(), batches, &totals));

            if let Some(scraps) = scrap_totals.get(item_code) {
                for (scrap_label, totals) in scraps {
                    rows.push(ShiftSummaryRow::new(
                        t_with_args("report.co_product_row", &[("label", scrap_label)]),
                        String::new(),
                        totals,
                    ));
                }
            }
        }
        Ok(rows)
    }
}
