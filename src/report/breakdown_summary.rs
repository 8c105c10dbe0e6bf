// ==========================================
// 定制制造扩展 - 设备故障汇总报表
// ==========================================
// 口径: 未取消作业卡中登记了故障类型的记录，
//       按 (工作站, 故障类型) 计数
// ==========================================

use crate::config::config_manager::DEFAULT_BREAKDOWN_CHART_TOP_N;
use crate::config::config_reader::LedgerConfigReader;
use crate::i18n::{t, t_with_args};
use crate::report::{
    AxisTitle, BarOptions, ChartData, ChartDataset, ChartPayload, ReportColumn, ReportFilters,
    ReportOutput, SummaryCard,
};
use crate::repository::error::RepositoryResult;
use crate::repository::report_repo::{BreakdownRow, ReportRepository};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{instrument, warn};

const CHART_COLOR: &str = "#FF6B6B";

pub struct BreakdownSummaryReport {
    report_repo: Arc<ReportRepository>,
    config: Arc<dyn LedgerConfigReader + Send + Sync>,
}

impl BreakdownSummaryReport {
    pub fn new(
        report_repo: Arc<ReportRepository>,
        config: Arc<dyn LedgerConfigReader + Send + Sync>,
    ) -> Self {
        Self { report_repo, config }
    }

    pub fn columns() -> Vec<ReportColumn> {
        vec![
            ReportColumn::link(t("report.column.workstation"), "workstation", "Workstation", 200),
            ReportColumn::link(
                t("report.column.breakdown_type"),
                "breakdown_type",
                "Breakdown Type",
                200,
            ),
            ReportColumn::new(t("report.column.breakdown_count"), "breakdown_count", "Int", 140),
        ]
    }

    /// 车间过滤不适用于本报表
    #[instrument(skip(self))]
    pub fn execute(&self, filters: &ReportFilters) -> RepositoryResult<ReportOutput> {
        let rows = self
            .report_repo
            .fetch_breakdown_counts(filters.from_date, filters.to_date)?;

        let data = rows
            .iter()
            .map(|r| {
                json!({
                    "workstation": r.workstation,
                    "breakdown_type": r.breakdown_type,
                    "breakdown_count": r.breakdown_count,
                })
            })
            .collect();

        Ok(ReportOutput {
            columns: Self::columns(),
            data,
            summary: build_summary(&rows),
            chart: build_chart(&rows, self.top_n()),
        })
    }

    fn top_n(&self) -> usize {
        match self.config.get_breakdown_chart_top_n() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "读取图表数量配置失败，使用默认值");
                DEFAULT_BREAKDOWN_CHART_TOP_N
            }
        }
    }
}

/// 汇总卡片（无数据时为 None）
pub fn build_summary(rows: &[BreakdownRow]) -> Option<Vec<SummaryCard>> {
    if rows.is_empty() {
        return None;
    }

    let total: i64 = rows.iter().map(|r| r.breakdown_count).sum();
    let machines: BTreeSet<&str> = rows.iter().map(|r| r.workstation.as_str()).collect();
    let types: BTreeSet<&str> = rows.iter().map(|r| r.breakdown_type.as_str()).collect();

    Some(vec![
        SummaryCard {
            value: json!(total),
            label: t("report.summary.total_breakdowns"),
            indicator: if total != 0 { "Red" } else { "Green" }.to_string(),
        },
        SummaryCard {
            value: json!(machines.len()),
            label: t("report.summary.machines_impacted"),
            indicator: "Blue".to_string(),
        },
        SummaryCard {
            value: json!(types.len()),
            label: t("report.summary.breakdown_types"),
            indicator: "Green".to_string(),
        },
    ])
}

/// 柱状图：故障次数最多的前 N 台设备
pub fn build_chart(rows: &[BreakdownRow], top_n: usize) -> Option<ChartData> {
    if rows.is_empty() {
        return None;
    }

    let mut by_machine: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        match index.get(row.workstation.as_str()) {
            Some(&i) => by_machine[i].1 += row.breakdown_count,
            None => {
                index.insert(row.workstation.as_str(), by_machine.len());
                by_machine.push((row.workstation.clone(), row.breakdown_count));
            }
        }
    }

    let machine_count = by_machine.len();
    let overall: i64 = rows.iter().map(|r| r.breakdown_count).sum();

    // 稳定排序：次数相同保持工作站名称顺序
    by_machine.sort_by(|a, b| b.1.cmp(&a.1));
    by_machine.truncate(top_n);

    let mut dataset_name = t("report.chart.breakdowns");
    if machine_count > top_n {
        dataset_name.push_str(&t_with_args("report.chart.top_n", &[("n", &top_n.to_string())]));
    }

    Some(ChartData {
        data: ChartPayload {
            labels: by_machine.iter().map(|(name, _)| name.clone()).collect(),
            datasets: vec![ChartDataset {
                name: dataset_name,
                values: by_machine.iter().map(|(_, count)| *count).collect(),
            }],
        },
        chart_type: "bar".to_string(),
        colors: vec![CHART_COLOR.to_string()],
        bar_options: BarOptions { space_ratio: 0.4 },
        values_over_points: true,
        fieldtype: "Int".to_string(),
        y_axis: vec![AxisTitle {
            title: t("report.column.breakdown_count"),
        }],
        title: t_with_args("report.chart.title", &[("count", &overall.to_string())]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{set_locale, LOCALE_TEST_LOCK};

    fn row(ws: &str, kind: &str, count: i64) -> BreakdownRow {
        BreakdownRow {
            workstation: ws.to_string(),
            breakdown_type: kind.to_string(),
            breakdown_count: count,
        }
    }

    #[test]
    fn test_empty_rows_have_no_summary_or_chart() {
        assert!(build_summary(&[]).is_none());
        assert!(build_chart(&[], 10).is_none());
    }

    #[test]
    fn test_summary_cards() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_locale("en");

        let rows = vec![row("WS-1", "Motor", 3), row("WS-1", "Belt", 1), row("WS-2", "Motor", 2)];
        let summary = build_summary(&rows).unwrap();

        assert_eq!(summary[0].value, json!(6));
        assert_eq!(summary[0].indicator, "Red");
        assert_eq!(summary[0].label, "Total Breakdowns");
        assert_eq!(summary[1].value, json!(2));
        assert_eq!(summary[1].indicator, "Blue");
        assert_eq!(summary[2].value, json!(2));
        assert_eq!(summary[2].indicator, "Green");
    }

    #[test]
    fn test_chart_top_n_note_and_title() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_locale("en");

        let rows = vec![
            row("WS-1", "Motor", 1),
            row("WS-2", "Motor", 5),
            row("WS-3", "Belt", 2),
            row("WS-3", "Motor", 2),
        ];

        let chart = build_chart(&rows, 2).unwrap();
        assert_eq!(chart.data.labels, vec!["WS-2", "WS-3"]);
        assert_eq!(chart.data.datasets[0].values, vec![5, 4]);
        assert_eq!(chart.data.datasets[0].name, "Breakdowns (Top 2)");
        assert_eq!(chart.title, "Total Breakdowns: 10");
        assert_eq!(chart.colors, vec!["#FF6B6B"]);

        let chart = build_chart(&rows, 10).unwrap();
        assert_eq!(chart.data.datasets[0].name, "Breakdowns");
        assert_eq!(chart.data.labels.len(), 3);
    }
}
