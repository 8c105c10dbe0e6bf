// ==========================================
// 定制制造扩展 - 报表 API
// ==========================================
// 职责: 按报表类型路由执行（只读）
// ==========================================

use std::sync::Arc;

use tracing::instrument;

use crate::api::error::ApiResult;
use crate::config::config_reader::LedgerConfigReader;
use crate::report::{
    BreakdownSummaryReport, PartsReplacementReport, ReportFilters, ReportKind, ReportOutput,
    ShiftSummaryReport,
};
use crate::repository::report_repo::ReportRepository;

pub struct ReportApi {
    shift_summary: ShiftSummaryReport,
    breakdown_summary: BreakdownSummaryReport,
    parts_replacement: PartsReplacementReport,
}

impl ReportApi {
    pub fn new(
        report_repo: Arc<ReportRepository>,
        config: Arc<dyn LedgerConfigReader + Send + Sync>,
    ) -> Self {
        Self {
            shift_summary: ShiftSummaryReport::new(report_repo.clone()),
            breakdown_summary: BreakdownSummaryReport::new(report_repo.clone(), config),
            parts_replacement: PartsReplacementReport::new(report_repo),
        }
    }

    #[instrument(skip(self))]
    pub fn run(&self, kind: ReportKind, filters: &ReportFilters) -> ApiResult<ReportOutput> {
        let output = match kind {
            ReportKind::JobCardShiftSummary => self.shift_summary.execute(filters)?,
            ReportKind::MachineBreakdownSummary => self.breakdown_summary.execute(filters)?,
            ReportKind::WorkstationPartsReplacement => self.parts_replacement.execute(filters)?,
        };
        Ok(output)
    }

    pub fn job_card_shift_summary(&self, filters: &ReportFilters) -> ApiResult<ReportOutput> {
        self.run(ReportKind::JobCardShiftSummary, filters)
    }

    pub fn machine_breakdown_summary(&self, filters: &ReportFilters) -> ApiResult<ReportOutput> {
        self.run(ReportKind::MachineBreakdownSummary, filters)
    }

    pub fn workstation_parts_replacement(&self, filters: &ReportFilters) -> ApiResult<ReportOutput> {
        self.run(ReportKind::WorkstationPartsReplacement, filters)
    }
}
