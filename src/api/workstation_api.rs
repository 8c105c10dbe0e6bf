// ==========================================
// 定制制造扩展 - 工作站 API
// ==========================================
// 职责: 手动清零工作站累计数量
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::workstation::{Workstation, WorkstationWearMonitor};
use crate::i18n::{t, t_with_args};
use crate::repository::workstation_repo::WorkstationRepository;

/// 清零结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetWorkedHoursResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worked_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 工作站磨损信息（供 CLI 展示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkstationWearInfo {
    pub name: String,
    pub plant_floor: Option<String>,
    pub worked_quantity: f64,
    pub quantity_before_replacement: f64,
    pub remaining_quantity: f64,
    pub needs_parts_replacement: bool,
}

impl From<Workstation> for WorkstationWearInfo {
    fn from(ws: Workstation) -> Self {
        Self {
            remaining_quantity: ws.remaining_quantity(),
            needs_parts_replacement: ws.needs_parts_replacement(),
            name: ws.name,
            plant_floor: ws.plant_floor,
            worked_quantity: ws.worked_quantity,
            quantity_before_replacement: ws.quantity_before_replacement,
        }
    }
}

// ==========================================
// WorkstationApi - 工作站 API
// ==========================================
pub struct WorkstationApi {
    workstation_repo: Arc<WorkstationRepository>,
}

impl WorkstationApi {
    pub fn new(workstation_repo: Arc<WorkstationRepository>) -> Self {
        Self { workstation_repo }
    }

    /// 清零工作站累计数量（不修改 modified）
    ///
    /// # 返回
    /// - Err(InvalidInput): 工作站名称为空
    /// - Ok(success=false): 工作站不存在（无数据变更）
    /// - Ok(success=true): 已清零，worked_hours 为清零后的存储值
    #[instrument(skip(self))]
    pub fn reset_worked_hours(&self, workstation: &str) -> ApiResult<ResetWorkedHoursResponse> {
        if workstation.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("workstation.required")));
        }

        if !self.workstation_repo.exists(workstation)? {
            return Ok(ResetWorkedHoursResponse {
                success: false,
                worked_hours: None,
                message: Some(t_with_args("workstation.not_found", &[("name", workstation)])),
            });
        }

        self.workstation_repo.set_worked_quantity(workstation, 0.0)?;
        let current = self
            .workstation_repo
            .get_worked_quantity(workstation)?
            .unwrap_or(0.0);

        info!(workstation, "累计数量已手动清零");
        Ok(ResetWorkedHoursResponse {
            success: true,
            worked_hours: Some(current),
            message: None,
        })
    }

    /// 查询工作站磨损信息
    pub fn get_workstation(&self, workstation: &str) -> ApiResult<WorkstationWearInfo> {
        if workstation.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("workstation.required")));
        }

        self.workstation_repo
            .find_by_name(workstation)?
            .map(WorkstationWearInfo::from)
            .ok_or_else(|| {
                ApiError::NotFound(t_with_args("workstation.not_found", &[("name", workstation)]))
            })
    }
}
