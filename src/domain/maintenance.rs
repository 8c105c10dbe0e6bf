// ==========================================
// 定制制造扩展 - 设备保养领域模型
// ==========================================
// 对齐: machine_maintenance 表
// 状态: NORMAL → RESET_PENDING → NORMAL
// ==========================================

use crate::domain::types::{is_checked, DocStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// MachineMaintenance - 设备保养单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MachineMaintenance {
    pub name: String,
    pub machine_name: Option<String>, // 对应工作站
    /// 保养完成标记（原始值，经 `is_checked` 解释）
    pub maintenance_done: Value,
    /// 保养前工作站累计数量快照（None 表示无待恢复快照）
    pub previous_worked_hours: Option<f64>,
    pub docstatus: DocStatus,

    #[serde(skip)]
    pub flags: DocFlags,
}

/// 运行期标记（不持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocFlags {
    /// 删除流程中
    pub in_delete: bool,
}

/// 工作站计数在保养周期中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceState {
    Normal,
    ResetPending,
}

impl MachineMaintenance {
    pub fn new(name: impl Into<String>, machine_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            machine_name,
            maintenance_done: Value::Bool(false),
            ..Default::default()
        }
    }

    /// 保养是否完成
    pub fn is_done(&self) -> bool {
        is_checked(&self.maintenance_done)
    }

    /// 是否关联了工作站
    pub fn machine(&self) -> Option<&str> {
        self.machine_name.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// 当前所处状态（依据快照是否存在）
    pub fn state(&self) -> MaintenanceState {
        if self.previous_worked_hours.is_some() {
            MaintenanceState::ResetPending
        } else {
            MaintenanceState::Normal
        }
    }
}
