// ==========================================
// 定制制造扩展 - 工作站领域模型
// ==========================================
// 对齐: workstation 表
// 红线: 业务处理只修改 worked_quantity，不修改 modified
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Workstation - 工作站
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    pub name: String,                     // 工作站名称 (主键)
    pub workstation_type: Option<String>, // 工作站类型
    pub plant_floor: Option<String>,      // 所属车间

    // ===== 磨损台账 =====
    pub worked_quantity: f64,             // 上次保养以来的累计完工数量
    pub quantity_before_replacement: f64, // 部件更换阈值 (0 表示未设置)
}

impl Workstation {
    pub fn new(name: impl Into<String>, plant_floor: Option<String>) -> Self {
        Self {
            name: name.into(),
            workstation_type: None,
            plant_floor,
            worked_quantity: 0.0,
            quantity_before_replacement: 0.0,
        }
    }
}

// ==========================================
// Trait: WorkstationWearMonitor
// ==========================================
// 用途: 部件更换报表的判定逻辑
pub trait WorkstationWearMonitor {
    /// 是否需要更换部件
    ///
    /// # 返回
    /// - `true`: 已设置阈值且累计数量 ≥ 阈值
    fn needs_parts_replacement(&self) -> bool;

    /// 距离阈值的剩余数量
    ///
    /// 未设置阈值时返回 0；超出阈值时为负数
    fn remaining_quantity(&self) -> f64;
}

impl WorkstationWearMonitor for Workstation {
    fn needs_parts_replacement(&self) -> bool {
        self.quantity_before_replacement != 0.0
            && self.worked_quantity >= self.quantity_before_replacement
    }

    fn remaining_quantity(&self) -> f64 {
        if self.quantity_before_replacement == 0.0 {
            return 0.0;
        }
        self.quantity_before_replacement - self.worked_quantity
    }
}
