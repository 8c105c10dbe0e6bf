// ==========================================
// 定制制造扩展 - 领域模型层
// ==========================================
// 职责: 定义单据实体、类型、通用判定规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod custom_field;
pub mod job_card;
pub mod maintenance;
pub mod types;
pub mod work_order;
pub mod workstation;

// 重导出核心类型
pub use custom_field::CustomField;
pub use job_card::{JobCard, JobCardKey, JobCardScrapItem, TimeLog, TimeLogKey, WeightRow, WEIGHT_PER_BAG_DOCTYPE};
pub use maintenance::{DocFlags, MachineMaintenance, MaintenanceState};
pub use types::{flt, is_blank, is_checked, round_to, DocStatus, FieldType};
pub use work_order::{BomScrapItem, Shift, WorkOrder, WorkOrderOperation};
pub use workstation::{Workstation, WorkstationWearMonitor};
