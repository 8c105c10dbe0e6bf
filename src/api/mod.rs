// ==========================================
// 定制制造扩展 - API 层
// ==========================================
// 职责: 单据生命周期与 RPC 接口，供 CLI 调用
// ==========================================

pub mod error;
pub mod job_card_api;
pub mod maintenance_api;
pub mod report_api;
pub mod work_order_api;
pub mod workstation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use job_card_api::JobCardApi;
pub use maintenance_api::MaintenanceApi;
pub use report_api::ReportApi;
pub use work_order_api::{WorkOrderApi, WorkOrderSubmitResponse};
pub use workstation_api::{ResetWorkedHoursResponse, WorkstationApi, WorkstationWearInfo};
