// ==========================================
// 定制制造扩展 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod job_card_repo;
pub mod maintenance_repo;
pub mod master_data_repo;
pub mod patch_repo;
pub mod report_repo;
pub mod work_order_repo;
pub mod workstation_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use job_card_repo::JobCardRepository;
pub use maintenance_repo::MachineMaintenanceRepository;
pub use master_data_repo::{parse_time_of_day, MasterDataRepository, StockEntryDetailInput};
pub use patch_repo::{ColumnInfo, PatchRepository};
pub use report_repo::{
    BreakdownRow, ReportRepository, ScrapRow, ShiftJobCardRow, WorkstationWearRow,
};
pub use work_order_repo::WorkOrderRepository;
pub use workstation_repo::WorkstationRepository;
