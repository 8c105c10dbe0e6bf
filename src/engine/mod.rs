// ==========================================
// 定制制造扩展 - 引擎层
// ==========================================
// 职责: 单据事件处理规则（磨损台账、保养清零/恢复、
//       作业卡自动生成、保存前同步）
// 红线: Engine 不拼 SQL，数据访问全部经由 Repository
// ==========================================

pub mod events;
pub mod job_card_generator;
pub mod maintenance;
pub mod wear_ledger;
pub mod weight_sync;

// 重导出核心引擎
pub use events::{DocEventDispatcher, DocumentEvent, EventOutcome};
pub use job_card_generator::{new_job_card_name, JobCardGenerator};
pub use maintenance::MaintenanceEngine;
pub use wear_ledger::WearLedgerEngine;
pub use weight_sync::WeightSyncEngine;
