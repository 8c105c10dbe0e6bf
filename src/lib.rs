// ==========================================
// 定制制造扩展 - 核心库
// ==========================================
// 范围: 工作站磨损台账、设备保养清零/恢复、
//       工单自动生成作业卡、每袋重量同步、生产报表
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 单据与主数据
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 单据事件处理
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 单据生命周期与 RPC
pub mod api;

// 报表层 - 只读报表
pub mod report;

// 数据补丁
pub mod patches;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DocStatus, FieldType};

// 领域实体
pub use domain::{JobCard, MachineMaintenance, WorkOrder, Workstation};

// 引擎
pub use engine::{
    DocEventDispatcher, DocumentEvent, JobCardGenerator, MaintenanceEngine, WearLedgerEngine,
    WeightSyncEngine,
};

// API
pub use api::{JobCardApi, MaintenanceApi, ReportApi, WorkOrderApi, WorkstationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Custom Manufacturing";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
