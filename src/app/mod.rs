// ==========================================
// 定制制造扩展 - 应用层
// ==========================================
// 职责: 组装共享状态，供 CLI 与集成测试使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
