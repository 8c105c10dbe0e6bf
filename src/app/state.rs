// ==========================================
// 定制制造扩展 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储、引擎和 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ApiResult, JobCardApi, MaintenanceApi, ReportApi, WorkOrderApi, WorkstationApi};
use crate::config::config_manager::ConfigManager;
use crate::config::config_reader::LedgerConfigReader;
use crate::engine::{
    DocEventDispatcher, JobCardGenerator, MaintenanceEngine, WearLedgerEngine, WeightSyncEngine,
};
use crate::repository::{
    job_card_repo::JobCardRepository, maintenance_repo::MachineMaintenanceRepository,
    master_data_repo::MasterDataRepository, patch_repo::PatchRepository,
    report_repo::ReportRepository, work_order_repo::WorkOrderRepository,
    workstation_repo::WorkstationRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    conn: Arc<Mutex<Connection>>,

    pub config_manager: Arc<ConfigManager>,

    // ===== 仓储 =====
    pub workstation_repo: Arc<WorkstationRepository>,
    pub job_card_repo: Arc<JobCardRepository>,
    pub maintenance_repo: Arc<MachineMaintenanceRepository>,
    pub work_order_repo: Arc<WorkOrderRepository>,
    pub master_data_repo: Arc<MasterDataRepository>,
    pub patch_repo: Arc<PatchRepository>,

    /// 单据事件分发器
    pub dispatcher: Arc<DocEventDispatcher>,

    // ===== API =====
    pub workstation_api: Arc<WorkstationApi>,
    pub job_card_api: Arc<JobCardApi>,
    pub maintenance_api: Arc<MaintenanceApi>,
    pub work_order_api: Arc<WorkOrderApi>,
    pub report_api: Arc<ReportApi>,
}

impl AppState {
    /// 打开数据库文件并初始化应用状态
    ///
    /// # 说明
    /// 1. 打开连接并应用统一 PRAGMA
    /// 2. 幂等建表
    /// 3. 组装仓储 / 引擎 / API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::build(db_path, conn)
    }

    /// 基于已打开的连接初始化（测试使用内存库）
    pub fn from_connection(conn: Connection) -> Result<Self, String> {
        Self::build(":memory:".to_string(), conn)
    }

    fn build(db_path: String, conn: Connection) -> Result<Self, String> {
        crate::db::init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config_reader: Arc<dyn LedgerConfigReader + Send + Sync> = config_manager.clone();

        // ==========================================
        // 仓储
        // ==========================================
        let workstation_repo = Arc::new(WorkstationRepository::from_connection(conn.clone()));
        let job_card_repo = Arc::new(JobCardRepository::from_connection(conn.clone()));
        let maintenance_repo = Arc::new(MachineMaintenanceRepository::from_connection(conn.clone()));
        let work_order_repo = Arc::new(WorkOrderRepository::from_connection(conn.clone()));
        let master_data_repo = Arc::new(MasterDataRepository::from_connection(conn.clone()));
        let patch_repo = Arc::new(PatchRepository::from_connection(conn.clone()));
        let report_repo = Arc::new(ReportRepository::from_connection(conn.clone()));

        // ==========================================
        // 引擎（在 API 开启的事务内执行）
        // ==========================================
        let wear_ledger = Arc::new(WearLedgerEngine::new());
        let maintenance = Arc::new(MaintenanceEngine::new());
        let weight_sync = Arc::new(WeightSyncEngine::new());
        let generator = Arc::new(JobCardGenerator::new(weight_sync.clone()));
        let dispatcher = Arc::new(DocEventDispatcher::new(
            wear_ledger,
            maintenance,
            weight_sync,
            generator,
        ));

        // ==========================================
        // API
        // ==========================================
        let workstation_api = Arc::new(WorkstationApi::new(workstation_repo.clone()));
        let job_card_api = Arc::new(JobCardApi::new(
            conn.clone(),
            job_card_repo.clone(),
            dispatcher.clone(),
        ));
        let maintenance_api = Arc::new(MaintenanceApi::new(
            conn.clone(),
            maintenance_repo.clone(),
            dispatcher.clone(),
        ));
        let work_order_api = Arc::new(WorkOrderApi::new(
            conn.clone(),
            work_order_repo.clone(),
            job_card_repo.clone(),
            dispatcher.clone(),
        ));
        let report_api = Arc::new(ReportApi::new(report_repo, config_reader));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            config_manager,
            workstation_repo,
            job_card_repo,
            maintenance_repo,
            work_order_repo,
            master_data_repo,
            patch_repo,
            dispatcher,
            workstation_api,
            job_card_api,
            maintenance_api,
            work_order_api,
            report_api,
        })
    }

    /// 在共享连接上执行一个写事务（闭包出错时整体回滚）
    pub fn with_transaction<T, F>(&self, body: F) -> ApiResult<T>
    where
        F: FnOnce(&Connection) -> ApiResult<T>,
    {
        crate::db::with_write_transaction(&self.conn, body)
    }

    /// 按配置设置界面语言（语言为进程级全局状态）
    pub fn apply_configured_locale(&self) {
        match self.config_manager.get_locale() {
            Ok(locale) => {
                let applied = crate::i18n::set_locale(&locale);
                if applied != locale {
                    tracing::warn!(configured = %locale, applied, "不支持的语言配置，已回退");
                }
            }
            Err(e) => tracing::warn!("读取语言配置失败，保持当前语言: {}", e),
        }
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 CUSTOM_MANUFACTURING_DB_PATH，其次为用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CUSTOM_MANUFACTURING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./custom_manufacturing.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("custom-manufacturing");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("custom_manufacturing.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_from_connection_initializes_schema() {
        let state = AppState::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        assert_eq!(state.db_path, ":memory:");
        assert!(state.workstation_repo.list(None).unwrap().is_empty());
    }
}
