// ==========================================
// 定制制造扩展 - 单据事件分发
// ==========================================
// 职责: 定义单据生命周期事件，并路由到对应的处理引擎
// 说明: 事件携带保存前/后的单据值，处理引擎不自行回查保存前版本
// 红线: 处理引擎在调用方的事务内执行，出错时与单据状态一起回滚
// ==========================================

use crate::domain::job_card::JobCard;
use crate::domain::maintenance::MachineMaintenance;
use crate::domain::work_order::WorkOrder;
use crate::engine::job_card_generator::JobCardGenerator;
use crate::engine::maintenance::MaintenanceEngine;
use crate::engine::wear_ledger::WearLedgerEngine;
use crate::engine::weight_sync::WeightSyncEngine;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// 单据事件
// ==========================================

/// 单据生命周期事件
#[derive(Debug)]
pub enum DocumentEvent<'a> {
    /// 作业卡保存前（可修改单据）
    JobCardBeforeSave {
        doc: &'a mut JobCard,
        previous: Option<&'a JobCard>,
    },
    /// 作业卡提交
    JobCardSubmit(&'a JobCard),
    /// 作业卡取消
    JobCardCancel(&'a JobCard),
    /// 保养单保存后
    MaintenanceUpdate {
        before: Option<&'a MachineMaintenance>,
        doc: &'a mut MachineMaintenance,
    },
    /// 保养单取消
    MaintenanceCancel(&'a mut MachineMaintenance),
    /// 保养单删除
    MaintenanceTrash(&'a mut MachineMaintenance),
    /// 工单提交
    WorkOrderSubmit(&'a WorkOrder),
}

impl DocumentEvent<'_> {
    /// 事件标识
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentEvent::JobCardBeforeSave { .. } => "job_card.before_save",
            DocumentEvent::JobCardSubmit(_) => "job_card.on_submit",
            DocumentEvent::JobCardCancel(_) => "job_card.on_cancel",
            DocumentEvent::MaintenanceUpdate { .. } => "machine_maintenance.on_update",
            DocumentEvent::MaintenanceCancel(_) => "machine_maintenance.on_cancel",
            DocumentEvent::MaintenanceTrash(_) => "machine_maintenance.on_trash",
            DocumentEvent::WorkOrderSubmit(_) => "work_order.on_submit",
        }
    }
}

/// 事件处理结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventOutcome {
    #[default]
    Handled,
    /// 自动生成的作业卡
    JobCardsCreated(Vec<String>),
}

// ==========================================
// DocEventDispatcher - 事件分发器
// ==========================================
pub struct DocEventDispatcher {
    wear_ledger: Arc<WearLedgerEngine>,
    maintenance: Arc<MaintenanceEngine>,
    weight_sync: Arc<WeightSyncEngine>,
    generator: Arc<JobCardGenerator>,
}

impl DocEventDispatcher {
    pub fn new(
        wear_ledger: Arc<WearLedgerEngine>,
        maintenance: Arc<MaintenanceEngine>,
        weight_sync: Arc<WeightSyncEngine>,
        generator: Arc<JobCardGenerator>,
    ) -> Self {
        Self {
            wear_ledger,
            maintenance,
            weight_sync,
            generator,
        }
    }

    /// 分发事件
    ///
    /// # 参数
    /// - `conn`: 调用方持有的连接（通常为单据事务）
    /// - `event`: 单据事件
    /// - `today`: 业务日期（默认时间日志、作业卡过账日期）
    pub fn dispatch(
        &self,
        conn: &Connection,
        event: DocumentEvent<'_>,
        today: NaiveDate,
    ) -> RepositoryResult<EventOutcome> {
        debug!(event = event.as_str(), "分发单据事件");

        match event {
            DocumentEvent::JobCardBeforeSave { doc, previous } => {
                self.weight_sync.sync_weight_totals(conn, doc, previous, today)?;
            }
            DocumentEvent::JobCardSubmit(doc) => self.wear_ledger.on_submit(conn, doc)?,
            DocumentEvent::JobCardCancel(doc) => self.wear_ledger.on_cancel(conn, doc)?,
            DocumentEvent::MaintenanceUpdate { before, doc } => {
                self.maintenance.on_update(conn, before, doc)?;
            }
            DocumentEvent::MaintenanceCancel(doc) => self.maintenance.on_cancel(conn, doc)?,
            DocumentEvent::MaintenanceTrash(doc) => self.maintenance.on_trash(conn, doc)?,
            DocumentEvent::WorkOrderSubmit(doc) => {
                let created = self.generator.generate_for_work_order(conn, doc, today)?;
                return Ok(EventOutcome::JobCardsCreated(created));
            }
        }
        Ok(EventOutcome::Handled)
    }
}
