// ==========================================
// 定制制造扩展 - 设备保养清零/恢复引擎
// ==========================================
// 职责: 保养完成时清零工作站累计数量，撤销/取消/删除时恢复
// 状态: NORMAL → RESET_PENDING → NORMAL
// 红线: 快照读写失败只记录日志，不中断保存流程
// ==========================================

use crate::domain::maintenance::MachineMaintenance;
use crate::repository::error::RepositoryResult;
use crate::repository::maintenance_repo::MachineMaintenanceRepository;
use crate::repository::workstation_repo::WorkstationRepository;
use rusqlite::Connection;
use tracing::{info, instrument, warn};

// ==========================================
// MaintenanceEngine - 保养引擎
// ==========================================
#[derive(Debug, Default)]
pub struct MaintenanceEngine;

impl MaintenanceEngine {
    pub fn new() -> Self {
        Self
    }

    /// 保养单保存后
    ///
    /// # 参数
    /// - `before`: 保存前的已持久化版本（新建时为 None）
    /// - `doc`: 保存后的版本（快照字段会被原地更新）
    ///
    /// # 规则
    /// - 未完成 → 完成: 清零
    /// - 完成 → 未完成: 恢复并清除快照
    /// - 其他: 无操作
    #[instrument(skip(self, conn, before, doc), fields(maintenance = %doc.name))]
    pub fn on_update(
        &self,
        conn: &Connection,
        before: Option<&MachineMaintenance>,
        doc: &mut MachineMaintenance,
    ) -> RepositoryResult<()> {
        if doc.machine().is_none() {
            return Ok(());
        }

        let done = doc.is_done();
        let previously_done = before.map(|b| b.is_done()).unwrap_or(false);

        match (previously_done, done) {
            (false, true) => self.reset(conn, doc),
            (true, false) => self.restore(conn, doc, true),
            _ => Ok(()),
        }
    }

    /// 保养单取消：恢复并清除快照
    #[instrument(skip(self, conn, doc), fields(maintenance = %doc.name))]
    pub fn on_cancel(&self, conn: &Connection, doc: &mut MachineMaintenance) -> RepositoryResult<()> {
        self.restore(conn, doc, true)
    }

    /// 保养单删除：恢复但不清除快照
    #[instrument(skip(self, conn, doc), fields(maintenance = %doc.name))]
    pub fn on_trash(&self, conn: &Connection, doc: &mut MachineMaintenance) -> RepositoryResult<()> {
        self.restore(conn, doc, false)
    }

    // ==========================================
    // 清零 / 恢复
    // ==========================================

    fn reset(&self, conn: &Connection, doc: &mut MachineMaintenance) -> RepositoryResult<()> {
        let machine = match doc.machine() {
            Some(m) => m.to_string(),
            None => return Ok(()),
        };

        let current = WorkstationRepository::get_worked_quantity_on(conn, &machine)?.unwrap_or(0.0);

        // 已有快照时不覆盖
        if doc.previous_worked_hours.is_none() {
            if let Err(e) =
                MachineMaintenanceRepository::set_previous_worked_hours_on(conn, &doc.name, Some(current))
            {
                warn!(maintenance = %doc.name, error = %e, "保存累计数量快照失败");
            }
            doc.previous_worked_hours = Some(current);
        }

        WorkstationRepository::set_worked_quantity_on(conn, &machine, 0.0)?;
        info!(workstation = %machine, snapshot = current, "保养完成，累计数量已清零");
        Ok(())
    }

    fn restore(&self, conn: &Connection, doc: &mut MachineMaintenance, clear: bool) -> RepositoryResult<()> {
        let machine = match doc.machine() {
            Some(m) => m.to_string(),
            None => return Ok(()),
        };

        let snapshot = match doc.previous_worked_hours {
            Some(v) => Some(v),
            None => match MachineMaintenanceRepository::get_previous_worked_hours_on(conn, &doc.name) {
                Ok(v) => v,
                Err(e) => {
                    warn!(maintenance = %doc.name, error = %e, "读取累计数量快照失败，视为无快照");
                    None
                }
            },
        };

        let snapshot = match snapshot {
            Some(v) => v,
            None => return Ok(()),
        };

        WorkstationRepository::set_worked_quantity_on(conn, &machine, snapshot)?;
        info!(workstation = %machine, snapshot, "累计数量已恢复");

        if clear {
            if !doc.flags.in_delete {
                if let Err(e) =
                    MachineMaintenanceRepository::set_previous_worked_hours_on(conn, &doc.name, None)
                {
                    warn!(maintenance = %doc.name, error = %e, "清除累计数量快照失败");
                }
            }
            doc.previous_worked_hours = None;
        }
        Ok(())
    }
}
