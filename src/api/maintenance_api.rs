// ==========================================
// 定制制造扩展 - 设备保养 API
// ==========================================
// 职责: 保养单保存/提交/取消/删除，并分发对应单据事件
// 红线: 快照字段由系统维护，客户端传入值被忽略
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::db::with_write_transaction;
use crate::domain::maintenance::MachineMaintenance;
use crate::domain::types::DocStatus;
use crate::engine::events::{DocEventDispatcher, DocumentEvent};
use crate::i18n::t_with_args;
use crate::repository::maintenance_repo::MachineMaintenanceRepository;

const DOCTYPE: &str = "Machine Maintenance";

// ==========================================
// MaintenanceApi - 设备保养 API
// ==========================================
pub struct MaintenanceApi {
    conn: Arc<Mutex<Connection>>,
    maintenance_repo: Arc<MachineMaintenanceRepository>,
    dispatcher: Arc<DocEventDispatcher>,
}

impl MaintenanceApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        maintenance_repo: Arc<MachineMaintenanceRepository>,
        dispatcher: Arc<DocEventDispatcher>,
    ) -> Self {
        Self {
            conn,
            maintenance_repo,
            dispatcher,
        }
    }

    /// 保存保养单（新建或更新），保存后分发 on_update 事件
    ///
    /// 草稿与已提交单据均可保存（保养完成标记允许提交后修改）；已取消单据不可保存
    #[instrument(skip(self, doc, today), fields(maintenance = %doc.name))]
    pub fn save(&self, mut doc: MachineMaintenance, today: NaiveDate) -> ApiResult<MachineMaintenance> {
        Self::require_name(&doc.name)?;

        with_write_transaction(&self.conn, |conn| -> ApiResult<()> {
            let before = MachineMaintenanceRepository::find_by_name_on(conn, &doc.name)?;
            match &before {
                Some(prev) => {
                    if prev.docstatus == DocStatus::Cancelled {
                        return Err(ApiError::transition(prev.docstatus, prev.docstatus));
                    }
                    doc.docstatus = prev.docstatus;
                    doc.previous_worked_hours = prev.previous_worked_hours;
                    MachineMaintenanceRepository::update_on(conn, &doc)?;
                }
                None => {
                    doc.docstatus = DocStatus::Draft;
                    doc.previous_worked_hours = None;
                    MachineMaintenanceRepository::insert_on(conn, &doc)?;
                }
            }

            self.dispatcher.dispatch(
                conn,
                DocumentEvent::MaintenanceUpdate {
                    before: before.as_ref(),
                    doc: &mut doc,
                },
                today,
            )?;
            Ok(())
        })?;
        Ok(doc)
    }

    #[instrument(skip(self))]
    pub fn submit(&self, name: &str) -> ApiResult<MachineMaintenance> {
        with_write_transaction(&self.conn, |conn| -> ApiResult<MachineMaintenance> {
            let mut doc = Self::load_on(conn, name)?;
            if doc.docstatus != DocStatus::Draft {
                return Err(ApiError::transition(doc.docstatus, DocStatus::Submitted));
            }
            MachineMaintenanceRepository::set_docstatus_on(conn, name, DocStatus::Submitted)?;
            doc.docstatus = DocStatus::Submitted;
            Ok(doc)
        })
    }

    /// 取消保养单：恢复工作站累计数量并清除快照
    #[instrument(skip(self, today))]
    pub fn cancel(&self, name: &str, today: NaiveDate) -> ApiResult<MachineMaintenance> {
        with_write_transaction(&self.conn, |conn| -> ApiResult<MachineMaintenance> {
            let mut doc = Self::load_on(conn, name)?;
            if doc.docstatus != DocStatus::Submitted {
                return Err(ApiError::transition(doc.docstatus, DocStatus::Cancelled));
            }
            MachineMaintenanceRepository::set_docstatus_on(conn, name, DocStatus::Cancelled)?;
            doc.docstatus = DocStatus::Cancelled;
            self.dispatcher
                .dispatch(conn, DocumentEvent::MaintenanceCancel(&mut doc), today)?;
            Ok(doc)
        })
    }

    /// 删除保养单：恢复工作站累计数量后删除记录
    ///
    /// # 返回
    /// - Ok(false): 记录不存在（无操作）
    /// - Ok(true): 已删除
    /// - Err(InvalidStateTransition): 已提交单据需先取消
    #[instrument(skip(self, today))]
    pub fn delete(&self, name: &str, today: NaiveDate) -> ApiResult<bool> {
        Self::require_name(name)?;

        let deleted = with_write_transaction(&self.conn, |conn| -> ApiResult<bool> {
            let mut doc = match MachineMaintenanceRepository::find_by_name_on(conn, name)? {
                Some(doc) => doc,
                None => return Ok(false),
            };
            if doc.docstatus == DocStatus::Submitted {
                return Err(ApiError::transition(doc.docstatus, "DELETED"));
            }

            doc.flags.in_delete = true;
            self.dispatcher
                .dispatch(conn, DocumentEvent::MaintenanceTrash(&mut doc), today)?;

            Ok(MachineMaintenanceRepository::delete_on(conn, name)?)
        })?;
        info!(maintenance = name, deleted, "保养单已删除");
        Ok(deleted)
    }

    pub fn get(&self, name: &str) -> ApiResult<MachineMaintenance> {
        Self::require_name(name)?;
        Self::found(self.maintenance_repo.find_by_name(name)?, name)
    }

    fn load_on(conn: &Connection, name: &str) -> ApiResult<MachineMaintenance> {
        Self::require_name(name)?;
        Self::found(MachineMaintenanceRepository::find_by_name_on(conn, name)?, name)
    }

    fn found(doc: Option<MachineMaintenance>, name: &str) -> ApiResult<MachineMaintenance> {
        doc.ok_or_else(|| {
            ApiError::NotFound(t_with_args(
                "document.not_found",
                &[("doctype", DOCTYPE), ("name", name)],
            ))
        })
    }

    fn require_name(name: &str) -> ApiResult<()> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput(t_with_args(
                "document.name_required",
                &[("doctype", DOCTYPE)],
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::error::ApiError;
    use crate::app::AppState;
    use crate::domain::maintenance::MachineMaintenance;
    use crate::domain::workstation::Workstation;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn setup(worked: f64) -> AppState {
        let state = AppState::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        state
            .workstation_repo
            .insert(&Workstation::new("WS-1", None))
            .unwrap();
        state.workstation_repo.set_worked_quantity("WS-1", worked).unwrap();
        state
    }

    fn maintenance(done: serde_json::Value) -> MachineMaintenance {
        let mut doc = MachineMaintenance::new("MM-1", Some("WS-1".to_string()));
        doc.maintenance_done = done;
        doc
    }

    fn worked(state: &AppState) -> Option<f64> {
        state.workstation_repo.get_worked_quantity("WS-1").unwrap()
    }

    #[test]
    fn test_toggle_done_restores_exact_counter() {
        let state = setup(42.5);

        state.maintenance_api.save(maintenance(json!(0)), today()).unwrap();
        assert_eq!(worked(&state), Some(42.5));

        let saved = state.maintenance_api.save(maintenance(json!("Yes")), today()).unwrap();
        assert_eq!(worked(&state), Some(0.0));
        assert_eq!(saved.previous_worked_hours, Some(42.5));

        let saved = state.maintenance_api.save(maintenance(json!(false)), today()).unwrap();
        assert_eq!(worked(&state), Some(42.5));
        assert_eq!(saved.previous_worked_hours, None);
        assert_eq!(state.maintenance_api.get("MM-1").unwrap().previous_worked_hours, None);
    }

    #[test]
    fn test_client_snapshot_is_ignored() {
        let state = setup(10.0);
        let mut doc = maintenance(json!(1));
        doc.previous_worked_hours = Some(999.0);

        let saved = state.maintenance_api.save(doc, today()).unwrap();
        assert_eq!(saved.previous_worked_hours, Some(10.0));
    }

    #[test]
    fn test_delete_restores_once() {
        let state = setup(30.0);
        state.maintenance_api.save(maintenance(json!(1)), today()).unwrap();
        assert_eq!(worked(&state), Some(0.0));

        // 清零后继续累计
        state.workstation_repo.increment_worked_quantity("WS-1", 4.0).unwrap();

        assert!(state.maintenance_api.delete("MM-1", today()).unwrap());
        assert_eq!(worked(&state), Some(30.0));

        state.workstation_repo.increment_worked_quantity("WS-1", 2.0).unwrap();
        assert!(!state.maintenance_api.delete("MM-1", today()).unwrap());
        assert_eq!(worked(&state), Some(32.0));
    }

    #[test]
    fn test_cancel_restores_and_blocks_further_saves() {
        let state = setup(12.0);
        state.maintenance_api.save(maintenance(json!(1)), today()).unwrap();
        state.maintenance_api.submit("MM-1").unwrap();

        let err = state.maintenance_api.delete("MM-1", today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

        let cancelled = state.maintenance_api.cancel("MM-1", today()).unwrap();
        assert_eq!(cancelled.previous_worked_hours, None);
        assert_eq!(worked(&state), Some(12.0));

        let err = state.maintenance_api.save(maintenance(json!(0)), today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
    }
}
