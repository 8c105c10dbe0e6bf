// ==========================================
// 定制制造扩展 - 工单 API
// ==========================================
// 职责: 工单保存/提交（提交时自动生成作业卡）与完工数量查询
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::db::with_write_transaction;
use crate::domain::types::DocStatus;
use crate::domain::work_order::WorkOrder;
use crate::engine::events::{DocEventDispatcher, DocumentEvent, EventOutcome};
use crate::i18n::t_with_args;
use crate::repository::job_card_repo::JobCardRepository;
use crate::repository::work_order_repo::WorkOrderRepository;

const DOCTYPE: &str = "Work Order";

/// 工单提交结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderSubmitResponse {
    pub work_order: String,
    pub created_job_cards: Vec<String>,
}

// ==========================================
// WorkOrderApi - 工单 API
// ==========================================
pub struct WorkOrderApi {
    conn: Arc<Mutex<Connection>>,
    work_order_repo: Arc<WorkOrderRepository>,
    job_card_repo: Arc<JobCardRepository>,
    dispatcher: Arc<DocEventDispatcher>,
}

impl WorkOrderApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        work_order_repo: Arc<WorkOrderRepository>,
        job_card_repo: Arc<JobCardRepository>,
        dispatcher: Arc<DocEventDispatcher>,
    ) -> Self {
        Self {
            conn,
            work_order_repo,
            job_card_repo,
            dispatcher,
        }
    }

    /// 保存草稿工单
    #[instrument(skip(self, wo), fields(work_order = %wo.name))]
    pub fn save(&self, mut wo: WorkOrder) -> ApiResult<WorkOrder> {
        Self::require_name(&wo.name)?;

        match self.work_order_repo.find_by_name(&wo.name)? {
            Some(prev) if prev.docstatus != DocStatus::Draft => {
                return Err(ApiError::transition(prev.docstatus, DocStatus::Draft));
            }
            Some(_) => {
                wo.docstatus = DocStatus::Draft;
                self.work_order_repo.update(&wo)?;
            }
            None => {
                wo.docstatus = DocStatus::Draft;
                self.work_order_repo.insert(&wo)?;
            }
        }
        Ok(wo)
    }

    /// 提交工单并生成缺失的作业卡
    ///
    /// 任一作业卡生成失败时工单保持草稿，已生成的作业卡一并回滚
    #[instrument(skip(self, today))]
    pub fn submit(&self, name: &str, today: NaiveDate) -> ApiResult<WorkOrderSubmitResponse> {
        let submit = |conn: &Connection| -> ApiResult<WorkOrderSubmitResponse> {
            Self::require_name(name)?;
            let mut wo = Self::found(WorkOrderRepository::find_by_name_on(conn, name)?, name)?;
            if wo.docstatus != DocStatus::Draft {
                return Err(ApiError::transition(wo.docstatus, DocStatus::Submitted));
            }

            WorkOrderRepository::set_docstatus_on(conn, name, DocStatus::Submitted)?;
            wo.docstatus = DocStatus::Submitted;

            let created_job_cards = match self.dispatcher.dispatch(
                conn,
                DocumentEvent::WorkOrderSubmit(&wo),
                today,
            )? {
                EventOutcome::JobCardsCreated(names) => names,
                EventOutcome::Handled => Vec::new(),
            };

            Ok(WorkOrderSubmitResponse {
                work_order: wo.name,
                created_job_cards,
            })
        };
        let response = with_write_transaction(&self.conn, submit)?;

        info!(
            work_order = name,
            created = response.created_job_cards.len(),
            "工单已提交"
        );
        Ok(response)
    }

    pub fn get(&self, name: &str) -> ApiResult<WorkOrder> {
        Self::require_name(name)?;
        Self::found(self.work_order_repo.find_by_name(name)?, name)
    }

    /// 工单累计完工数量（已提交作业卡合计）
    ///
    /// 工单为空或不存在时返回 0
    #[instrument(skip(self))]
    pub fn get_total_manufactured_qty(&self, work_order: Option<&str>) -> ApiResult<f64> {
        let work_order = match work_order.filter(|w| !w.is_empty()) {
            Some(w) => w,
            None => return Ok(0.0),
        };
        Ok(self.job_card_repo.sum_completed_qty_by_work_order(work_order)?)
    }

    fn found(wo: Option<WorkOrder>, name: &str) -> ApiResult<WorkOrder> {
        wo.ok_or_else(|| {
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
    use crate::domain::job_card::{JobCard, TimeLog};
    use crate::domain::work_order::{Shift, WorkOrder, WorkOrderOperation};
    use crate::domain::workstation::Workstation;
    use chrono::NaiveDate;
    use rusqlite::Connection;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn setup() -> AppState {
        AppState::from_connection(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_total_manufactured_qty() {
        let state = setup();
        assert_eq!(state.work_order_api.get_total_manufactured_qty(None).unwrap(), 0.0);
        assert_eq!(state.work_order_api.get_total_manufactured_qty(Some("")).unwrap(), 0.0);
        assert_eq!(
            state.work_order_api.get_total_manufactured_qty(Some("WO-404")).unwrap(),
            0.0
        );

        for (name, qty) in [("JC-1", 4.0), ("JC-2", 6.5), ("JC-3", 100.0)] {
            let mut jc = JobCard::new(name);
            jc.work_order = Some("WO-1".to_string());
            jc.append_time_log(TimeLog {
                completed_qty: qty,
                ..Default::default()
            });
            state.job_card_api.save(jc, today()).unwrap();
        }
        state.job_card_api.submit("JC-1", today()).unwrap();
        state.job_card_api.submit("JC-2", today()).unwrap();

        assert_eq!(
            state.work_order_api.get_total_manufactured_qty(Some("WO-1")).unwrap(),
            10.5
        );
    }

    #[test]
    fn test_submit_generates_job_cards_once() {
        let state = setup();
        state
            .workstation_repo
            .insert(&Workstation::new("WS-A", Some("Plant A".to_string())))
            .unwrap();
        state
            .master_data_repo
            .insert_shift(&Shift {
                name: "Shift 1".to_string(),
                from_time: None,
                to_time: None,
            })
            .unwrap();

        let mut wo = WorkOrder::new("WO-1");
        wo.plant_name = Some("Plant A".to_string());
        wo.operations = vec![WorkOrderOperation {
            name: "op-1".to_string(),
            idx: 1,
            operation: "Mixing".to_string(),
            ..Default::default()
        }];
        state.work_order_api.save(wo).unwrap();

        let response = state.work_order_api.submit("WO-1", today()).unwrap();
        assert_eq!(response.created_job_cards.len(), 1);

        let err = state.work_order_api.submit("WO-1", today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
    }
}
