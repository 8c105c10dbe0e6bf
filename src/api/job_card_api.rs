// ==========================================
// 定制制造扩展 - 作业卡 API
// ==========================================
// 职责: 作业卡保存/提交/取消，并分发对应单据事件
// 状态: DRAFT → SUBMITTED → CANCELLED
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::db::with_write_transaction;
use crate::domain::job_card::JobCard;
use crate::domain::types::DocStatus;
use crate::engine::events::{DocEventDispatcher, DocumentEvent};
use crate::engine::job_card_generator::new_job_card_name;
use crate::i18n::t_with_args;
use crate::repository::job_card_repo::JobCardRepository;

const DOCTYPE: &str = "Job Card";

// ==========================================
// JobCardApi - 作业卡 API
// ==========================================
// 状态写入与事件处理在同一事务内完成
pub struct JobCardApi {
    conn: Arc<Mutex<Connection>>,
    job_card_repo: Arc<JobCardRepository>,
    dispatcher: Arc<DocEventDispatcher>,
}

impl JobCardApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        job_card_repo: Arc<JobCardRepository>,
        dispatcher: Arc<DocEventDispatcher>,
    ) -> Self {
        Self {
            conn,
            job_card_repo,
            dispatcher,
        }
    }

    /// 保存草稿作业卡
    ///
    /// 流程: 分配名称 → 读取已保存版本 → 重算合计 → before_save 事件 → 写入
    ///
    /// # 返回
    /// - Ok(JobCard): 写入后的单据（含同步后的合计字段）
    /// - Err(InvalidStateTransition): 已提交/已取消的单据不可再保存
    #[instrument(skip(self, doc), fields(job_card = %doc.name))]
    pub fn save(&self, mut doc: JobCard, today: NaiveDate) -> ApiResult<JobCard> {
        if doc.name.trim().is_empty() {
            doc.name = new_job_card_name();
        }

        with_write_transaction(&self.conn, |conn| -> ApiResult<()> {
            let previous = JobCardRepository::find_by_name_on(conn, &doc.name)?;
            if let Some(prev) = &previous {
                if prev.docstatus != DocStatus::Draft {
                    return Err(ApiError::transition(prev.docstatus, DocStatus::Draft));
                }
            }
            doc.docstatus = DocStatus::Draft;

            doc.recompute_totals();
            self.dispatcher.dispatch(
                conn,
                DocumentEvent::JobCardBeforeSave {
                    doc: &mut doc,
                    previous: previous.as_ref(),
                },
                today,
            )?;

            // 时间日志行名在首次持久化时分配
            for log in doc.time_logs.iter_mut() {
                if log.name.as_deref().map_or(true, str::is_empty) {
                    log.name = Some(uuid::Uuid::new_v4().simple().to_string());
                }
            }

            if previous.is_some() {
                JobCardRepository::update_on(conn, &doc)?;
            } else {
                JobCardRepository::insert_on(conn, &doc)?;
            }
            Ok(())
        })?;
        Ok(doc)
    }

    /// 提交作业卡（累加工作站计数）
    #[instrument(skip(self))]
    pub fn submit(&self, name: &str, today: NaiveDate) -> ApiResult<JobCard> {
        let doc = self.transition(name, DocStatus::Draft, DocStatus::Submitted, today)?;
        info!(job_card = name, qty = doc.total_completed_qty, "作业卡已提交");
        Ok(doc)
    }

    /// 取消作业卡（回退工作站计数）
    #[instrument(skip(self))]
    pub fn cancel(&self, name: &str, today: NaiveDate) -> ApiResult<JobCard> {
        let doc = self.transition(name, DocStatus::Submitted, DocStatus::Cancelled, today)?;
        info!(job_card = name, qty = doc.total_completed_qty, "作业卡已取消");
        Ok(doc)
    }

    pub fn get(&self, name: &str) -> ApiResult<JobCard> {
        Self::require_name(name)?;
        Self::found(self.job_card_repo.find_by_name(name)?, name)
    }

    /// 状态变更 + 对应事件；事件处理失败时状态一并回滚
    fn transition(
        &self,
        name: &str,
        expected: DocStatus,
        target: DocStatus,
        today: NaiveDate,
    ) -> ApiResult<JobCard> {
        with_write_transaction(&self.conn, |conn| -> ApiResult<JobCard> {
            Self::require_name(name)?;
            let mut doc = Self::found(JobCardRepository::find_by_name_on(conn, name)?, name)?;
            if doc.docstatus != expected {
                return Err(ApiError::transition(doc.docstatus, target));
            }

            JobCardRepository::set_docstatus_on(conn, name, target)?;
            doc.docstatus = target;

            let event = match target {
                DocStatus::Submitted => DocumentEvent::JobCardSubmit(&doc),
                _ => DocumentEvent::JobCardCancel(&doc),
            };
            self.dispatcher.dispatch(conn, event, today)?;
            Ok(doc)
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

    fn found(doc: Option<JobCard>, name: &str) -> ApiResult<JobCard> {
        doc.ok_or_else(|| {
            ApiError::NotFound(t_with_args(
                "document.not_found",
                &[("doctype", DOCTYPE), ("name", name)],
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::error::ApiError;
    use crate::app::AppState;
    use crate::domain::job_card::{JobCard, TimeLog};
    use crate::domain::types::DocStatus;
    use crate::domain::workstation::Workstation;
    use chrono::NaiveDate;
    use rusqlite::Connection;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn setup() -> AppState {
        let state = AppState::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        state
            .workstation_repo
            .insert(&Workstation::new("WS-1", None))
            .unwrap();
        state
    }

    fn card(name: &str, qty: f64) -> JobCard {
        let mut jc = JobCard::new(name);
        jc.workstation = Some("WS-1".to_string());
        jc.append_time_log(TimeLog {
            time_in_mins: 60.0,
            completed_qty: qty,
            ..Default::default()
        });
        jc
    }

    #[test]
    fn test_save_assigns_names_and_totals() {
        let state = setup();
        let saved = state.job_card_api.save(card("", 5.0), today()).unwrap();

        assert!(saved.name.starts_with("JC-"));
        assert_eq!(saved.total_completed_qty, 5.0);
        assert_eq!(saved.total_machine_operation_time_float, 1.0);
        assert!(saved.time_logs[0].name.is_some());

        let stored = state.job_card_api.get(&saved.name).unwrap();
        assert_eq!(stored.time_logs[0].name, saved.time_logs[0].name);
    }

    #[test]
    fn test_submit_then_cancel_restores_counter() {
        let state = setup();
        state.job_card_api.save(card("JC-1", 5.0), today()).unwrap();

        state.job_card_api.submit("JC-1", today()).unwrap();
        assert_eq!(state.workstation_repo.get_worked_quantity("WS-1").unwrap(), Some(5.0));

        let cancelled = state.job_card_api.cancel("JC-1", today()).unwrap();
        assert_eq!(cancelled.docstatus, DocStatus::Cancelled);
        assert_eq!(state.workstation_repo.get_worked_quantity("WS-1").unwrap(), Some(0.0));
    }

    #[test]
    fn test_invalid_transitions() {
        let state = setup();
        state.job_card_api.save(card("JC-1", 5.0), today()).unwrap();

        let err = state.job_card_api.cancel("JC-1", today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

        state.job_card_api.submit("JC-1", today()).unwrap();
        let err = state.job_card_api.submit("JC-1", today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

        let err = state.job_card_api.save(card("JC-1", 7.0), today()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
        assert_eq!(state.workstation_repo.get_worked_quantity("WS-1").unwrap(), Some(5.0));
    }

    #[test]
    fn test_missing_job_card() {
        let state = setup();
        let err = state.job_card_api.submit("JC-404", today()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = state.job_card_api.get("").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
