// ==========================================
// 定制制造扩展 - 工作站磨损台账引擎
// ==========================================
// 职责: 作业卡提交/取消时增减工作站累计数量
// 输入: 作业卡（工作站 + 完工数量）
// 输出: workstation.worked_quantity 原子更新
// 红线: 累计数量下限为 0；不修改 modified
// ==========================================

use crate::domain::job_card::JobCard;
use crate::repository::error::RepositoryResult;
use crate::repository::workstation_repo::WorkstationRepository;
use rusqlite::Connection;
use tracing::{debug, instrument};

// ==========================================
// WearLedgerEngine - 磨损台账引擎
// ==========================================
#[derive(Debug, Default)]
pub struct WearLedgerEngine;

impl WearLedgerEngine {
    pub fn new() -> Self {
        Self
    }

    /// 作业卡提交：累加完工数量
    #[instrument(skip(self, conn, job_card), fields(job_card = %job_card.name))]
    pub fn on_submit(&self, conn: &Connection, job_card: &JobCard) -> RepositoryResult<()> {
        self.apply_delta(conn, job_card, job_card.total_completed_qty)
    }

    /// 作业卡取消：扣减完工数量
    #[instrument(skip(self, conn, job_card), fields(job_card = %job_card.name))]
    pub fn on_cancel(&self, conn: &Connection, job_card: &JobCard) -> RepositoryResult<()> {
        self.apply_delta(conn, job_card, -job_card.total_completed_qty)
    }

    fn apply_delta(&self, conn: &Connection, job_card: &JobCard, delta: f64) -> RepositoryResult<()> {
        if delta == 0.0 || !delta.is_finite() {
            return Ok(());
        }

        let workstation = match job_card.workstation.as_deref().filter(|w| !w.is_empty()) {
            Some(w) => w,
            None => return Ok(()),
        };

        let affected = WorkstationRepository::increment_worked_quantity_on(conn, workstation, delta)?;

        if affected == 0 {
            debug!(workstation, "工作站不存在，跳过累计数量更新");
        } else {
            debug!(workstation, delta, "累计数量已更新");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workstation::Workstation;
    use std::sync::{Arc, Mutex};

    struct Fixture {
        engine: WearLedgerEngine,
        conn: Arc<Mutex<Connection>>,
    }

    impl Fixture {
        fn submit(&self, job_card: &JobCard) {
            self.engine.on_submit(&self.conn.lock().unwrap(), job_card).unwrap();
        }

        fn cancel(&self, job_card: &JobCard) {
            self.engine.on_cancel(&self.conn.lock().unwrap(), job_card).unwrap();
        }
    }

    fn setup() -> (Fixture, WorkstationRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = WorkstationRepository::from_connection(conn.clone());
        repo.insert(&Workstation::new("WS-1", Some("P1".to_string()))).unwrap();
        (
            Fixture {
                engine: WearLedgerEngine::new(),
                conn,
            },
            repo,
        )
    }

    fn card(workstation: Option<&str>, qty: f64) -> JobCard {
        let mut jc = JobCard::new("JC-1");
        jc.workstation = workstation.map(str::to_string);
        jc.total_completed_qty = qty;
        jc
    }

    #[test]
    fn test_submit_then_cancel_restores_counter() {
        let (f, repo) = setup();
        repo.set_worked_quantity("WS-1", 10.0).unwrap();

        f.submit(&card(Some("WS-1"), 5.0));
        assert_eq!(repo.get_worked_quantity("WS-1").unwrap(), Some(15.0));

        f.cancel(&card(Some("WS-1"), 5.0));
        assert_eq!(repo.get_worked_quantity("WS-1").unwrap(), Some(10.0));
    }

    #[test]
    fn test_cancel_floors_at_zero() {
        let (f, repo) = setup();
        repo.set_worked_quantity("WS-1", 3.0).unwrap();

        f.cancel(&card(Some("WS-1"), 5.0));
        assert_eq!(repo.get_worked_quantity("WS-1").unwrap(), Some(0.0));
    }

    #[test]
    fn test_missing_workstation_and_zero_qty_are_noops() {
        let (f, repo) = setup();
        let before = repo.get_modified("WS-1").unwrap();

        f.submit(&card(None, 5.0));
        f.submit(&card(Some(""), 5.0));
        f.submit(&card(Some("WS-X"), 5.0));
        f.submit(&card(Some("WS-1"), 0.0));

        assert_eq!(repo.get_worked_quantity("WS-1").unwrap(), Some(0.0));
        assert_eq!(repo.get_modified("WS-1").unwrap(), before);
    }
}
