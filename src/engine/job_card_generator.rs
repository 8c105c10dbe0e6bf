// ==========================================
// 定制制造扩展 - 作业卡自动生成引擎
// ==========================================
// 职责: 工单提交时按 工序 × 工作站 × 班次 生成草稿作业卡
// 输入: 工单（含工序行、车间）
// 输出: 新建作业卡名称列表
// 红线: 幂等，已存在的组合不重复生成
// ==========================================

use crate::domain::job_card::{JobCard, JobCardKey, JobCardScrapItem};
use crate::domain::types::DocStatus;
use crate::domain::work_order::{BomScrapItem, WorkOrder};
use crate::engine::weight_sync::WeightSyncEngine;
use crate::repository::error::RepositoryResult;
use crate::repository::job_card_repo::JobCardRepository;
use crate::repository::master_data_repo::MasterDataRepository;
use crate::repository::workstation_repo::WorkstationRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// JobCardGenerator - 作业卡生成引擎
// ==========================================
pub struct JobCardGenerator {
    weight_sync: Arc<WeightSyncEngine>,
}

impl JobCardGenerator {
    pub fn new(weight_sync: Arc<WeightSyncEngine>) -> Self {
        Self { weight_sync }
    }

    /// 为工单生成缺失的作业卡
    ///
    /// # 参数
    /// - `conn`: 调用方持有的连接（事务），任一作业卡写入失败时整体回滚
    /// - `work_order`: 已提交的工单
    /// - `today`: 作业卡过账日期
    ///
    /// # 返回
    /// 新建作业卡名称（未分配车间或班次/工作站/工序为空时返回空列表）
    #[instrument(skip(self, conn, work_order, today), fields(work_order = %work_order.name))]
    pub fn generate_for_work_order(
        &self,
        conn: &Connection,
        work_order: &WorkOrder,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<String>> {
        let plant = match work_order.plant() {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };

        let shifts = MasterDataRepository::list_shifts_on(conn)?;
        if shifts.is_empty() {
            return Ok(Vec::new());
        }

        let workstations = WorkstationRepository::find_by_plant_on(conn, plant)?;
        if workstations.is_empty() {
            return Ok(Vec::new());
        }

        if work_order.operations.is_empty() {
            return Ok(Vec::new());
        }

        let mut existing = JobCardRepository::find_keys_by_work_order_on(conn, &work_order.name)?;
        let mut scrap_by_bom: HashMap<Option<String>, Vec<BomScrapItem>> = HashMap::new();
        let mut created = Vec::new();

        for op in &work_order.operations {
            for workstation in &workstations {
                for shift in &shifts {
                    let key = JobCardKey::new(&op.name, &workstation.name, &shift.name);
                    if existing.contains(&key) {
                        continue;
                    }

                    let bom_no = op
                        .bom
                        .clone()
                        .filter(|b| !b.is_empty())
                        .or_else(|| work_order.bom_no.clone());

                    let mut jc = JobCard::new(new_job_card_name());
                    jc.work_order = Some(work_order.name.clone());
                    jc.workstation = Some(workstation.name.clone());
                    jc.workstation_type = workstation.workstation_type.clone();
                    jc.operation = Some(op.operation.clone());
                    jc.operation_id = Some(op.name.clone());
                    jc.shift_number = Some(shift.name.clone());
                    jc.bom_no = bom_no.clone();
                    jc.sequence_id = op.sequence_id;
                    jc.batch_size = op.batch_size;
                    jc.wip_warehouse = op.wip_warehouse.clone();
                    jc.source_warehouse = op.source_warehouse.clone();
                    jc.hour_rate = op.hour_rate;
                    jc.production_item = work_order.production_item.clone();
                    jc.item_name = work_order.item_name.clone();
                    jc.plant_name = Some(plant.to_string());
                    jc.posting_date = Some(today);
                    jc.for_quantity = work_order.qty;
                    jc.docstatus = DocStatus::Draft;

                    if !scrap_by_bom.contains_key(&bom_no) {
                        let rows = match bom_no.as_deref() {
                            Some(bom) => MasterDataRepository::find_bom_scrap_items_on(conn, bom)?,
                            None => Vec::new(),
                        };
                        scrap_by_bom.insert(bom_no.clone(), rows);
                    }
                    if let Some(rows) = scrap_by_bom.get(&bom_no) {
                        for row in rows {
                            jc.append_scrap_item(JobCardScrapItem {
                                item_code: row.item_code.clone(),
                                item_name: row.item_name.clone(),
                                stock_qty: row.stock_qty,
                                stock_uom: row.stock_uom.clone(),
                                qty: row.stock_qty,
                                ..Default::default()
                            });
                        }
                    }

                    self.weight_sync.prepare_for_save(conn, &mut jc, None, today)?;
                    JobCardRepository::insert_on(conn, &jc)?;

                    existing.insert(key);
                    created.push(jc.name);
                }
            }
        }

        info!(count = created.len(), "作业卡自动生成完成");
        Ok(created)
    }
}

/// 新作业卡名称
pub fn new_job_card_name() -> String {
    format!("JC-{}", Uuid::new_v4().simple())
}
