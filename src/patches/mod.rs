// ==========================================
// 定制制造扩展 - 数据补丁
// ==========================================
// 职责: 一次性数据/表结构迁移，执行记录写入 patch_log
// ==========================================

pub mod convert_machine_time_to_float;

use crate::repository::error::RepositoryResult;
use crate::repository::patch_repo::PatchRepository;
use serde::{Deserialize, Serialize};

/// 补丁执行报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchReport {
    pub patch: String,
    /// 本次是否执行（已执行过的补丁为 false）
    pub applied: bool,
    pub steps: Vec<String>,
}

impl PatchReport {
    pub fn new(patch: &str) -> Self {
        Self {
            patch: patch.to_string(),
            applied: false,
            steps: Vec::new(),
        }
    }

    pub fn step(&mut self, description: String) {
        self.steps.push(description);
    }
}

/// 按顺序执行全部补丁
pub fn run_all(repo: &PatchRepository) -> RepositoryResult<Vec<PatchReport>> {
    Ok(vec![convert_machine_time_to_float::execute(repo)?])
}
