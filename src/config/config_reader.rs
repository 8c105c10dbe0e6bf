// ==========================================
// 定制制造扩展 - 配置读取 Trait
// ==========================================
// 职责: 定义引擎/报表所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::FieldType;
use std::error::Error;

// ==========================================
// LedgerConfigReader Trait
// ==========================================
// 实现者: ConfigManager（自行加锁）、ConfigView（借用已加锁的连接）
pub trait LedgerConfigReader {
    /// 每袋重量子表中按数值汇总的字段类型
    ///
    /// # 默认值
    /// - Float, Currency, Int, Percent
    fn get_weight_numeric_field_types(&self) -> Result<Vec<FieldType>, Box<dyn Error>>;

    /// 机台作业时长（小时）保留的小数位数
    ///
    /// # 默认值
    /// - 2
    fn get_machine_time_precision(&self) -> Result<u32, Box<dyn Error>>;

    /// 故障汇总图表展示的机台数量上限
    ///
    /// # 默认值
    /// - 10
    fn get_breakdown_chart_top_n(&self) -> Result<usize, Box<dyn Error>>;
}
