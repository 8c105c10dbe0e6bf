// ==========================================
// 定制制造扩展 - 自定义字段元数据
// ==========================================
// 对齐: custom_field 表 (主键: "{dt}-{fieldname}")
// ==========================================

use crate::domain::types::FieldType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub dt: String,
    pub fieldname: String,
    pub label: Option<String>,
    pub fieldtype: FieldType,
    pub precision: Option<String>,
    pub insert_after: Option<String>,
}

impl CustomField {
    /// 元数据主键
    pub fn key(dt: &str, fieldname: &str) -> String {
        format!("{}-{}", dt, fieldname)
    }

    pub fn name(&self) -> String {
        Self::key(&self.dt, &self.fieldname)
    }

    /// 是否按数值列参与重量汇总
    ///
    /// 字段类型属于 `numeric_types`，或字段名全部为数字
    pub fn is_numeric(&self, numeric_types: &[FieldType]) -> bool {
        numeric_types.contains(&self.fieldtype)
            || (!self.fieldname.is_empty() && self.fieldname.chars().all(|c| c.is_ascii_digit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ft: FieldType) -> CustomField {
        CustomField {
            dt: "job_card_weight_per_bag".to_string(),
            fieldname: name.to_string(),
            label: None,
            fieldtype: ft,
            precision: None,
            insert_after: None,
        }
    }

    #[test]
    fn test_is_numeric() {
        let types = vec![FieldType::Float, FieldType::Int];
        assert!(field("bag_weight", FieldType::Float).is_numeric(&types));
        assert!(field("25", FieldType::Data).is_numeric(&types));
        assert!(!field("remarks", FieldType::Data).is_numeric(&types));
        assert!(!field("rate", FieldType::Currency).is_numeric(&types));
    }

    #[test]
    fn test_key() {
        assert_eq!(CustomField::key("job_card", "x"), "job_card-x");
    }
}
