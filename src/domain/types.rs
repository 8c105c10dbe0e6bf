// ==========================================
// 定制制造扩展 - 领域类型定义
// ==========================================
// 职责: 单据状态、字段类型、数值/勾选值的统一解释
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ==========================================
// 单据状态 (DocStatus)
// ==========================================
// 存储为整数: 0=草稿, 1=已提交, 2=已取消
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocStatus {
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }

    /// 从数据库整数解析（未知值按草稿处理）
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => DocStatus::Submitted,
            2 => DocStatus::Cancelled,
            _ => DocStatus::Draft,
        }
    }
}

impl Default for DocStatus {
    fn default() -> Self {
        DocStatus::Draft
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocStatus::Draft => write!(f, "DRAFT"),
            DocStatus::Submitted => write!(f, "SUBMITTED"),
            DocStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ==========================================
// 字段类型 (Field Type)
// ==========================================
// 对齐: custom_field.fieldtype 的文本取值
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Float,
    Currency,
    Int,
    Percent,
    Data,
    Link,
    Other(String),
}

impl FieldType {
    pub fn from_str(value: &str) -> Self {
        match value.trim() {
            "Float" => FieldType::Float,
            "Currency" => FieldType::Currency,
            "Int" => FieldType::Int,
            "Percent" => FieldType::Percent,
            "Data" => FieldType::Data,
            "Link" => FieldType::Link,
            other => FieldType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Float => "Float",
            FieldType::Currency => "Currency",
            FieldType::Int => "Int",
            FieldType::Percent => "Percent",
            FieldType::Data => "Data",
            FieldType::Link => "Link",
            FieldType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 数值与勾选值解释
// ==========================================

/// 宽松数值转换
///
/// 缺失 / 空串 / 非数值 一律视为 0
pub fn flt(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// 是否为空值（null 或空串）
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// 勾选框取值判定
///
/// 真值: true、数值 1、字符串 "1"/"yes"/"true"（忽略首尾空白与大小写）
pub fn is_checked(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "yes" | "true"),
        _ => false,
    }
}

/// 按小数位数四舍五入
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_checked_truthy_forms() {
        assert!(is_checked(&json!(true)));
        assert!(is_checked(&json!(1)));
        assert!(is_checked(&json!(1.0)));
        assert!(is_checked(&json!("1")));
        assert!(is_checked(&json!("Yes")));
        assert!(is_checked(&json!(" yes ")));
        assert!(is_checked(&json!("TRUE")));
        assert!(is_checked(&json!("tRuE")));
    }

    #[test]
    fn test_is_checked_falsy_forms() {
        assert!(!is_checked(&json!(false)));
        assert!(!is_checked(&json!(0)));
        assert!(!is_checked(&json!(2)));
        assert!(!is_checked(&json!("0")));
        assert!(!is_checked(&json!("no")));
        assert!(!is_checked(&json!("")));
        assert!(!is_checked(&Value::Null));
        assert!(!is_checked(&json!(["yes"])));
    }

    #[test]
    fn test_flt() {
        assert_eq!(flt(&json!(2.5)), 2.5);
        assert_eq!(flt(&json!("4")), 4.0);
        assert_eq!(flt(&json!("")), 0.0);
        assert_eq!(flt(&json!("abc")), 0.0);
        assert_eq!(flt(&Value::Null), 0.0);
    }

    #[test]
    fn test_docstatus_roundtrip_values() {
        assert_eq!(DocStatus::from_i64(0), DocStatus::Draft);
        assert_eq!(DocStatus::from_i64(1), DocStatus::Submitted);
        assert_eq!(DocStatus::from_i64(2), DocStatus::Cancelled);
        assert_eq!(DocStatus::Submitted.as_i64(), 1);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(2.5, 0), 3.0);
    }
}
