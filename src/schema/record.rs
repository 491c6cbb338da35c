// ==========================================
// 同位素年代学实验室数据导入引擎 - 动态记录值
// ==========================================
// 职责: 以字典承载一行反射表数据, 提供按名取值
// 说明: 表结构在运行期反射得到, 因此记录不做静态声明,
//       字段集合以注册中心的列定义为准
// ==========================================

use std::collections::BTreeMap;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;

/// 动态字段值
///
/// Json 变体用于结构化元数据 (如 session.data),
/// 不参与自然键等值过滤, 仅在创建时作为默认值写入
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Json(serde_json::Value),
}

impl FieldValue {
    /// 是否可参与自然键等值过滤（标量）
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Json(_))
    }

    /// 可选文本辅助构造（None → Null）
    pub fn opt_text(value: Option<String>) -> Self {
        match value {
            Some(v) => FieldValue::Text(v),
            None => FieldValue::Null,
        }
    }

    /// 可选浮点辅助构造（None → Null）
    pub fn opt_real(value: Option<f64>) -> Self {
        match value {
            Some(v) => FieldValue::Real(v),
            None => FieldValue::Null,
        }
    }

    /// 可选整型辅助构造（None → Null）
    pub fn opt_integer(value: Option<i64>) -> Self {
        match value {
            Some(v) => FieldValue::Integer(v),
            None => FieldValue::Null,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Boolean(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// 从查询结果列构造
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(v) => FieldValue::Integer(v),
            ValueRef::Real(v) => FieldValue::Real(v),
            ValueRef::Text(v) => FieldValue::Text(String::from_utf8_lossy(v).to_string()),
            ValueRef::Blob(v) => FieldValue::Text(String::from_utf8_lossy(v).to_string()),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Integer(v) => Ok(ToSqlOutput::Owned(Value::Integer(*v))),
            FieldValue::Real(v) => Ok(ToSqlOutput::Owned(Value::Real(*v))),
            FieldValue::Text(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            FieldValue::Boolean(v) => Ok(ToSqlOutput::Owned(Value::Integer(*v as i64))),
            // JSON 序列化为文本存储
            FieldValue::Json(v) => Ok(ToSqlOutput::Owned(Value::Text(v.to_string()))),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

/// 动态记录值（字典承载的一行数据）
#[derive(Debug, Clone)]
pub struct RecordValue {
    table: String,
    fields: BTreeMap<String, FieldValue>,
}

impl RecordValue {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set(&mut self, column: impl Into<String>, value: FieldValue) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// 主键 id 值（整型代理键表）
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(FieldValue::as_i64)
    }

    /// 主键 id 值（文本自然键表, 如词表）
    pub fn id_text(&self) -> Option<&str> {
        self.get("id").and_then(FieldValue::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_classification() {
        assert!(FieldValue::Text("a".to_string()).is_scalar());
        assert!(FieldValue::Integer(1).is_scalar());
        assert!(FieldValue::Null.is_scalar());
        assert!(!FieldValue::Json(json!({"k": 1})).is_scalar());
    }

    #[test]
    fn test_opt_helpers() {
        assert_eq!(FieldValue::opt_text(None), FieldValue::Null);
        assert_eq!(
            FieldValue::opt_text(Some("x".to_string())),
            FieldValue::Text("x".to_string())
        );
        assert_eq!(FieldValue::opt_real(Some(1.5)), FieldValue::Real(1.5));
        assert_eq!(FieldValue::opt_real(None), FieldValue::Null);
    }

    #[test]
    fn test_record_id_accessors() {
        let mut rec = RecordValue::new("analysis");
        rec.set("id", FieldValue::Integer(7));
        assert_eq!(rec.id(), Some(7));

        let mut vocab = RecordValue::new("unit");
        vocab.set("id", FieldValue::Text("Ma".to_string()));
        assert_eq!(vocab.id_text(), Some("Ma"));
        assert_eq!(vocab.id(), None);
    }
}
