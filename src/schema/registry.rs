// ==========================================
// 同位素年代学实验室数据导入引擎 - 表注册中心
// ==========================================
// 职责: 保存反射得到的表结构, 供上层按表名寻址
// 约束: 消费方只依赖注册中心接口, 不得硬编码表结构
// ==========================================

use std::collections::BTreeMap;

use crate::repository::error::{RepositoryError, RepositoryResult};

/// 反射得到的列结构
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,            // 列名
    pub decl_type: String,       // 声明类型 (TEXT/INTEGER/REAL/...)
    pub not_null: bool,          // NOT NULL 约束
    pub is_primary_key: bool,    // 是否主键成员
    pub default_value: Option<String>, // 默认值表达式
}

/// 反射得到的外键关系
///
/// attribute 为确定性命名策略生成的关系属性名:
/// - 基础形式: "_" + 被引用表名（小写）
/// - 同表多外键冲突时: "_" + 被引用表名 + "_" + 本表外键列名
#[derive(Debug, Clone)]
pub struct RelationshipSchema {
    pub attribute: String,       // 关系属性名（去冲突后）
    pub from_column: String,     // 本表外键列
    pub referenced_table: String, // 被引用表
    pub referenced_column: String, // 被引用列
}

/// 反射得到的表结构
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub relationships: Vec<RelationshipSchema>,
}

impl TableSchema {
    /// 按名查找列
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 校验列存在（用于拼 SQL 前的防注入检查）
    pub fn require_column(&self, name: &str) -> RepositoryResult<&ColumnSchema> {
        self.column(name)
            .ok_or_else(|| RepositoryError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// 主键列名列表（按定义顺序）
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// 按关系属性名查找关系
    pub fn relationship(&self, attribute: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.attribute == attribute)
    }
}

/// 表注册中心
///
/// 一次反射构建, 可按需重建; BTreeMap 保证迭代顺序稳定
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, TableSchema>,
}

impl TableRegistry {
    pub fn new(tables: BTreeMap<String, TableSchema>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// 按表名寻址
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// 按表名寻址, 未注册时报 UnknownTable
    pub fn require(&self, name: &str) -> RepositoryResult<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownTable(name.to_string()))
    }

    /// 迭代所有已映射表（按表名有序）
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }
}

/// 关系属性命名策略
///
/// 对一张表的全部外键生成确定性的属性名, 保证自动发现的关系
/// 不会互相遮蔽:
/// - 默认 "_" + 被引用表名（小写）
/// - 同一被引用表出现多次时, 全部改用 "_表名_外键列" 形式
pub fn name_relationships(
    foreign_keys: &[(String, String, String)], // (from_column, referenced_table, referenced_column)
) -> Vec<RelationshipSchema> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, referenced, _) in foreign_keys {
        *counts.entry(referenced.to_lowercase()).or_insert(0) += 1;
    }

    foreign_keys
        .iter()
        .map(|(from_column, referenced_table, referenced_column)| {
            let base = referenced_table.to_lowercase();
            let attribute = if counts[&base] > 1 {
                format!("_{}_{}", base, from_column)
            } else {
                format!("_{}", base)
            };
            RelationshipSchema {
                attribute,
                from_column: from_column.clone(),
                referenced_table: referenced_table.clone(),
                referenced_column: referenced_column.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_relationships_no_collision() {
        let fks = vec![
            ("sample_id".to_string(), "sample".to_string(), "id".to_string()),
            ("instrument".to_string(), "instrument".to_string(), "id".to_string()),
        ];
        let rels = name_relationships(&fks);
        assert_eq!(rels[0].attribute, "_sample");
        assert_eq!(rels[1].attribute, "_instrument");
    }

    #[test]
    fn test_name_relationships_collision() {
        // datum_type 的 unit / error_unit 都引用 unit 表
        let fks = vec![
            ("unit".to_string(), "unit".to_string(), "id".to_string()),
            ("error_unit".to_string(), "unit".to_string(), "id".to_string()),
        ];
        let rels = name_relationships(&fks);
        assert_eq!(rels[0].attribute, "_unit_unit");
        assert_eq!(rels[1].attribute, "_unit_error_unit");
        // 去冲突后不得重名
        assert_ne!(rels[0].attribute, rels[1].attribute);
    }

    #[test]
    fn test_registry_require_unknown() {
        let registry = TableRegistry::default();
        let err = registry.require("sample").unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownTable(_)));
    }
}
