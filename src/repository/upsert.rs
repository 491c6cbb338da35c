// ==========================================
// 同位素年代学实验室数据导入引擎 - 自然键 Upsert 解析器
// ==========================================
// 职责: 按自然键查找既有行, 不存在则在当前事务内暂存新行
// 约束:
// - 查找先于每次创建, 同一工作单元内同一键集至多暂存一行
// - 结构化值 (JSON) 不参与等值过滤, 仅在创建时作为默认值写入
// - 跨进程唯一性由表上的唯一约束兜底, 不是本解析器的保证
// ==========================================

use rusqlite::{params_from_iter, Row, Transaction};
use tracing::trace;

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::schema::record::{FieldValue, RecordValue};
use crate::schema::registry::TableSchema;

pub struct UpsertResolver;

impl UpsertResolver {
    /// 查找或创建一行
    ///
    /// # 参数
    /// - tx: 当前工作单元（未提交事务）
    /// - table: 反射得到的表结构
    /// - natural_key: 自然键字段集（标量参与过滤, JSON 仅写入）
    /// - defaults: 仅在创建时附加的默认字段
    ///
    /// # 返回
    /// - Ok(RecordValue): 既有行（原样返回, 不用 defaults 覆写）或新暂存行
    pub fn get_or_create(
        tx: &Transaction<'_>,
        table: &TableSchema,
        natural_key: &[(&str, FieldValue)],
        defaults: &[(&str, FieldValue)],
    ) -> RepositoryResult<RecordValue> {
        // 防注入: 所有字段名必须存在于反射列定义
        for (column, _) in natural_key.iter().chain(defaults.iter()) {
            table.require_column(column)?;
        }

        if let Some(existing) = Self::find_by_key(tx, table, natural_key)? {
            trace!(table = %table.name, "命中既有行");
            return Ok(existing);
        }

        // 创建: 自然键字段全量写入, 默认字段仅补充未占用列
        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<&FieldValue> = Vec::new();
        for (column, value) in natural_key {
            columns.push(column);
            values.push(value);
        }
        for (column, value) in defaults {
            if !columns.contains(column) {
                columns.push(column);
                values.push(value);
            }
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES", table.name)
        } else {
            let column_list = columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                table.name, column_list, placeholders
            )
        };
        tx.execute(&sql, params_from_iter(values.iter()))?;

        let rowid = tx.last_insert_rowid();
        trace!(table = %table.name, rowid = rowid, "暂存新行");
        Self::read_by_rowid(tx, table, rowid)
    }

    /// 按自然键等值查找（IS 比较, NULL 键值也可匹配）
    pub fn find_by_key(
        tx: &Transaction<'_>,
        table: &TableSchema,
        natural_key: &[(&str, FieldValue)],
    ) -> RepositoryResult<Option<RecordValue>> {
        let filter: Vec<&(&str, FieldValue)> = natural_key
            .iter()
            .filter(|(_, value)| value.is_scalar())
            .collect();

        // 全部键为结构化值时无法过滤, 视为未命中
        if filter.is_empty() {
            return Ok(None);
        }

        let where_clause = filter
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("\"{}\" IS ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE {} LIMIT 1",
            table.name, where_clause
        );

        let mut stmt = tx.prepare(&sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(params_from_iter(filter.iter().map(|(_, v)| v)))?;

        match rows.next()? {
            Some(row) => Ok(Some(record_from_row(&table.name, &column_names, row)?)),
            None => Ok(None),
        }
    }

    /// 刷新非键属性（再次导入时更新既有行）
    ///
    /// # 说明
    /// - 按反射主键定位; 同步更新内存中的记录值
    pub fn set_attributes(
        tx: &Transaction<'_>,
        table: &TableSchema,
        record: &mut RecordValue,
        fields: &[(&str, FieldValue)],
    ) -> RepositoryResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        for (column, _) in fields {
            table.require_column(column)?;
        }

        let pk_columns = table.primary_key();
        if pk_columns.is_empty() {
            return Err(RepositoryError::InternalError(format!(
                "表 {} 无主键, 无法定位更新",
                table.name
            )));
        }
        let mut pk_values = Vec::new();
        for pk in &pk_columns {
            let value = record.get(pk).cloned().ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: (*pk).to_string(),
                    message: "记录缺少主键值".to_string(),
                }
            })?;
            pk_values.push(value);
        }

        let set_clause = fields
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("\"{}\" = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = pk_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("\"{}\" IS ?{}", column, fields.len() + i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE {}",
            table.name, set_clause, where_clause
        );

        let params: Vec<&FieldValue> = fields
            .iter()
            .map(|(_, v)| v)
            .chain(pk_values.iter())
            .collect();
        tx.execute(&sql, params_from_iter(params))?;

        for (column, value) in fields {
            record.set(*column, value.clone());
        }
        Ok(())
    }

    fn read_by_rowid(
        tx: &Transaction<'_>,
        table: &TableSchema,
        rowid: i64,
    ) -> RepositoryResult<RecordValue> {
        let sql = format!("SELECT * FROM \"{}\" WHERE rowid = ?1", table.name);
        let mut stmt = tx.prepare(&sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query([rowid])?;
        match rows.next()? {
            Some(row) => record_from_row(&table.name, &column_names, row),
            None => Err(RepositoryError::NotFound {
                entity: table.name.clone(),
                key: format!("rowid={}", rowid),
            }),
        }
    }
}

/// 查询结果行 → 动态记录值
fn record_from_row(
    table: &str,
    column_names: &[String],
    row: &Row<'_>,
) -> RepositoryResult<RecordValue> {
    let mut record = RecordValue::new(table);
    for (index, name) in column_names.iter().enumerate() {
        let value = FieldValue::from_value_ref(
            row.get_ref(index)
                .map_err(|e| RepositoryError::DatabaseQueryError(e.to_string()))?,
        );
        record.set(name.clone(), value);
    }
    Ok(record)
}
