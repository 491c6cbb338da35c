// ==========================================
// 同位素年代学实验室数据导入引擎 - 模式绑定器
// ==========================================
// 职责: 打开数据库连接, 运行期反射表结构, 构建表注册中心
// 约束: 构造期反射失败仅告警并保持空注册中心（允许面向
//       未初始化数据库工作）; 后续显式 reflect() 必须上抛错误
// ==========================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{open_sqlite_connection, CORE_FIXTURES};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::schema::registry::{name_relationships, ColumnSchema, TableRegistry, TableSchema};

/// 模式绑定器
///
/// 持有唯一的数据库连接（一个进程 = 一个工作单元 = 一个连接）,
/// 连接以 Arc<Mutex<_>> 共享给数据层, 不得跨并发批次复用
pub struct SchemaBinder {
    conn: Arc<Mutex<Connection>>,
    registry: TableRegistry,
}

impl SchemaBinder {
    /// 按连接描述符（SQLite 路径）打开连接并尝试反射
    ///
    /// # 说明
    /// - 反射失败不中止进程: 告警后保持空注册中心,
    ///   待 initialize() / reflect() 显式重建
    pub fn connect(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        let mut binder = Self {
            conn: Arc::new(Mutex::new(conn)),
            registry: TableRegistry::default(),
        };
        if let Err(e) = binder.reflect() {
            warn!(error = %e, "构造期模式反射失败, 注册中心暂为空");
        }
        Ok(binder)
    }

    /// 从既有连接构造（测试与工具脚本用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let mut binder = Self {
            conn,
            registry: TableRegistry::default(),
        };
        if let Err(e) = binder.reflect() {
            warn!(error = %e, "构造期模式反射失败, 注册中心暂为空");
        }
        binder
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 反射当前库中全部表结构, 重建注册中心
    ///
    /// # 返回
    /// - Ok(usize): 映射的表数量
    /// - Err(RepositoryError::ReflectionError): 内省查询失败
    pub fn reflect(&mut self) -> RepositoryResult<usize> {
        let registry = {
            let conn = self.get_conn()?;
            reflect_registry(&conn)?
        };
        let count = registry.len();
        debug!(tables = count, "模式反射完成");
        self.registry = registry;
        Ok(count)
    }

    /// 幂等建库: 按文件名顺序执行核心脚本, 再执行扩展脚本, 最后重新反射
    ///
    /// # 参数
    /// - extensions: 配置的扩展建库脚本路径（按给定顺序执行）
    pub fn initialize(&mut self, extensions: &[impl AsRef<Path>]) -> RepositoryResult<()> {
        {
            let conn = self.get_conn()?;
            for (name, sql) in CORE_FIXTURES {
                info!(fixture = name, "执行核心建库脚本");
                conn.execute_batch(sql)
                    .map_err(|e| RepositoryError::DatabaseQueryError(format!("{}: {}", name, e)))?;
            }

            for path in extensions {
                let path = path.as_ref();
                info!(fixture = %path.display(), "执行扩展建库脚本");
                let sql = std::fs::read_to_string(path).map_err(|e| {
                    RepositoryError::InternalError(format!("{}: {}", path.display(), e))
                })?;
                conn.execute_batch(&sql).map_err(|e| {
                    RepositoryError::DatabaseQueryError(format!("{}: {}", path.display(), e))
                })?;
            }
        }

        self.reflect()?;
        Ok(())
    }
}

/// 内省 sqlite_master + PRAGMA, 构建注册中心
fn reflect_registry(conn: &Connection) -> RepositoryResult<TableRegistry> {
    let reflection_err = |e: rusqlite::Error| RepositoryError::ReflectionError(e.to_string());

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .map_err(reflection_err)?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(reflection_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(reflection_err)?;

    let mut tables = BTreeMap::new();
    for name in names {
        // 表名来自 sqlite_master, 可安全内插到 PRAGMA
        let mut col_stmt = conn
            .prepare(&format!("PRAGMA table_info(\"{}\")", name))
            .map_err(reflection_err)?;
        let columns: Vec<ColumnSchema> = col_stmt
            .query_map([], |row| {
                Ok(ColumnSchema {
                    name: row.get(1)?,
                    decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    is_primary_key: row.get::<_, i64>(5)? > 0,
                })
            })
            .map_err(reflection_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(reflection_err)?;

        let mut fk_stmt = conn
            .prepare(&format!("PRAGMA foreign_key_list(\"{}\")", name))
            .map_err(reflection_err)?;
        let foreign_keys: Vec<(String, String, String)> = fk_stmt
            .query_map([], |row| {
                let referenced_table: String = row.get(2)?;
                let from_column: String = row.get(3)?;
                // "to" 为空时引用对方主键, 本模式中统一为 id
                let referenced_column: Option<String> = row.get(4)?;
                Ok((
                    from_column,
                    referenced_table,
                    referenced_column.unwrap_or_else(|| "id".to_string()),
                ))
            })
            .map_err(reflection_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(reflection_err)?;

        let relationships = name_relationships(&foreign_keys);
        tables.insert(
            name.clone(),
            TableSchema {
                name,
                columns,
                relationships,
            },
        );
    }

    Ok(TableRegistry::new(tables))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_binder() -> SchemaBinder {
        let mut binder = SchemaBinder::connect(":memory:").expect("Failed to connect");
        binder
            .initialize(&[] as &[&Path])
            .expect("Failed to initialize schema");
        binder
    }

    #[test]
    fn test_reflect_empty_database() {
        // 未初始化的库: 反射成功, 注册中心为空
        let binder = SchemaBinder::connect(":memory:").expect("Failed to connect");
        assert!(binder.registry().is_empty());
    }

    #[test]
    fn test_initialize_builds_registry() {
        let binder = setup_binder();
        let registry = binder.registry();
        for table in [
            "project",
            "sample",
            "session",
            "analysis",
            "datum",
            "datum_type",
            "unit",
            "parameter",
            "error_metric",
            "data_file",
            "data_file_link",
        ] {
            assert!(registry.get(table).is_some(), "missing table {}", table);
        }
    }

    #[test]
    fn test_initialize_idempotent() {
        let mut binder = setup_binder();
        // 重复执行不应报错, 表数量不变
        let before = binder.registry().len();
        binder
            .initialize(&[] as &[&Path])
            .expect("Re-initialize failed");
        assert_eq!(binder.registry().len(), before);
    }

    #[test]
    fn test_relationship_naming() {
        let binder = setup_binder();
        let session = binder.registry().require("session").expect("session");
        assert!(session.relationship("_sample").is_some());

        // datum_type 的 unit / error_unit 同引用 unit 表, 必须去冲突
        let datum_type = binder.registry().require("datum_type").expect("datum_type");
        assert!(datum_type.relationship("_unit_unit").is_some());
        assert!(datum_type.relationship("_unit_error_unit").is_some());
    }

    #[test]
    fn test_reflect_columns() {
        let binder = setup_binder();
        let sample = binder.registry().require("sample").expect("sample");
        let id = sample.require_column("id").expect("id column");
        assert!(id.is_primary_key);
        let session = binder.registry().require("session").expect("session");
        assert!(session.require_column("sample_id").expect("col").not_null);
    }
}
