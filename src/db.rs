// ==========================================
// 同位素年代学实验室数据导入引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 核心建库脚本（按文件名排序的固定序列）
///
/// 说明：
/// - 每个脚本自身幂等（IF NOT EXISTS / INSERT OR IGNORE），整体可安全重复执行
/// - 扩展脚本由配置项 GEOLAB_INIT_SQL 在核心脚本之后追加
pub const CORE_FIXTURES: &[(&str, &str)] = &[
    (
        "01-create-tables.sql",
        include_str!("../migrations/01-create-tables.sql"),
    ),
    (
        "02-populate-vocabulary.sql",
        include_str!("../migrations/02-populate-vocabulary.sql"),
    ),
];

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_fixtures_sorted() {
        // 建库脚本必须按文件名有序执行
        let names: Vec<&str> = CORE_FIXTURES.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_open_in_memory() {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open connection");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("Failed to read pragma");
        assert_eq!(fk, 1);
    }
}
