// ==========================================
// 同位素年代学实验室数据导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite (rusqlite)
// 系统定位: 仪器输出 → 规范化关系模式的幂等导入管道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 归一化中间结构与结果类型
pub mod domain;

// 模式层 - 运行时反射与记录值
pub mod schema;

// 数据仓储层 - 自然键幂等写入
pub mod repository;

// 导入层 - 提取/分类/事务化会话/批处理
pub mod importer;

// 配置层 - 环境变量配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    BatchOutcome, ColumnMeta, ColumnRole, DatumSpec, ImportSummary, ItemOutcome, NormalizedRow,
    NormalizedTable, OnError, RawItem,
};

// 模式层
pub use schema::{FieldValue, RecordValue, SchemaBinder, TableRegistry, TableSchema};

// 仓储层
pub use repository::{RecordBinder, RepositoryError, RepositoryResult, UpsertResolver};

// 导入层
pub use importer::{
    BatchRunner, CsvParser, ExcelParser, FileParser, ImportError, Importer, ImportResult,
    ImportSession, UniversalFileParser,
};

// 配置
pub use config::{ConfigError, ImportConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "同位素年代学实验室数据导入引擎";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
