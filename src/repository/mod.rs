// ==========================================
// 同位素年代学实验室数据导入引擎 - 数据层
// ==========================================
// 红线: 数据层不含业务逻辑
// 约束: 所有查询使用参数化; 动态拼接的表名/列名
//       必须先经注册中心校验
// ==========================================

pub mod error;
pub mod record_binder;
pub mod upsert;

// 重导出核心类型
pub use error::{RepositoryError, RepositoryResult};
pub use record_binder::RecordBinder;
pub use upsert::UpsertResolver;
