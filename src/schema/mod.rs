// ==========================================
// 同位素年代学实验室数据导入引擎 - 模式层
// ==========================================
// 职责: 连接数据库, 运行期反射表结构, 提供可寻址的表注册中心
// 约束: 不要求调用方静态声明任何表结构
// ==========================================

pub mod binder;
pub mod record;
pub mod registry;

// 重导出核心类型
pub use binder::SchemaBinder;
pub use record::{FieldValue, RecordValue};
pub use registry::{ColumnSchema, RelationshipSchema, TableRegistry, TableSchema};
