// ==========================================
// 同位素年代学实验室数据导入引擎 - 导入层
// ==========================================
// 组成: 错误分类 / 文件解析器 / 导入器接口 /
//       事务化导入会话 / 故障隔离批处理
// ==========================================

pub mod batch;
pub mod error;
pub mod file_parser;
pub mod importer_trait;
pub mod session;

// 重导出常用类型
pub use batch::BatchRunner;
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use importer_trait::{approx_eq, FileParser, Importer};
pub use session::ImportSession;
