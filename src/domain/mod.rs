// ==========================================
// 同位素年代学实验室数据导入引擎 - 领域层
// ==========================================
// 职责: 导入管道的中间结构与结果类型
// ==========================================

pub mod types;

// 重导出核心类型
pub use types::{
    BatchOutcome, ColumnMeta, ColumnRole, DatumSpec, ImportSummary, ItemOutcome, NormalizedRow,
    NormalizedTable, OnError, RawItem,
};
