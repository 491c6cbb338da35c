// ==========================================
// 同位素年代学实验室数据导入引擎 - 导入层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 提取错误与数据完整性错误在导入边界统一为本类型,
//       批处理只需面对一种失败
// ==========================================

use thiserror::Error;

use crate::repository::error::RepositoryError;

/// 导入层错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 提取错误（可归因到单个条目, 不产生部分结果） =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("必填字段缺失: {0}")]
    MissingField(String),

    #[error("必填列数值缺失 (行 {row}, 列 {column})")]
    RequiredValueMissing { row: i64, column: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: i64,
        field: String,
        message: String,
    },

    // ===== 数据完整性错误（落库阶段, 整条目回滚） =====
    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据层错误: {0}")]
    DataLayer(#[source] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否属于提取阶段错误（相对数据完整性错误）
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::MissingField(_)
                | ImportError::RequiredValueMissing { .. }
                | ImportError::TypeConversionError { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::from(RepositoryError::from(err))
    }
}

// 数据层错误在导入边界归一: 约束类错误保留分类, 其余携带原因
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => {
                ImportError::UniqueConstraintViolation(msg)
            }
            RepositoryError::ForeignKeyViolation(msg) => ImportError::ForeignKeyViolation(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ImportError::DatabaseTransactionError(msg)
            }
            other => ImportError::DataLayer(other),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ImportError::FileNotFound("x".to_string()).is_extraction());
        assert!(ImportError::RequiredValueMissing {
            row: 1,
            column: "Age".to_string()
        }
        .is_extraction());
        assert!(!ImportError::UniqueConstraintViolation("u".to_string()).is_extraction());
    }

    #[test]
    fn test_repository_error_normalized() {
        let err = ImportError::from(RepositoryError::ForeignKeyViolation("fk".to_string()));
        assert!(matches!(err, ImportError::ForeignKeyViolation(_)));
        let err = ImportError::from(RepositoryError::UnknownTable("t".to_string()));
        assert!(matches!(err, ImportError::DataLayer(_)));
    }
}
