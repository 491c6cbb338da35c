// ==========================================
// 同位素年代学实验室数据导入引擎 - 配置管理器
// ==========================================
// 职责: 读取环境变量配置, 启动期校验
// 约束: 必填项缺失属于致命错误, 在处理任何条目之前中止
// ==========================================

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// 数据库路径环境变量
pub const ENV_DATABASE: &str = "GEOLAB_DATABASE";

/// 数据目录环境变量（CLI 扫描导入文件用）
pub const ENV_DATA_DIR: &str = "GEOLAB_DATA_DIR";

/// 扩展建库脚本环境变量（分号分隔的 SQL 文件路径列表）
pub const ENV_INIT_SQL: &str = "GEOLAB_INIT_SQL";

/// 默认数据库路径
pub const DEFAULT_DATABASE: &str = "geolab.db";

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("缺少必需的环境变量: {0}")]
    MissingVariable(String),

    #[error("目录不存在或不可读: {0}")]
    InvalidDirectory(String),
}

/// 导入引擎配置
///
/// 说明：
/// - database: 数据库连接描述符（SQLite 路径），可被 GEOLAB_DATABASE 覆写
/// - data_dir: 导入文件根目录，仅 CLI import 子命令必需
/// - init_sql: 核心建库脚本之后追加执行的扩展脚本
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database: String,
    pub data_dir: Option<PathBuf>,
    pub init_sql: Vec<PathBuf>,
}

impl ImportConfig {
    /// 从环境变量读取配置
    ///
    /// # 返回
    /// - Ok(ImportConfig): 读取成功（data_dir 缺失不在此处报错）
    pub fn from_env() -> Self {
        let database = env::var(ENV_DATABASE).unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        let data_dir = env::var(ENV_DATA_DIR).ok().map(PathBuf::from);

        let init_sql = env::var(ENV_INIT_SQL)
            .ok()
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            database,
            data_dir,
            init_sql,
        }
    }

    /// 校验并返回数据目录（import 子命令的启动期检查）
    ///
    /// # 返回
    /// - Ok(PathBuf): 目录存在
    /// - Err(ConfigError): 变量缺失或目录无效, 调用方应立即中止
    pub fn require_data_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self
            .data_dir
            .clone()
            .ok_or_else(|| ConfigError::MissingVariable(ENV_DATA_DIR.to_string()))?;
        if !dir.is_dir() {
            return Err(ConfigError::InvalidDirectory(dir.display().to_string()));
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_data_dir_missing() {
        let cfg = ImportConfig {
            database: DEFAULT_DATABASE.to_string(),
            data_dir: None,
            init_sql: vec![],
        };
        let err = cfg.require_data_dir().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(_)));
    }

    #[test]
    fn test_require_data_dir_invalid() {
        let cfg = ImportConfig {
            database: DEFAULT_DATABASE.to_string(),
            data_dir: Some(PathBuf::from("/no/such/dir/geolab")),
            init_sql: vec![],
        };
        let err = cfg.require_data_dir().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDirectory(_)));
    }

    #[test]
    fn test_require_data_dir_ok() {
        let tmp = tempfile::tempdir().expect("Failed to create tempdir");
        let cfg = ImportConfig {
            database: DEFAULT_DATABASE.to_string(),
            data_dir: Some(tmp.path().to_path_buf()),
            init_sql: vec![],
        };
        assert!(cfg.require_data_dir().is_ok());
    }
}
