// ==========================================
// 同位素年代学实验室数据导入引擎 - 配置层
// ==========================================
// 职责: 系统配置管理, 环境变量覆写
// 来源: 环境变量 (GEOLAB_*)
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{ConfigError, ImportConfig};
