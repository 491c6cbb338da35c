// ==========================================
// 同位素年代学实验室数据导入引擎 - 领域类型
// ==========================================
// 职责: 导入管道各阶段传递的中间结构
// ==========================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 批处理的原始输入条目
///
/// - File: 文件系统路径（实验室输出文件）
/// - StoredFile: 已落库的 data_file 行（重导入场景）
#[derive(Debug, Clone)]
pub enum RawItem {
    File(PathBuf),
    StoredFile { id: i64, file_path: String },
}

impl RawItem {
    /// 用于批处理报告的条目标识
    pub fn identifier(&self) -> String {
        match self {
            RawItem::File(path) => path.display().to_string(),
            RawItem::StoredFile { file_path, .. } => file_path.clone(),
        }
    }
}

/// 列在归一化表中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// 测量列: 产生数据点
    Measurement,
    /// 误差伴随列: 不单独产生数据点, 挂到宿主列上
    ErrorSidecar,
    /// 参照列: 仅用于 is_accepted 判定 (如 best_age)
    Reference,
}

/// 列元数据: 解析 Parameter/Unit 词表所需的单位与标注
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub role: ColumnRole,
    /// NaN / 缺失即判定提取失败
    pub required: bool,
    /// 误差伴随列列名 (如 "Age" → "± 2s")
    pub error_column: Option<String>,
    /// 误差度量标签 (如 "2s")
    pub error_metric: Option<String>,
    /// 年龄类参数: 落库时标记 is_interpreted
    pub is_age: bool,
}

impl ColumnMeta {
    /// 普通测量列的简便构造
    pub fn measurement(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: Some(unit.to_string()),
            description: None,
            role: ColumnRole::Measurement,
            required: false,
            error_column: None,
            error_metric: None,
            is_age: false,
        }
    }
}

/// 归一化后的单行测量（一个分析步）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// 会话内序号（分析步自然键成员）
    pub session_index: i64,
    pub step_id: Option<String>,
    pub in_plateau: Option<bool>,
    /// (列名, 数值) 对, 保持输入列序
    pub values: Vec<(String, f64)>,
}

impl NormalizedRow {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value)
    }
}

/// 归一化后的表: 一个输入条目 = 一个样品 + 一个会话 + N 个分析步
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub sample_id: String,
    pub project_id: Option<String>,
    /// 会话日期（ISO 文本, 通常为文件修改时间）
    pub date: String,
    pub instrument: Option<String>,
    pub technique: Option<String>,
    pub target: Option<String>,
    /// 会话级结构化元数据
    pub metadata: serde_json::Value,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// 一个数据点的落库描述 (classify_row 的输出)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumSpec {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub error: Option<f64>,
    pub error_unit: Option<String>,
    pub error_metric: Option<String>,
    pub is_computed: bool,
    pub is_interpreted: bool,
    pub is_accepted: Option<bool>,
}

/// 单条目导入结果汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch_id: String,
    pub item: String,
    pub sample_id: String,
    pub session_id: i64,
    pub analyses: usize,
    pub data_points: usize,
    pub elapsed_ms: u64,
}

/// 批处理失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// 首个失败立即上抛, 中止批次
    Raise,
    /// 记录失败并继续处理后续条目
    Continue,
}

/// 单条目处理结局
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Success(ImportSummary),
    Failed(String),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }
}

/// 批处理逐条目结局 (条目标识, 结局)
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub identifier: String,
    pub outcome: ItemOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_item_identifier() {
        let file = RawItem::File(PathBuf::from("/data/a.xls"));
        assert_eq!(file.identifier(), "/data/a.xls");

        let stored = RawItem::StoredFile {
            id: 3,
            file_path: "b.csv".to_string(),
        };
        assert_eq!(stored.identifier(), "b.csv");
    }

    #[test]
    fn test_row_get() {
        let row = NormalizedRow {
            session_index: 0,
            step_id: None,
            in_plateau: None,
            values: vec![("Tstep".to_string(), 850.0)],
        };
        assert_eq!(row.get("Tstep"), Some(850.0));
        assert_eq!(row.get("Age"), None);
    }
}
