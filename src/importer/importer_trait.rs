// ==========================================
// 同位素年代学实验室数据导入引擎 - 导入器接口
// ==========================================
// 职责: 定义格式多态的导入器能力（各实验室格式为可插拔策略）
// 说明: classify_row 提供共享默认规则, 具体实验室导入器可覆写
// ==========================================

use std::path::Path;

use crate::domain::types::{ColumnRole, DatumSpec, NormalizedRow, NormalizedTable, RawItem};
use crate::importer::error::{ImportError, ImportResult};

/// is_accepted 判定的相对容差（对齐 numpy.allclose 默认值）
pub const ACCEPTED_RTOL: f64 = 1e-5;

/// is_accepted 判定的绝对容差
pub const ACCEPTED_ATOL: f64 = 1e-8;

/// 浮点近似相等: |a - b| <= atol + rtol * |b|
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= ACCEPTED_ATOL + ACCEPTED_RTOL * b.abs()
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（提取阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser {
    /// 解析文件为原始行记录（HashMap<列名, 值>）
    ///
    /// # 返回
    /// - Ok(Vec<HashMap<String, String>>): 行记录列表
    /// - Err(ImportError): 文件读取错误、格式错误
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> ImportResult<Vec<std::collections::HashMap<String, String>>>;
}

// ==========================================
// Importer Trait
// ==========================================
// 用途: 格式多态的导入主接口
// 实现者: 各实验室格式导入器（外部插件）
pub trait Importer {
    /// 词表条目的来源标识 (如 "WiscAr")
    fn authority(&self) -> &str;

    /// 将一个原始条目提取为归一化表
    ///
    /// # 参数
    /// - item: 文件路径或已落库的 data_file 行
    ///
    /// # 返回
    /// - Ok(NormalizedTable): 行 + 逐列单位/标注元数据
    /// - Err(ImportError): 提取失败（整条目失败, 无部分结果）
    fn extract(&self, item: &RawItem) -> ImportResult<NormalizedTable>;

    /// 将一行归一化数据转换为零或多个数据点描述
    ///
    /// # 默认规则
    /// - 误差伴随列与参照列不单独产生数据点
    /// - 非必填列的 NaN 静默跳过; 必填列的 NaN/缺失判定提取失败
    /// - 单位取自列元数据; 误差取伴随列数值, 单位缺省同宿主列
    /// - 年龄类参数标记 is_interpreted, 并按参照列近似相等判定 is_accepted
    fn classify_row(
        &self,
        table: &NormalizedTable,
        row: &NormalizedRow,
    ) -> ImportResult<Vec<DatumSpec>> {
        // 参照列 (如 best_age) 先行取值, NaN 视为缺失
        let reference = table
            .columns
            .iter()
            .find(|c| c.role == ColumnRole::Reference)
            .and_then(|c| row.get(&c.name))
            .filter(|v| !v.is_nan());

        // 必填列必须在行中出现
        for meta in &table.columns {
            if meta.required && meta.role == ColumnRole::Measurement && row.get(&meta.name).is_none()
            {
                return Err(ImportError::RequiredValueMissing {
                    row: row.session_index,
                    column: meta.name.clone(),
                });
            }
        }

        let mut specs = Vec::new();
        for (column, value) in &row.values {
            let Some(meta) = table.column(column) else {
                // 无元数据的列不产生数据点
                continue;
            };
            match meta.role {
                ColumnRole::ErrorSidecar | ColumnRole::Reference => continue,
                ColumnRole::Measurement => {}
            }

            if value.is_nan() {
                if meta.required {
                    return Err(ImportError::RequiredValueMissing {
                        row: row.session_index,
                        column: column.clone(),
                    });
                }
                continue;
            }

            let unit = meta.unit.clone().ok_or_else(|| {
                ImportError::MissingField(format!("列 {} 缺少单位标注", column))
            })?;

            let mut error = None;
            let mut error_unit = None;
            let mut error_metric = None;
            if let Some(error_column) = &meta.error_column {
                if let Some(e) = row.get(error_column).filter(|e| !e.is_nan()) {
                    error = Some(e);
                    let sidecar_meta = table.column(error_column);
                    error_unit = sidecar_meta
                        .and_then(|m| m.unit.clone())
                        .or_else(|| Some(unit.clone()));
                    error_metric = meta
                        .error_metric
                        .clone()
                        .or_else(|| sidecar_meta.and_then(|m| m.error_metric.clone()));
                }
            }

            let is_accepted = if meta.is_age {
                reference.map(|r| approx_eq(*value, r))
            } else {
                None
            };

            specs.push(DatumSpec {
                parameter: column.clone(),
                value: *value,
                unit,
                error,
                error_unit,
                error_metric,
                is_computed: false,
                is_interpreted: meta.is_age,
                is_accepted,
            });
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ColumnMeta;
    use serde_json::json;

    struct TestImporter;

    impl Importer for TestImporter {
        fn authority(&self) -> &str {
            "Test"
        }

        fn extract(&self, _item: &RawItem) -> ImportResult<NormalizedTable> {
            unimplemented!("仅测试 classify_row 默认规则")
        }
    }

    fn heating_step_table() -> NormalizedTable {
        NormalizedTable {
            sample_id: "S1".to_string(),
            project_id: None,
            date: "2024-06-01 10:00:00".to_string(),
            instrument: None,
            technique: None,
            target: None,
            metadata: json!({}),
            columns: vec![
                ColumnMeta {
                    name: "Tstep".to_string(),
                    unit: Some("°C".to_string()),
                    description: Some("Temperature of heating step".to_string()),
                    role: ColumnRole::Measurement,
                    required: true,
                    error_column: None,
                    error_metric: None,
                    is_age: false,
                },
                ColumnMeta::measurement("36Ar(a)", "V"),
                ColumnMeta {
                    name: "Age".to_string(),
                    unit: Some("Ma".to_string()),
                    description: None,
                    role: ColumnRole::Measurement,
                    required: false,
                    error_column: Some("± 2s".to_string()),
                    error_metric: Some("2s".to_string()),
                    is_age: true,
                },
                ColumnMeta {
                    name: "± 2s".to_string(),
                    unit: Some("Ma".to_string()),
                    description: None,
                    role: ColumnRole::ErrorSidecar,
                    required: false,
                    error_column: None,
                    error_metric: Some("2s".to_string()),
                    is_age: false,
                },
                ColumnMeta {
                    name: "best_age".to_string(),
                    unit: Some("Ma".to_string()),
                    description: None,
                    role: ColumnRole::Reference,
                    required: false,
                    error_column: None,
                    error_metric: None,
                    is_age: false,
                },
            ],
            rows: vec![],
        }
    }

    fn row(values: Vec<(&str, f64)>) -> NormalizedRow {
        NormalizedRow {
            session_index: 0,
            step_id: None,
            in_plateau: None,
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    #[test]
    fn test_classify_scenario_row() {
        // 场景: {temperature: 850, 36Ar(a): 0.002, Age: 10.5, ± 2s: 0.3}
        let table = heating_step_table();
        let importer = TestImporter;
        let specs = importer
            .classify_row(
                &table,
                &row(vec![
                    ("Tstep", 850.0),
                    ("36Ar(a)", 0.002),
                    ("Age", 10.5),
                    ("± 2s", 0.3),
                ]),
            )
            .expect("classify");

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].parameter, "Tstep");
        assert_eq!(specs[0].value, 850.0);
        assert_eq!(specs[0].unit, "°C");

        assert_eq!(specs[1].parameter, "36Ar(a)");
        assert_eq!(specs[1].unit, "V");

        assert_eq!(specs[2].parameter, "Age");
        assert_eq!(specs[2].unit, "Ma");
        assert_eq!(specs[2].error, Some(0.3));
        assert_eq!(specs[2].error_unit.as_deref(), Some("Ma"));
        assert_eq!(specs[2].error_metric.as_deref(), Some("2s"));
        assert!(specs[2].is_interpreted);
    }

    #[test]
    fn test_nan_optional_column_skipped() {
        let table = heating_step_table();
        let importer = TestImporter;
        let specs = importer
            .classify_row(
                &table,
                &row(vec![("Tstep", 850.0), ("36Ar(a)", f64::NAN)]),
            )
            .expect("classify");
        // NaN 的非必填列静默跳过
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].parameter, "Tstep");
    }

    #[test]
    fn test_nan_required_column_rejected() {
        let table = heating_step_table();
        let importer = TestImporter;
        let err = importer
            .classify_row(&table, &row(vec![("Tstep", f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, ImportError::RequiredValueMissing { .. }));
    }

    #[test]
    fn test_missing_required_column_rejected() {
        let table = heating_step_table();
        let importer = TestImporter;
        let err = importer
            .classify_row(&table, &row(vec![("36Ar(a)", 0.002)]))
            .unwrap_err();
        assert!(matches!(err, ImportError::RequiredValueMissing { .. }));
    }

    #[test]
    fn test_is_accepted_against_reference() {
        let table = heating_step_table();
        let importer = TestImporter;
        let specs = importer
            .classify_row(
                &table,
                &row(vec![
                    ("Tstep", 850.0),
                    ("Age", 10.5),
                    ("best_age", 10.5),
                ]),
            )
            .expect("classify");
        let age = specs.iter().find(|s| s.parameter == "Age").expect("age");
        assert_eq!(age.is_accepted, Some(true));

        let specs = importer
            .classify_row(
                &table,
                &row(vec![
                    ("Tstep", 850.0),
                    ("Age", 10.5),
                    ("best_age", 99.0),
                ]),
            )
            .expect("classify");
        let age = specs.iter().find(|s| s.parameter == "Age").expect("age");
        assert_eq!(age.is_accepted, Some(false));
    }

    #[test]
    fn test_approx_eq_tolerance() {
        assert!(approx_eq(10.5, 10.5));
        assert!(approx_eq(10.5, 10.5 + 1e-7));
        assert!(!approx_eq(10.5, 10.6));
    }
}
