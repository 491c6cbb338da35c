// ==========================================
// 同位素年代学实验室数据导入引擎 - 命令行入口
// ==========================================
// 用法:
//   geolab-import init
//   geolab-import import [--stop-on-error]
// 配置: GEOLAB_DATABASE / GEOLAB_DATA_DIR / GEOLAB_INIT_SQL
// ==========================================

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use geolab_import::domain::types::{
    ColumnMeta, ColumnRole, ItemOutcome, NormalizedRow, NormalizedTable, OnError, RawItem,
};
use geolab_import::importer::error::{ImportError, ImportResult};
use geolab_import::importer::file_parser::UniversalFileParser;
use geolab_import::importer::importer_trait::Importer;
use geolab_import::importer::BatchRunner;
use geolab_import::config::ImportConfig;
use geolab_import::schema::SchemaBinder;

// ==========================================
// 内置导入器: 阶段加热表格 (CSV/Excel)
// ==========================================
// 约定:
// - 文件名主干 = 样品 id; 会话日期 = 文件修改时间
// - 表头 "name [unit]" 标注单位
// - 含 "±" 的列是误差伴随列: "Age ± 2s [Ma]" 挂到 "Age",
//   "±" 右侧文本为误差度量标签
// - "best_age" 列为参照列; 列名含 "age" 的列按年龄类参数处理
// - "step" 列作为分析步标识, 不产生数据点
struct StepHeatingImporter;

impl StepHeatingImporter {
    /// 解析表头 "Age [Ma]" → (列名, 单位)
    fn split_header(header: &str) -> (String, Option<String>) {
        if let (Some(open), true) = (header.find('['), header.ends_with(']')) {
            let name = header[..open].trim().to_string();
            let unit = header[open + 1..header.len() - 1].trim().to_string();
            if !name.is_empty() && !unit.is_empty() {
                return (name, Some(unit));
            }
        }
        (header.trim().to_string(), None)
    }

    fn build_columns(headers: &[String]) -> Vec<ColumnMeta> {
        let mut columns: Vec<ColumnMeta> = Vec::new();
        for header in headers {
            let (name, unit) = Self::split_header(header);
            if name.eq_ignore_ascii_case("step") {
                continue;
            }
            if let Some(pos) = name.find('±') {
                let metric = name[pos + '±'.len_utf8()..].trim().to_string();
                columns.push(ColumnMeta {
                    name,
                    unit,
                    description: None,
                    role: ColumnRole::ErrorSidecar,
                    required: false,
                    error_column: None,
                    error_metric: if metric.is_empty() { None } else { Some(metric) },
                    is_age: false,
                });
                continue;
            }
            let role = if name.eq_ignore_ascii_case("best_age") {
                ColumnRole::Reference
            } else {
                ColumnRole::Measurement
            };
            let is_age =
                role == ColumnRole::Measurement && name.to_ascii_lowercase().contains("age");
            columns.push(ColumnMeta {
                name,
                unit,
                description: None,
                role,
                required: false,
                error_column: None,
                error_metric: None,
                is_age,
            });
        }

        // 按 "Host ± metric" 命名把伴随列挂回宿主测量列
        let sidecars: Vec<(String, Option<String>)> = columns
            .iter()
            .filter(|c| c.role == ColumnRole::ErrorSidecar)
            .map(|c| (c.name.clone(), c.error_metric.clone()))
            .collect();
        for (sidecar_name, metric) in sidecars {
            let host_name = sidecar_name
                .split('±')
                .next()
                .map(str::trim)
                .unwrap_or("")
                .to_string();
            if host_name.is_empty() {
                continue;
            }
            if let Some(host) = columns
                .iter_mut()
                .find(|c| c.role == ColumnRole::Measurement && c.name == host_name)
            {
                host.error_column = Some(sidecar_name);
                host.error_metric = metric;
            }
        }
        columns
    }
}

impl Importer for StepHeatingImporter {
    fn authority(&self) -> &str {
        "GeoLab"
    }

    fn extract(&self, item: &RawItem) -> ImportResult<NormalizedTable> {
        let path = match item {
            RawItem::File(path) => path.clone(),
            RawItem::StoredFile { file_path, .. } => PathBuf::from(file_path),
        };
        let sample_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ImportError::FileNotFound(path.display().to_string()))?
            .to_string();
        let date = file_mtime(&path)?;

        let records = UniversalFileParser.parse(&path)?;
        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        headers.sort();
        let columns = Self::build_columns(&headers);

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let step_id = record
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("step"))
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty());
            let mut values = Vec::new();
            for (header, raw) in record {
                let (name, _) = Self::split_header(header);
                if name.eq_ignore_ascii_case("step") {
                    continue;
                }
                // 空白单元格按 NaN 交由分类规则处理
                let value = if raw.is_empty() {
                    f64::NAN
                } else {
                    raw.parse::<f64>()
                        .map_err(|e| ImportError::TypeConversionError {
                            row: index as i64,
                            field: name.clone(),
                            message: e.to_string(),
                        })?
                };
                values.push((name, value));
            }
            rows.push(NormalizedRow {
                session_index: index as i64,
                step_id,
                in_plateau: None,
                values,
            });
        }

        Ok(NormalizedTable {
            sample_id,
            project_id: None,
            date,
            instrument: None,
            technique: Some("Ar/Ar 阶段加热".to_string()),
            target: None,
            metadata: serde_json::json!({
                "source": path.display().to_string(),
            }),
            columns,
            rows,
        })
    }
}

/// 文件修改时间, ISO 文本（会话自然键成员）
fn file_mtime(path: &Path) -> ImportResult<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    let stamp: DateTime<Utc> = modified.into();
    Ok(stamp.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// 枚举数据目录下支持的仪器输出文件（字典序, 保证批次顺序确定）
fn collect_items(data_dir: &Path) -> ImportResult<Vec<RawItem>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if matches!(ext.as_str(), "csv" | "xlsx" | "xls") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths.into_iter().map(RawItem::File).collect())
}

fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "help".to_string());
    let stop_on_error = args.any(|a| a == "--stop-on-error");

    let config = ImportConfig::from_env();

    match command.as_str() {
        "init" => {
            let mut binder = SchemaBinder::connect(&config.database)?;
            binder.initialize(&config.init_sql)?;
            info!(
                database = %config.database,
                tables = binder.registry().len(),
                "数据库初始化完成"
            );
            Ok(true)
        }
        "import" => {
            let data_dir = config.require_data_dir()?;
            let items = collect_items(&data_dir)?;
            if items.is_empty() {
                warn!(data_dir = %data_dir.display(), "数据目录无可导入文件");
                return Ok(true);
            }

            let mut binder = SchemaBinder::connect(&config.database)?;
            binder.initialize(&config.init_sql)?;

            let on_error = if stop_on_error {
                OnError::Raise
            } else {
                OnError::Continue
            };
            let runner = BatchRunner::new(&binder);
            let outcomes = runner.run(&StepHeatingImporter, &items, on_error)?;

            for outcome in &outcomes {
                match &outcome.outcome {
                    ItemOutcome::Success(summary) => println!(
                        "ok   {} sample={} session={} analyses={} data={}",
                        outcome.identifier,
                        summary.sample_id,
                        summary.session_id,
                        summary.analyses,
                        summary.data_points
                    ),
                    ItemOutcome::Failed(message) => {
                        println!("fail {} {}", outcome.identifier, message)
                    }
                }
            }
            Ok(outcomes.iter().all(|o| o.outcome.is_success()))
        }
        _ => {
            eprintln!("用法: geolab-import <init|import> [--stop-on-error]");
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    geolab_import::logging::init();

    info!("==================================================");
    info!("{}", geolab_import::APP_NAME);
    info!("系统版本: {}", geolab_import::VERSION);
    info!("==================================================");

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "运行失败");
            ExitCode::FAILURE
        }
    }
}
