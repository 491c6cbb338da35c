// ==========================================
// 同位素年代学实验室数据导入引擎 - 导入会话
// ==========================================
// 职责: 持有事务边界。逐条目: 委托导入器提取 → 经
//       RecordBinder/UpsertResolver 暂存归一化行 → 整体提交
// 约束: 条目级原子性 —— 中途任何失败回滚该条目全部暂存,
//       数据库对该条目保持不变
// ==========================================

use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::types::{ImportSummary, NormalizedTable, RawItem};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::Importer;
use crate::repository::error::RepositoryError;
use crate::repository::record_binder::RecordBinder;
use crate::schema::binder::SchemaBinder;

/// 导入会话
///
/// 共享模式绑定器持有的唯一连接; 不得跨并发批次使用
pub struct ImportSession<'a> {
    binder: &'a SchemaBinder,
}

impl<'a> ImportSession<'a> {
    pub fn new(binder: &'a SchemaBinder) -> Self {
        Self { binder }
    }

    /// 导入一个顶层条目（一个文件 / 一条 data_file 行）
    ///
    /// # 流程
    /// 1. 提取: 导入器将原始条目转为归一化表（失败即整条目失败）
    /// 2. 暂存: 逐记录组调用实体绑定器（样品/会话/分析步/数据点）
    /// 3. 提交: 单事务整体提交; 任何失败整体回滚
    ///
    /// # 返回
    /// - Ok(ImportSummary): 条目落库汇总
    /// - Err(ImportError): 提取或数据完整性错误（已归一分类）
    pub fn import_item(
        &self,
        importer: &dyn Importer,
        item: &RawItem,
    ) -> ImportResult<ImportSummary> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let identifier = item.identifier();
        info!(batch_id = %batch_id, item = %identifier, "开始导入条目");

        // === 步骤 1: 提取 ===
        let table = importer.extract(item)?;
        info!(
            sample_id = %table.sample_id,
            rows = table.rows.len(),
            "提取完成"
        );

        // === 步骤 2: 单事务暂存 ===
        let conn = self.binder.connection();
        let mut conn = conn
            .lock()
            .map_err(|e| ImportError::from(RepositoryError::LockError(e.to_string())))?;
        let tx = conn
            .transaction()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        // 失败路径上 tx 随 `?` 提前返回被丢弃 → 自动回滚
        let (session_id, analyses, data_points) = {
            let record_binder = RecordBinder::new(&tx, self.binder.registry());
            self.persist(&record_binder, importer, &table, item)?
        };

        // === 步骤 3: 提交 ===
        tx.commit()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            sample_id = %table.sample_id,
            session_id = session_id,
            analyses = analyses,
            data_points = data_points,
            elapsed_ms = elapsed_ms,
            "条目导入完成"
        );

        Ok(ImportSummary {
            batch_id,
            item: identifier,
            sample_id: table.sample_id,
            session_id,
            analyses,
            data_points,
            elapsed_ms,
        })
    }

    /// 暂存一张归一化表（在调用方事务内）
    fn persist(
        &self,
        rb: &RecordBinder<'_>,
        importer: &dyn Importer,
        table: &NormalizedTable,
        item: &RawItem,
    ) -> ImportResult<(i64, usize, usize)> {
        let authority = importer.authority();

        // === 样品与会话 ===
        if let Some(project_id) = &table.project_id {
            rb.project(project_id)?;
        }
        rb.sample(&table.sample_id, table.project_id.as_deref())?;

        let instrument_id = match &table.instrument {
            Some(name) => {
                let record = rb.instrument(name)?;
                Some(record.id().ok_or_else(|| {
                    ImportError::InternalError(format!("仪器 {} 无代理键", name))
                })?)
            }
            None => None,
        };
        if let Some(technique) = &table.technique {
            rb.method(technique)?;
        }
        if let Some(target) = &table.target {
            rb.material(target)?;
        }

        let session = rb.session(
            &table.sample_id,
            &table.date,
            instrument_id,
            table.technique.as_deref(),
            table.target.as_deref(),
            Some(table.metadata.clone()),
        )?;
        let session_id = session
            .id()
            .ok_or_else(|| ImportError::InternalError("会话无代理键".to_string()))?;

        // === 数据文件登记 ===
        let data_file_id = match item {
            RawItem::File(path) => {
                let basename = path.file_name().and_then(|n| n.to_str());
                let record = rb.data_file(
                    &path.display().to_string(),
                    basename,
                    Some(table.date.as_str()),
                )?;
                record.id()
            }
            RawItem::StoredFile { id, .. } => Some(*id),
        };
        if let Some(data_file_id) = data_file_id {
            rb.data_file_link(data_file_id, Some(session_id), Some(&table.sample_id))?;
        }

        // === 分析步与数据点 ===
        let mut data_points = 0usize;
        for row in &table.rows {
            let mut analysis = rb.analysis(session_id, row.session_index, row.step_id.as_deref())?;
            rb.refresh_analysis_flags(&mut analysis, false, row.in_plateau)?;
            let analysis_id = analysis
                .id()
                .ok_or_else(|| ImportError::InternalError("分析步无代理键".to_string()))?;

            let specs = importer.classify_row(table, row)?;
            debug!(
                session_index = row.session_index,
                specs = specs.len(),
                "分析步分类完成"
            );

            for spec in specs {
                // 词表条目按需惰性创建
                let description = table
                    .column(&spec.parameter)
                    .and_then(|meta| meta.description.as_deref());
                rb.parameter(&spec.parameter, description, Some(authority))?;
                rb.unit(&spec.unit, Some(authority))?;
                if let Some(error_unit) = &spec.error_unit {
                    rb.unit(error_unit, Some(authority))?;
                }
                let error_metric_id = match &spec.error_metric {
                    Some(label) => {
                        let record = rb.error_metric(label)?;
                        record.id_text().map(str::to_string)
                    }
                    None => None,
                };

                let datum_type = rb.datum_type(
                    &spec.parameter,
                    &spec.unit,
                    spec.error_unit.as_deref(),
                    error_metric_id.as_deref(),
                    spec.is_computed,
                    spec.is_interpreted,
                )?;
                let type_id = datum_type
                    .id()
                    .ok_or_else(|| ImportError::InternalError("数据类型无代理键".to_string()))?;

                rb.datum(analysis_id, type_id, spec.value, spec.error, spec.is_accepted)?;
                data_points += 1;
            }
        }

        if table.rows.is_empty() {
            error!(sample_id = %table.sample_id, "归一化表无数据行");
        }

        Ok((session_id, table.rows.len(), data_points))
    }
}
