// ==========================================
// 同位素年代学实验室数据导入引擎 - 批处理循环
// ==========================================
// 职责: 按输入顺序逐条目驱动导入会话, 提供故障隔离
// 策略: Continue 模式下单条目失败不中断批次, 记录后继续;
//       Raise 模式下立即向上传播
// ==========================================

use std::time::Instant;

use tracing::{error, info, warn};

use crate::domain::types::{BatchOutcome, ItemOutcome, OnError, RawItem};
use crate::importer::error::ImportResult;
use crate::importer::importer_trait::Importer;
use crate::importer::session::ImportSession;
use crate::schema::binder::SchemaBinder;

/// 批处理执行器
pub struct BatchRunner<'a> {
    binder: &'a SchemaBinder,
}

impl<'a> BatchRunner<'a> {
    pub fn new(binder: &'a SchemaBinder) -> Self {
        Self { binder }
    }

    /// 按输入顺序导入一批条目
    ///
    /// # 参数
    /// - importer: 本批次使用的实验室格式导入器
    /// - items: 待导入条目, 严格按给定顺序处理
    /// - on_error: 失败策略 (Continue 隔离 / Raise 立即传播)
    ///
    /// # 返回
    /// - Ok(Vec<BatchOutcome>): 逐条目结果, 顺序与输入一致
    /// - Err(ImportError): 仅 Raise 模式下首个失败
    pub fn run(
        &self,
        importer: &dyn Importer,
        items: &[RawItem],
        on_error: OnError,
    ) -> ImportResult<Vec<BatchOutcome>> {
        let start_time = Instant::now();
        info!(total = items.len(), "开始批量导入");

        let session = ImportSession::new(self.binder);
        let mut outcomes = Vec::with_capacity(items.len());
        let mut failed = 0usize;

        for item in items {
            let identifier = item.identifier();
            match session.import_item(importer, item) {
                Ok(summary) => {
                    outcomes.push(BatchOutcome {
                        identifier,
                        outcome: ItemOutcome::Success(summary),
                    });
                }
                Err(e) if on_error == OnError::Raise => {
                    error!(item = %identifier, error = %e, "条目导入失败, 中止批次");
                    return Err(e);
                }
                Err(e) => {
                    // 故障隔离: 该条目已整体回滚, 批次继续
                    warn!(item = %identifier, error = %e, "条目导入失败, 跳过");
                    failed += 1;
                    outcomes.push(BatchOutcome {
                        identifier,
                        outcome: ItemOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        info!(
            total = items.len(),
            succeeded = items.len() - failed,
            failed = failed,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "批量导入完成"
        );
        Ok(outcomes)
    }
}
