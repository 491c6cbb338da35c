// ==========================================
// 同位素年代学实验室数据导入引擎 - 实体记录绑定器
// ==========================================
// 职责: 每类实体一个薄访问器, 固化该实体的自然键字段集,
//       委托 UpsertResolver 在当前工作单元内暂存记录
// 红线: 访问器不做业务校验, 校验是导入器在调用前的责任
// ==========================================

use rusqlite::Transaction;

use crate::repository::error::RepositoryResult;
use crate::repository::upsert::UpsertResolver;
use crate::schema::record::{FieldValue, RecordValue};
use crate::schema::registry::TableRegistry;

/// 实体记录绑定器
///
/// 生命周期绑定到一个未提交事务: 所有暂存行随事务一起提交或回滚
pub struct RecordBinder<'a> {
    tx: &'a Transaction<'a>,
    registry: &'a TableRegistry,
}

impl<'a> RecordBinder<'a> {
    pub fn new(tx: &'a Transaction<'a>, registry: &'a TableRegistry) -> Self {
        Self { tx, registry }
    }

    /// 项目: 自然键 = id, 默认 title = id
    pub fn project(&self, id: &str) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("project")?;
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[("id", FieldValue::from(id))],
            &[("title", FieldValue::from(id))],
        )
    }

    /// 样品: 自然键 = id; 再次导入时刷新项目归属
    pub fn sample(&self, id: &str, project_id: Option<&str>) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("sample")?;
        let mut record =
            UpsertResolver::get_or_create(self.tx, table, &[("id", FieldValue::from(id))], &[])?;
        if let Some(project_id) = project_id {
            UpsertResolver::set_attributes(
                self.tx,
                table,
                &mut record,
                &[("project_id", FieldValue::from(project_id))],
            )?;
        }
        Ok(record)
    }

    /// 词表条目通用访问器（unit / parameter / material / method / error_metric）
    ///
    /// # 参数
    /// - table_name: 词表表名
    /// - id: 短标识串（自然键）
    /// - description / authority: 仅创建时写入的默认值
    pub fn vocabulary(
        &self,
        table_name: &str,
        id: &str,
        description: Option<&str>,
        authority: Option<&str>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require(table_name)?;
        let mut defaults = Vec::new();
        if let Some(description) = description {
            defaults.push(("description", FieldValue::from(description)));
        }
        if let Some(authority) = authority {
            defaults.push(("authority", FieldValue::from(authority)));
        }
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[("id", FieldValue::from(id))],
            &defaults,
        )
    }

    pub fn unit(&self, id: &str, authority: Option<&str>) -> RepositoryResult<RecordValue> {
        self.vocabulary("unit", id, None, authority)
    }

    pub fn parameter(
        &self,
        id: &str,
        description: Option<&str>,
        authority: Option<&str>,
    ) -> RepositoryResult<RecordValue> {
        self.vocabulary("parameter", id, description, authority)
    }

    pub fn material(&self, id: &str) -> RepositoryResult<RecordValue> {
        self.vocabulary("material", id, None, None)
    }

    pub fn method(&self, id: &str) -> RepositoryResult<RecordValue> {
        self.vocabulary("method", id, None, None)
    }

    /// 误差度量: 标签归一化 ("± 2s" → "2s"), 常见度量补全描述
    pub fn error_metric(&self, label: &str) -> RepositoryResult<RecordValue> {
        let id = label.replace("± ", "");
        let description = match id.as_str() {
            "1s" => Some("1 standard deviation"),
            "2s" => Some("2 standard deviations"),
            _ => None,
        };
        self.vocabulary("error_metric", &id, description, None)
    }

    /// 仪器: 自然键 = name（代理键 id 自动生成）
    pub fn instrument(&self, name: &str) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("instrument")?;
        UpsertResolver::get_or_create(self.tx, table, &[("name", FieldValue::from(name))], &[])
    }

    /// 测试会话: 自然键 = (sample_id, date, instrument, technique, target)
    ///
    /// # 说明
    /// - metadata 为结构化会话元数据, 不参与过滤;
    ///   命中既有会话时刷新该字段（再次导入更新元数据）
    #[allow(clippy::too_many_arguments)]
    pub fn session(
        &self,
        sample_id: &str,
        date: &str,
        instrument: Option<i64>,
        technique: Option<&str>,
        target: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("session")?;
        let keys = [
            ("sample_id", FieldValue::from(sample_id)),
            ("date", FieldValue::from(date)),
            ("instrument", FieldValue::opt_integer(instrument)),
            (
                "technique",
                FieldValue::opt_text(technique.map(str::to_string)),
            ),
            ("target", FieldValue::opt_text(target.map(str::to_string))),
        ];
        let mut record = UpsertResolver::get_or_create(self.tx, table, &keys, &[])?;
        if let Some(metadata) = metadata {
            UpsertResolver::set_attributes(
                self.tx,
                table,
                &mut record,
                &[("data", FieldValue::Json(metadata))],
            )?;
        }
        Ok(record)
    }

    /// 分析步: 自然键 = (session_id, session_index); step_id 仅创建时写入
    pub fn analysis(
        &self,
        session_id: i64,
        session_index: i64,
        step_id: Option<&str>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("analysis")?;
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[
                ("session_id", FieldValue::Integer(session_id)),
                ("session_index", FieldValue::Integer(session_index)),
            ],
            &[(
                "step_id",
                FieldValue::opt_text(step_id.map(str::to_string)),
            )],
        )
    }

    /// 刷新分析步解释标志
    pub fn refresh_analysis_flags(
        &self,
        record: &mut RecordValue,
        is_interpreted: bool,
        in_plateau: Option<bool>,
    ) -> RepositoryResult<()> {
        let table = self.registry.require("analysis")?;
        UpsertResolver::set_attributes(
            self.tx,
            table,
            record,
            &[
                ("is_interpreted", FieldValue::Boolean(is_interpreted)),
                (
                    "in_plateau",
                    match in_plateau {
                        Some(v) => FieldValue::Boolean(v),
                        None => FieldValue::Null,
                    },
                ),
            ],
        )
    }

    /// 数据类型: 自然键 = (parameter, unit, error_unit, error_metric,
    /// is_computed, is_interpreted), 为共享同一分类的数据点分组
    #[allow(clippy::too_many_arguments)]
    pub fn datum_type(
        &self,
        parameter: &str,
        unit: &str,
        error_unit: Option<&str>,
        error_metric: Option<&str>,
        is_computed: bool,
        is_interpreted: bool,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("datum_type")?;
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[
                ("parameter", FieldValue::from(parameter)),
                ("unit", FieldValue::from(unit)),
                (
                    "error_unit",
                    FieldValue::opt_text(error_unit.map(str::to_string)),
                ),
                (
                    "error_metric",
                    FieldValue::opt_text(error_metric.map(str::to_string)),
                ),
                ("is_computed", FieldValue::Boolean(is_computed)),
                ("is_interpreted", FieldValue::Boolean(is_interpreted)),
            ],
            &[],
        )
    }

    /// 数据点: 自然键 = (analysis, type); 再次导入刷新数值与误差
    pub fn datum(
        &self,
        analysis_id: i64,
        type_id: i64,
        value: f64,
        error: Option<f64>,
        is_accepted: Option<bool>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("datum")?;
        let mut record = UpsertResolver::get_or_create(
            self.tx,
            table,
            &[
                ("analysis", FieldValue::Integer(analysis_id)),
                ("type", FieldValue::Integer(type_id)),
            ],
            &[("value", FieldValue::Real(value))],
        )?;
        UpsertResolver::set_attributes(
            self.tx,
            table,
            &mut record,
            &[
                ("value", FieldValue::Real(value)),
                ("error", FieldValue::opt_real(error)),
                (
                    "is_accepted",
                    match is_accepted {
                        Some(v) => FieldValue::Boolean(v),
                        None => FieldValue::Null,
                    },
                ),
            ],
        )?;
        Ok(record)
    }

    /// 数据文件登记: 自然键 = file_path
    pub fn data_file(
        &self,
        file_path: &str,
        basename: Option<&str>,
        file_mtime: Option<&str>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("data_file")?;
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[("file_path", FieldValue::from(file_path))],
            &[
                (
                    "basename",
                    FieldValue::opt_text(basename.map(str::to_string)),
                ),
                (
                    "file_mtime",
                    FieldValue::opt_text(file_mtime.map(str::to_string)),
                ),
            ],
        )
    }

    /// 数据文件与会话/样品的多对多链接: 自然键 = (data_file, session)
    pub fn data_file_link(
        &self,
        data_file_id: i64,
        session_id: Option<i64>,
        sample_id: Option<&str>,
    ) -> RepositoryResult<RecordValue> {
        let table = self.registry.require("data_file_link")?;
        UpsertResolver::get_or_create(
            self.tx,
            table,
            &[
                ("data_file", FieldValue::Integer(data_file_id)),
                ("session", FieldValue::opt_integer(session_id)),
            ],
            &[(
                "sample",
                FieldValue::opt_text(sample_id.map(str::to_string)),
            )],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBinder;
    use std::path::Path;

    fn setup_binder() -> SchemaBinder {
        let mut binder = SchemaBinder::connect(":memory:").expect("Failed to connect");
        binder
            .initialize(&[] as &[&Path])
            .expect("Failed to initialize schema");
        binder
    }

    #[test]
    fn test_sample_refreshes_project() {
        let binder = setup_binder();
        let registry = binder.registry().clone();
        let conn = binder.connection();
        let mut conn = conn.lock().expect("lock");
        let tx = conn.transaction().expect("tx");
        let rb = RecordBinder::new(&tx, &registry);

        rb.project("IRRAD-7").expect("project");
        let sample = rb.sample("S1", Some("IRRAD-7")).expect("sample");
        assert_eq!(
            sample.get("project_id").and_then(FieldValue::as_str),
            Some("IRRAD-7")
        );

        // 再次导入换项目: 同一行, 归属被刷新
        rb.project("IRRAD-8").expect("project 2");
        let again = rb.sample("S1", Some("IRRAD-8")).expect("sample again");
        assert_eq!(
            again.get("project_id").and_then(FieldValue::as_str),
            Some("IRRAD-8")
        );
        let count: i64 = tx
            .query_row("SELECT COUNT(*) FROM sample", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_error_metric_label_normalization() {
        let binder = setup_binder();
        let registry = binder.registry().clone();
        let conn = binder.connection();
        let mut conn = conn.lock().expect("lock");
        let tx = conn.transaction().expect("tx");
        let rb = RecordBinder::new(&tx, &registry);

        let em = rb.error_metric("± 2s").expect("error metric");
        assert_eq!(em.id_text(), Some("2s"));
        assert_eq!(
            em.get("description").and_then(FieldValue::as_str),
            Some("2 standard deviations")
        );
    }

    #[test]
    fn test_datum_type_grouping() {
        let binder = setup_binder();
        let registry = binder.registry().clone();
        let conn = binder.connection();
        let mut conn = conn.lock().expect("lock");
        let tx = conn.transaction().expect("tx");
        let rb = RecordBinder::new(&tx, &registry);

        rb.parameter("step_age", None, Some("WiscAr")).expect("param");
        let a = rb
            .datum_type("step_age", "Ma", Some("Ma"), Some("2s"), false, true)
            .expect("dtype a");
        let b = rb
            .datum_type("step_age", "Ma", Some("Ma"), Some("2s"), false, true)
            .expect("dtype b");
        // 同分类命中同一行
        assert_eq!(a.id(), b.id());

        let c = rb
            .datum_type("step_age", "Ma", None, None, false, true)
            .expect("dtype c");
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_datum_refresh_on_reimport() {
        let binder = setup_binder();
        let registry = binder.registry().clone();
        let conn = binder.connection();
        let mut conn = conn.lock().expect("lock");
        let tx = conn.transaction().expect("tx");
        let rb = RecordBinder::new(&tx, &registry);

        rb.sample("S2", None).expect("sample");
        let session = rb
            .session("S2", "2024-06-01 10:00:00", None, None, None, None)
            .expect("session");
        let analysis = rb
            .analysis(session.id().expect("session id"), 0, None)
            .expect("analysis");
        rb.parameter("Tstep", None, None).expect("param");
        let dtype = rb
            .datum_type("Tstep", "°C", None, None, false, false)
            .expect("dtype");

        let analysis_id = analysis.id().expect("analysis id");
        let type_id = dtype.id().expect("type id");
        rb.datum(analysis_id, type_id, 850.0, None, None).expect("datum");
        // 重放同一数据点: 不新增行, 数值刷新
        let refreshed = rb
            .datum(analysis_id, type_id, 855.0, Some(0.3), None)
            .expect("datum again");

        assert_eq!(
            refreshed.get("value").and_then(FieldValue::as_f64),
            Some(855.0)
        );
        let count: i64 = tx
            .query_row("SELECT COUNT(*) FROM datum", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
