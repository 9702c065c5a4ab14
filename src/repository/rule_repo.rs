// ==========================================
// 学年结转引擎 - 升级规则数据仓储
// ==========================================
// 表: school_period_transition_rule (grade_from_id 唯一)
// ==========================================

use crate::domain::rule::{RuleLookup, TransitionRule};
use crate::repository::error::{
    parse_opt_datetime_col, RepositoryError, RepositoryResult, DATETIME_FMT,
};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct TransitionRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransitionRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖规则（按 grade_from_id）
    pub fn upsert(&self, rule: &TransitionRule) -> RepositoryResult<()> {
        rule.check()
            .map_err(|message| RepositoryError::FieldValueError {
                field: "transition_rule".to_string(),
                message,
            })?;

        let conn = self.get_conn()?;
        let now = chrono::Utc::now().naive_utc();
        conn.execute(
            r#"
            INSERT INTO school_period_transition_rule (
                grade_from_id, grade_to_id, min_average, max_pending_subjects,
                auto_graduate, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(grade_from_id) DO UPDATE SET
                grade_to_id = excluded.grade_to_id,
                min_average = excluded.min_average,
                max_pending_subjects = excluded.max_pending_subjects,
                auto_graduate = excluded.auto_graduate,
                updated_at = excluded.updated_at
            "#,
            params![
                rule.grade_from_id,
                rule.grade_to_id,
                rule.min_average,
                rule.max_pending_subjects,
                if rule.auto_graduate { 1 } else { 0 },
                now.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_grade_from(&self, grade_from_id: &str) -> RepositoryResult<Option<TransitionRule>> {
        let conn = self.get_conn()?;
        let rule = conn
            .query_row(
                r#"
                SELECT grade_from_id, grade_to_id, min_average, max_pending_subjects,
                       auto_graduate, updated_at
                FROM school_period_transition_rule
                WHERE grade_from_id = ?1
                "#,
                params![grade_from_id],
                map_rule_row,
            )
            .optional()?;
        Ok(rule)
    }

    /// 按年级查找规则，返回带标签的结果
    pub fn lookup(&self, grade_from_id: &str) -> RepositoryResult<RuleLookup> {
        Ok(match self.find_by_grade_from(grade_from_id)? {
            Some(rule) => RuleLookup::Found(rule),
            None => RuleLookup::MissingRule(grade_from_id.to_string()),
        })
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<TransitionRule>> {
        let conn = self.get_conn()?;
        Self::find_all_tx(&conn)
    }

    pub fn find_all_tx(conn: &Connection) -> RepositoryResult<Vec<TransitionRule>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT grade_from_id, grade_to_id, min_average, max_pending_subjects,
                   auto_graduate, updated_at
            FROM school_period_transition_rule
            ORDER BY grade_from_id
            "#,
        )?;
        let rules = stmt
            .query_map([], map_rule_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rules)
    }

    /// 全部规则按 grade_from_id 建索引
    pub fn find_all_indexed_tx(conn: &Connection) -> RepositoryResult<HashMap<String, TransitionRule>> {
        Ok(Self::find_all_tx(conn)?
            .into_iter()
            .map(|r| (r.grade_from_id.clone(), r))
            .collect())
    }

    pub fn find_all_indexed(&self) -> RepositoryResult<HashMap<String, TransitionRule>> {
        let conn = self.get_conn()?;
        Self::find_all_indexed_tx(&conn)
    }
}

fn map_rule_row(row: &Row) -> SqliteResult<TransitionRule> {
    Ok(TransitionRule {
        grade_from_id: row.get(0)?,
        grade_to_id: row.get(1)?,
        min_average: row.get(2)?,
        max_pending_subjects: row.get(3)?,
        auto_graduate: row.get::<_, i32>(4)? != 0,
        updated_at: parse_opt_datetime_col(5, row.get(5)?)?,
    })
}
