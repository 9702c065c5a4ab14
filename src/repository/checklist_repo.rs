// ==========================================
// 学年结转引擎 - 评议核对清单数据仓储
// ==========================================
// 表: council_checklist
// 唯一键: (school_period_id, grade_id, section_id, term_id)
// ==========================================

use crate::domain::checklist::{ChecklistScope, CouncilChecklist};
use crate::domain::types::ChecklistStatus;
use crate::repository::error::{
    invalid_enum_col, parse_datetime_col, parse_opt_datetime_col, RepositoryError,
    RepositoryResult, DATETIME_FMT,
};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ChecklistRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ChecklistRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按范围新增或更新核对条目（幂等）
    ///
    /// # 规则
    /// - status = done: 写入 completed_by / completed_at
    /// - 其他状态: 清空 completed_by / completed_at
    ///
    /// # 返回
    /// - 更新后的条目
    pub fn upsert(
        &self,
        scope: &ChecklistScope,
        status: ChecklistStatus,
        actor: &str,
    ) -> RepositoryResult<CouncilChecklist> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let now = chrono::Utc::now().naive_utc().format(DATETIME_FMT).to_string();
        let (completed_by, completed_at) = if status == ChecklistStatus::Done {
            (Some(actor.to_string()), Some(now.clone()))
        } else {
            (None, None)
        };

        tx.execute(
            r#"
            INSERT INTO council_checklist (
                id, school_period_id, grade_id, section_id, term_id,
                status, completed_by, completed_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(school_period_id, grade_id, section_id, term_id) DO UPDATE SET
                status = excluded.status,
                completed_by = excluded.completed_by,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            "#,
            params![
                uuid::Uuid::new_v4().to_string(),
                scope.school_period_id,
                scope.grade_id,
                scope.section_id,
                scope.term_id,
                status.as_str(),
                completed_by,
                completed_at,
                now,
            ],
        )?;

        let entry = Self::find_by_scope_tx(&tx, scope)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "CouncilChecklist".to_string(),
            id: format!(
                "{}/{}/{}/{}",
                scope.school_period_id, scope.grade_id, scope.section_id, scope.term_id
            ),
        })?;

        tx.commit()?;
        Ok(entry)
    }

    pub fn find_by_scope(&self, scope: &ChecklistScope) -> RepositoryResult<Option<CouncilChecklist>> {
        let conn = self.get_conn()?;
        Self::find_by_scope_tx(&conn, scope)
    }

    fn find_by_scope_tx(
        conn: &Connection,
        scope: &ChecklistScope,
    ) -> RepositoryResult<Option<CouncilChecklist>> {
        let entry = conn
            .query_row(
                r#"
                SELECT id, school_period_id, grade_id, section_id, term_id,
                       status, completed_by, completed_at, updated_at
                FROM council_checklist
                WHERE school_period_id = ?1 AND grade_id = ?2 AND section_id = ?3 AND term_id = ?4
                "#,
                params![
                    scope.school_period_id,
                    scope.grade_id,
                    scope.section_id,
                    scope.term_id
                ],
                map_checklist_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn find_by_period(&self, period_id: &str) -> RepositoryResult<Vec<CouncilChecklist>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, school_period_id, grade_id, section_id, term_id,
                   status, completed_by, completed_at, updated_at
            FROM council_checklist
            WHERE school_period_id = ?1
            ORDER BY grade_id, section_id, term_id
            "#,
        )?;
        let entries = stmt
            .query_map(params![period_id], map_checklist_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }
}

fn map_checklist_row(row: &Row) -> SqliteResult<CouncilChecklist> {
    let status_raw: String = row.get(5)?;
    Ok(CouncilChecklist {
        id: row.get(0)?,
        scope: ChecklistScope {
            school_period_id: row.get(1)?,
            grade_id: row.get(2)?,
            section_id: row.get(3)?,
            term_id: row.get(4)?,
        },
        status: ChecklistStatus::from_str(&status_raw).ok_or_else(|| invalid_enum_col(5, &status_raw))?,
        completed_by: row.get(6)?,
        completed_at: parse_opt_datetime_col(7, row.get(7)?)?,
        updated_at: parse_datetime_col(8, &row.get::<_, String>(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO school_period (id, name, start_date) VALUES ('P1', '2025-2026', '2025-09-15');
            INSERT INTO grade (id, name, grade_order) VALUES ('G1', '1er año', 1);
            INSERT INTO section (id, grade_id, name) VALUES ('S1', 'G1', 'A');
            INSERT INTO term (id, school_period_id, term_order) VALUES ('T1', 'P1', 1);
            "#,
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_upsert_is_idempotent_per_scope() {
        let repo = ChecklistRepository::new(setup_test_db());
        let scope = ChecklistScope::new("P1", "G1", "S1", "T1");

        let first = repo.upsert(&scope, ChecklistStatus::Open, "coord").unwrap();
        let second = repo.upsert(&scope, ChecklistStatus::InReview, "coord").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, ChecklistStatus::InReview);
        assert_eq!(repo.find_by_period("P1").unwrap().len(), 1);
    }

    #[test]
    fn test_done_stamps_and_reopen_clears_completion() {
        let repo = ChecklistRepository::new(setup_test_db());
        let scope = ChecklistScope::new("P1", "G1", "S1", "T1");

        let done = repo.upsert(&scope, ChecklistStatus::Done, "coord").unwrap();
        assert_eq!(done.completed_by.as_deref(), Some("coord"));
        assert!(done.completed_at.is_some());

        let reopened = repo.upsert(&scope, ChecklistStatus::Open, "coord").unwrap();
        assert_eq!(reopened.completed_by, None);
        assert_eq!(reopened.completed_at, None);
    }

    #[test]
    fn test_unknown_scope_violates_foreign_key() {
        let repo = ChecklistRepository::new(setup_test_db());
        let scope = ChecklistScope::new("P1", "G1", "S_UNKNOWN", "T1");

        let err = repo.upsert(&scope, ChecklistStatus::Done, "coord").unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
