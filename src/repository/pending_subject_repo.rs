// ==========================================
// 学年结转引擎 - 欠科数据仓储
// ==========================================
// 表: pending_subject
// 唯一键: (new_inscription_id, subject_id)
// ==========================================

use crate::domain::outcome::PendingSubject;
use crate::domain::types::PendingSubjectStatus;
use crate::repository::error::{
    invalid_enum_col, parse_datetime_col, parse_opt_datetime_col, RepositoryError,
    RepositoryResult, DATETIME_FMT,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, new_inscription_id, subject_id, origin_period_id,
           origin_inscription_subject_id, status, created_at, resolved_at, resolved_by
    FROM pending_subject
"#;

pub struct PendingSubjectRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PendingSubjectRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, pending: &PendingSubject) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, pending)
    }

    /// 在给定连接（或事务）上写入欠科
    ///
    /// 同一 (new_inscription_id, subject_id) 重复写入返回 UniqueConstraintViolation
    pub fn insert_tx(conn: &Connection, pending: &PendingSubject) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO pending_subject (
                id, new_inscription_id, subject_id, origin_period_id,
                origin_inscription_subject_id, status, created_at, resolved_at, resolved_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                pending.id,
                pending.new_inscription_id,
                pending.subject_id,
                pending.origin_period_id,
                pending.origin_inscription_subject_id,
                pending.status.as_str(),
                pending.created_at.format(DATETIME_FMT).to_string(),
                pending.resolved_at.map(|t| t.format(DATETIME_FMT).to_string()),
                pending.resolved_by,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PendingSubject>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let pending = conn
            .query_row(&sql, params![id], map_pending_row)
            .optional()?;
        Ok(pending)
    }

    pub fn find_by_new_inscription(&self, inscription_id: &str) -> RepositoryResult<Vec<PendingSubject>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE new_inscription_id = ?1 ORDER BY subject_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![inscription_id], map_pending_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询源学年产生的欠科，可按状态过滤
    pub fn find_by_origin_period(
        &self,
        origin_period_id: &str,
        status: Option<PendingSubjectStatus>,
    ) -> RepositoryResult<Vec<PendingSubject>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE origin_period_id = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY new_inscription_id, subject_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![origin_period_id, status.map(|s| s.as_str())],
                map_pending_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 登记欠科结果（仅 pendiente 状态可变更）
    ///
    /// # 返回
    /// - Ok(()): 已更新
    /// - Err(NotFound): 欠科不存在
    /// - Err(InvalidStateTransition): 欠科已处理
    pub fn update_resolution(
        &self,
        id: &str,
        status: PendingSubjectStatus,
        resolved_by: &str,
        resolved_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE pending_subject
            SET status = ?1, resolved_at = ?2, resolved_by = ?3
            WHERE id = ?4 AND status = 'pendiente'
            "#,
            params![
                status.as_str(),
                resolved_at.format(DATETIME_FMT).to_string(),
                resolved_by,
                id
            ],
        )?;

        if affected == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM pending_subject WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => Err(RepositoryError::NotFound {
                entity: "PendingSubject".to_string(),
                id: id.to_string(),
            }),
            Some(from) => Err(RepositoryError::InvalidStateTransition {
                from,
                to: status.as_str().to_string(),
            }),
        }
    }
}

fn map_pending_row(row: &Row) -> SqliteResult<PendingSubject> {
    let status_raw: String = row.get(5)?;
    Ok(PendingSubject {
        id: row.get(0)?,
        new_inscription_id: row.get(1)?,
        subject_id: row.get(2)?,
        origin_period_id: row.get(3)?,
        origin_inscription_subject_id: row.get(4)?,
        status: PendingSubjectStatus::from_str(&status_raw)
            .ok_or_else(|| invalid_enum_col(5, &status_raw))?,
        created_at: parse_datetime_col(6, &row.get::<_, String>(6)?)?,
        resolved_at: parse_opt_datetime_col(7, row.get(7)?)?,
        resolved_by: row.get(8)?,
    })
}
