// ==========================================
// 学年结转引擎 - 结转尝试数据仓储
// ==========================================
// 表: period_closure
// 红线: 只追加不删除，失败尝试保留为审计轨迹
// ==========================================

use crate::domain::closure::{ClosureLogEntry, PeriodClosure};
use crate::domain::types::ClosureStatus;
use crate::repository::error::{
    invalid_enum_col, parse_datetime_col, parse_opt_datetime_col, RepositoryError,
    RepositoryResult, DATETIME_FMT,
};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, school_period_id, status, initiated_by, started_at,
           finished_at, log, snapshot
    FROM period_closure
"#;

pub struct ClosureRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClosureRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, closure: &PeriodClosure) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO period_closure (
                id, school_period_id, status, initiated_by, started_at,
                finished_at, log, snapshot
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                closure.id,
                closure.school_period_id,
                closure.status.as_str(),
                closure.initiated_by,
                closure.started_at.format(DATETIME_FMT).to_string(),
                closure.finished_at.map(|t| t.format(DATETIME_FMT).to_string()),
                serde_json::to_string(&closure.log)?,
                closure.snapshot.as_ref().map(serde_json::to_string).transpose()?,
            ],
        )?;
        Ok(())
    }

    /// 更新状态、结束时间、日志与快照
    pub fn update(&self, closure: &PeriodClosure) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::update_tx(&conn, closure)
    }

    /// 在给定连接（或事务）上更新结转尝试
    ///
    /// 状态迁移在此校验: 数据库中的当前状态必须允许迁移到目标状态
    pub fn update_tx(conn: &Connection, closure: &PeriodClosure) -> RepositoryResult<()> {
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM period_closure WHERE id = ?1",
                params![closure.id],
                |row| row.get(0),
            )
            .optional()?;

        let current = match current {
            Some(raw) => ClosureStatus::from_str(&raw).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "status".to_string(),
                    message: format!("非法结转状态: {}", raw),
                }
            })?,
            None => {
                return Err(RepositoryError::NotFound {
                    entity: "PeriodClosure".to_string(),
                    id: closure.id.clone(),
                })
            }
        };

        if current != closure.status && !current.can_transition_to(closure.status) {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.to_string(),
                to: closure.status.to_string(),
            });
        }

        conn.execute(
            r#"
            UPDATE period_closure
            SET status = ?1, finished_at = ?2, log = ?3, snapshot = ?4
            WHERE id = ?5
            "#,
            params![
                closure.status.as_str(),
                closure.finished_at.map(|t| t.format(DATETIME_FMT).to_string()),
                serde_json::to_string(&closure.log)?,
                closure.snapshot.as_ref().map(serde_json::to_string).transpose()?,
                closure.id,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PeriodClosure>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let closure = conn
            .query_row(&sql, params![id], map_closure_row)
            .optional()?;
        Ok(closure)
    }

    /// 学年的全部结转尝试（最新在前）
    pub fn find_by_period(&self, period_id: &str) -> RepositoryResult<Vec<PeriodClosure>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE school_period_id = ?1 ORDER BY started_at DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![period_id], map_closure_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_latest_for_period(&self, period_id: &str) -> RepositoryResult<Option<PeriodClosure>> {
        Ok(self.find_by_period(period_id)?.into_iter().next())
    }

    pub fn find_closed_for_period(&self, period_id: &str) -> RepositoryResult<Option<PeriodClosure>> {
        let conn = self.get_conn()?;
        Self::find_closed_for_period_tx(&conn, period_id)
    }

    pub fn find_closed_for_period_tx(
        conn: &Connection,
        period_id: &str,
    ) -> RepositoryResult<Option<PeriodClosure>> {
        let sql = format!(
            "{} WHERE school_period_id = ?1 AND status = 'closed' LIMIT 1",
            SELECT_COLUMNS
        );
        let closure = conn
            .query_row(&sql, params![period_id], map_closure_row)
            .optional()?;
        Ok(closure)
    }
}

fn map_closure_row(row: &Row) -> SqliteResult<PeriodClosure> {
    let status_raw: String = row.get(2)?;
    let log_raw: String = row.get(6)?;
    let snapshot_raw: Option<String> = row.get(7)?;

    let log: Vec<ClosureLogEntry> = serde_json::from_str(&log_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let snapshot = snapshot_raw
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(PeriodClosure {
        id: row.get(0)?,
        school_period_id: row.get(1)?,
        status: ClosureStatus::from_str(&status_raw).ok_or_else(|| invalid_enum_col(2, &status_raw))?,
        initiated_by: row.get(3)?,
        started_at: parse_datetime_col(4, &row.get::<_, String>(4)?)?,
        finished_at: parse_opt_datetime_col(5, row.get(5)?)?,
        log,
        snapshot,
    })
}
