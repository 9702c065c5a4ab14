// ==========================================
// 学年结转引擎 - 结转结果数据仓储
// ==========================================
// 表: subject_final_grade / student_period_outcome
// 红线: 写入只发生在结转执行器的事务内 (*_tx)
// ==========================================

use crate::domain::outcome::{StudentPeriodOutcome, SubjectFinalGrade};
use crate::domain::types::{OutcomeStatus, SubjectGradeStatus};
use crate::repository::error::{
    invalid_enum_col, parse_opt_datetime_col, RepositoryError, RepositoryResult, DATETIME_FMT,
};
use rusqlite::{params, Connection, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct OutcomeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OutcomeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内写入
    // ==========================================

    /// 批量写入/覆盖科目期末成绩
    pub fn upsert_final_grades_tx(
        tx: &Transaction,
        closure_id: &str,
        grades: &[SubjectFinalGrade],
    ) -> RepositoryResult<usize> {
        let now = chrono::Utc::now().naive_utc().format(DATETIME_FMT).to_string();
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO subject_final_grade (
                id, inscription_subject_id, subject_id, raw_score, council_points,
                final_score, status, period_closure_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(inscription_subject_id) DO UPDATE SET
                subject_id = excluded.subject_id,
                raw_score = excluded.raw_score,
                council_points = excluded.council_points,
                final_score = excluded.final_score,
                status = excluded.status,
                period_closure_id = excluded.period_closure_id,
                created_at = excluded.created_at
            "#,
        )?;

        let mut count = 0;
        for grade in grades {
            stmt.execute(params![
                uuid::Uuid::new_v4().to_string(),
                grade.inscription_subject_id,
                grade.subject_id,
                grade.raw_score,
                grade.council_points,
                grade.final_score,
                grade.status.as_str(),
                closure_id,
                now,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    /// 写入/覆盖学生学年结果
    pub fn upsert_outcome_tx(
        tx: &Transaction,
        closure_id: &str,
        outcome: &StudentPeriodOutcome,
    ) -> RepositoryResult<()> {
        let now = chrono::Utc::now().naive_utc().format(DATETIME_FMT).to_string();
        tx.execute(
            r#"
            INSERT INTO student_period_outcome (
                id, inscription_id, final_average, failed_subjects, status,
                promotion_grade_id, graduated_at, metadata, period_closure_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(inscription_id) DO UPDATE SET
                final_average = excluded.final_average,
                failed_subjects = excluded.failed_subjects,
                status = excluded.status,
                promotion_grade_id = excluded.promotion_grade_id,
                graduated_at = excluded.graduated_at,
                metadata = excluded.metadata,
                period_closure_id = excluded.period_closure_id,
                created_at = excluded.created_at
            "#,
            params![
                uuid::Uuid::new_v4().to_string(),
                outcome.inscription_id,
                outcome.final_average,
                outcome.failed_subjects,
                outcome.status.as_str(),
                outcome.promotion_grade_id,
                outcome.graduated_at.map(|t| t.format(DATETIME_FMT).to_string()),
                serde_json::to_string(&outcome.metadata)?,
                closure_id,
                now,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询学年内所有科目期末成绩
    pub fn find_final_grades_by_period(&self, period_id: &str) -> RepositoryResult<Vec<SubjectFinalGrade>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sfg.inscription_subject_id, sfg.subject_id, sfg.raw_score,
                   sfg.council_points, sfg.final_score, sfg.status
            FROM subject_final_grade sfg
            JOIN inscription_subject isub ON isub.id = sfg.inscription_subject_id
            JOIN inscription i ON i.id = isub.inscription_id
            WHERE i.school_period_id = ?1
            ORDER BY isub.inscription_id, sfg.subject_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], map_final_grade_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询学年内所有学生结果
    pub fn find_outcomes_by_period(&self, period_id: &str) -> RepositoryResult<Vec<StudentPeriodOutcome>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT o.inscription_id, i.person_id, i.grade_id, o.final_average,
                   o.failed_subjects, o.status, o.promotion_grade_id,
                   o.graduated_at, o.metadata
            FROM student_period_outcome o
            JOIN inscription i ON i.id = o.inscription_id
            WHERE i.school_period_id = ?1
            ORDER BY o.inscription_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], map_outcome_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 统计某次结转写入的行数 (成绩, 结果)
    pub fn count_by_closure(&self, closure_id: &str) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        let grades: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subject_final_grade WHERE period_closure_id = ?1",
            params![closure_id],
            |row| row.get(0),
        )?;
        let outcomes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM student_period_outcome WHERE period_closure_id = ?1",
            params![closure_id],
            |row| row.get(0),
        )?;
        Ok((grades as usize, outcomes as usize))
    }
}

fn map_final_grade_row(row: &Row) -> SqliteResult<SubjectFinalGrade> {
    let status_raw: String = row.get(5)?;
    Ok(SubjectFinalGrade {
        inscription_subject_id: row.get(0)?,
        subject_id: row.get(1)?,
        raw_score: row.get(2)?,
        council_points: row.get(3)?,
        final_score: row.get(4)?,
        status: SubjectGradeStatus::from_str(&status_raw)
            .ok_or_else(|| invalid_enum_col(5, &status_raw))?,
    })
}

fn map_outcome_row(row: &Row) -> SqliteResult<StudentPeriodOutcome> {
    let status_raw: String = row.get(5)?;
    let metadata_raw: String = row.get(8)?;
    Ok(StudentPeriodOutcome {
        inscription_id: row.get(0)?,
        person_id: row.get(1)?,
        grade_id: row.get(2)?,
        final_average: row.get(3)?,
        failed_subjects: row.get(4)?,
        status: OutcomeStatus::from_str(&status_raw).ok_or_else(|| invalid_enum_col(5, &status_raw))?,
        promotion_grade_id: row.get(6)?,
        graduated_at: parse_opt_datetime_col(7, row.get(7)?)?,
        metadata: serde_json::from_str(&metadata_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO school_period (id, name, start_date) VALUES ('P1', '2025-2026', '2025-09-15');
            INSERT INTO grade (id, name, grade_order) VALUES ('G1', '1er año', 1), ('G2', '2do año', 2);
            INSERT INTO subject (id, name) VALUES ('MAT', 'Matemática');
            INSERT INTO inscription (id, person_id, school_period_id, grade_id)
                VALUES ('I1', 'PER1', 'P1', 'G1');
            INSERT INTO inscription_subject (id, inscription_id, subject_id) VALUES ('IS1', 'I1', 'MAT');
            INSERT INTO period_closure (id, school_period_id, status, initiated_by, started_at)
                VALUES ('C1', 'P1', 'validating', 'admin', '2026-07-15 10:00:00');
            "#,
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn grade(final_score: f64) -> SubjectFinalGrade {
        SubjectFinalGrade {
            inscription_subject_id: "IS1".to_string(),
            subject_id: "MAT".to_string(),
            raw_score: final_score,
            council_points: 0.0,
            final_score,
            status: if final_score >= 10.0 {
                SubjectGradeStatus::Aprobada
            } else {
                SubjectGradeStatus::Reprobada
            },
        }
    }

    fn outcome() -> StudentPeriodOutcome {
        StudentPeriodOutcome {
            inscription_id: "I1".to_string(),
            person_id: "PER1".to_string(),
            grade_id: "G1".to_string(),
            final_average: 15.0,
            failed_subjects: 0,
            status: OutcomeStatus::Aprobado,
            promotion_grade_id: Some("G2".to_string()),
            graduated_at: None,
            metadata: json!({"reason": "aprobado"}),
        }
    }

    #[test]
    fn test_upsert_final_grades_overwrites_same_subject() {
        let conn = setup_test_db();
        {
            let mut guard = conn.lock().unwrap();
            let tx = guard.transaction().unwrap();
            OutcomeRepository::upsert_final_grades_tx(&tx, "C1", &[grade(8.0)]).unwrap();
            OutcomeRepository::upsert_final_grades_tx(&tx, "C1", &[grade(12.5)]).unwrap();
            tx.commit().unwrap();
        }

        let repo = OutcomeRepository::new(conn);
        let grades = repo.find_final_grades_by_period("P1").unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].final_score, 12.5);
        assert_eq!(grades[0].status, SubjectGradeStatus::Aprobada);
    }

    #[test]
    fn test_outcome_roundtrip_with_metadata() {
        let conn = setup_test_db();
        {
            let mut guard = conn.lock().unwrap();
            let tx = guard.transaction().unwrap();
            OutcomeRepository::upsert_outcome_tx(&tx, "C1", &outcome()).unwrap();
            tx.commit().unwrap();
        }

        let repo = OutcomeRepository::new(conn);
        let outcomes = repo.find_outcomes_by_period("P1").unwrap();
        assert_eq!(outcomes, vec![outcome()]);
        assert_eq!(repo.count_by_closure("C1").unwrap(), (0, 1));
    }

    #[test]
    fn test_uncommitted_writes_are_discarded() {
        let conn = setup_test_db();
        {
            let mut guard = conn.lock().unwrap();
            let tx = guard.transaction().unwrap();
            OutcomeRepository::upsert_outcome_tx(&tx, "C1", &outcome()).unwrap();
            // drop 即回滚
        }

        let repo = OutcomeRepository::new(conn);
        assert!(repo.find_outcomes_by_period("P1").unwrap().is_empty());
    }
}
