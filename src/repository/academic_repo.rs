// ==========================================
// 学年结转引擎 - 学籍/成绩输入数据仓储
// ==========================================
// 职责: 读取外部协作方数据（学年、学期、注册、成绩、评议加分）
//       以及执行器在事务内写入新学年注册
// 红线: Repository 不含业务逻辑，只做数据映射
// ==========================================

use crate::domain::academic::{
    CouncilPointInput, Inscription, InscriptionSubjectInput, PeriodSnapshot, QualificationInput,
    SchoolPeriod, StudentInput, Term,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// PlanPercentageTotal - 评价计划权重合计
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct PlanPercentageTotal {
    pub subject_id: String,
    pub section_id: Option<String>,
    pub total_percentage: f64,
}

// ==========================================
// AcademicRepository
// ==========================================
pub struct AcademicRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AcademicRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 学年 / 学期
    // ==========================================

    pub fn find_period(&self, period_id: &str) -> RepositoryResult<Option<SchoolPeriod>> {
        let conn = self.get_conn()?;
        Self::find_period_tx(&conn, period_id)
    }

    pub fn find_period_tx(conn: &Connection, period_id: &str) -> RepositoryResult<Option<SchoolPeriod>> {
        let period = conn
            .query_row(
                "SELECT id, name, start_date, end_date FROM school_period WHERE id = ?1",
                params![period_id],
                map_period_row,
            )
            .optional()?;
        Ok(period)
    }

    /// 查询下一学年: start_date 晚于当前学年的最早学年
    pub fn find_next_period(&self, period_id: &str) -> RepositoryResult<Option<SchoolPeriod>> {
        let conn = self.get_conn()?;
        Self::find_next_period_tx(&conn, period_id)
    }

    pub fn find_next_period_tx(
        conn: &Connection,
        period_id: &str,
    ) -> RepositoryResult<Option<SchoolPeriod>> {
        let period = conn
            .query_row(
                r#"
                SELECT n.id, n.name, n.start_date, n.end_date
                FROM school_period n
                JOIN school_period c ON c.id = ?1
                WHERE n.start_date > c.start_date
                ORDER BY n.start_date ASC
                LIMIT 1
                "#,
                params![period_id],
                map_period_row,
            )
            .optional()?;
        Ok(period)
    }

    pub fn find_terms(&self, period_id: &str) -> RepositoryResult<Vec<Term>> {
        let conn = self.get_conn()?;
        Self::find_terms_tx(&conn, period_id)
    }

    pub fn find_terms_tx(conn: &Connection, period_id: &str) -> RepositoryResult<Vec<Term>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, school_period_id, term_order, is_blocked
            FROM term
            WHERE school_period_id = ?1
            ORDER BY term_order ASC
            "#,
        )?;
        let terms = stmt
            .query_map(params![period_id], |row| {
                Ok(Term {
                    id: row.get(0)?,
                    school_period_id: row.get(1)?,
                    term_order: row.get(2)?,
                    is_blocked: row.get::<_, i32>(3)? != 0,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(terms)
    }

    // ==========================================
    // 注册
    // ==========================================

    pub fn find_inscriptions(&self, period_id: &str) -> RepositoryResult<Vec<Inscription>> {
        let conn = self.get_conn()?;
        Self::find_inscriptions_tx(&conn, period_id)
    }

    pub fn find_inscriptions_tx(conn: &Connection, period_id: &str) -> RepositoryResult<Vec<Inscription>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, person_id, school_period_id, grade_id, section_id,
                   escolaridad, is_repeater, origin_period_id
            FROM inscription
            WHERE school_period_id = ?1
            ORDER BY id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], map_inscription_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 学年结构中的 (年级, 班级) 组合（来自已分班的注册）
    pub fn find_grade_sections(&self, period_id: &str) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT grade_id, section_id
            FROM inscription
            WHERE school_period_id = ?1 AND section_id IS NOT NULL
            ORDER BY grade_id, section_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 在事务中写入新学年注册
    pub fn insert_inscription_tx(tx: &Transaction, inscription: &Inscription) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO inscription (
                id, person_id, school_period_id, grade_id, section_id,
                escolaridad, is_repeater, origin_period_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                inscription.id,
                inscription.person_id,
                inscription.school_period_id,
                inscription.grade_id,
                inscription.section_id,
                inscription.escolaridad,
                if inscription.is_repeater { 1 } else { 0 },
                inscription.origin_period_id,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 评价计划
    // ==========================================

    /// 按 (科目, 班级) 汇总本学年评价计划权重
    pub fn find_plan_percentage_totals(
        &self,
        period_id: &str,
    ) -> RepositoryResult<Vec<PlanPercentageTotal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ep.subject_id, ep.section_id, SUM(ep.percentage)
            FROM evaluation_plan ep
            JOIN term t ON t.id = ep.term_id
            WHERE t.school_period_id = ?1
            GROUP BY ep.subject_id, ep.section_id
            ORDER BY ep.subject_id, ep.section_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], |row| {
                Ok(PlanPercentageTotal {
                    subject_id: row.get(0)?,
                    section_id: row.get(1)?,
                    total_percentage: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 结转输入快照
    // ==========================================

    /// 读取学年结转所需的全部输入
    ///
    /// # 返回
    /// - Ok(Some(snapshot)): 学年存在
    /// - Ok(None): 学年不存在
    pub fn load_period_snapshot(&self, period_id: &str) -> RepositoryResult<Option<PeriodSnapshot>> {
        let conn = self.get_conn()?;
        Self::load_period_snapshot_tx(&conn, period_id)
    }

    /// 在给定连接（或事务）上读取快照
    ///
    /// 执行器在写事务内调用，保证计算输入与提交处于同一一致性视图。
    pub fn load_period_snapshot_tx(
        conn: &Connection,
        period_id: &str,
    ) -> RepositoryResult<Option<PeriodSnapshot>> {
        let period = match Self::find_period_tx(conn, period_id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let terms = Self::find_terms_tx(conn, period_id)?;
        let inscriptions = Self::find_inscriptions_tx(conn, period_id)?;

        let mut qualifications = Self::load_qualifications(conn, period_id)?;
        let mut council_points = Self::load_council_points(conn, period_id)?;
        let mut subjects_by_inscription: HashMap<String, Vec<InscriptionSubjectInput>> =
            HashMap::new();

        let mut stmt = conn.prepare(
            r#"
            SELECT isub.id, isub.inscription_id, isub.subject_id, s.name
            FROM inscription_subject isub
            JOIN inscription i ON i.id = isub.inscription_id
            JOIN subject s ON s.id = isub.subject_id
            WHERE i.school_period_id = ?1
            ORDER BY isub.inscription_id, isub.subject_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![period_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        for (inscription_subject_id, inscription_id, subject_id, subject_name) in rows {
            let subject = InscriptionSubjectInput {
                qualifications: qualifications
                    .remove(&inscription_subject_id)
                    .unwrap_or_default(),
                council_points: council_points
                    .remove(&inscription_subject_id)
                    .unwrap_or_default(),
                inscription_subject_id,
                subject_id,
                subject_name,
            };
            subjects_by_inscription
                .entry(inscription_id)
                .or_default()
                .push(subject);
        }

        let students = inscriptions
            .into_iter()
            .map(|inscription| StudentInput {
                subjects: subjects_by_inscription
                    .remove(&inscription.id)
                    .unwrap_or_default(),
                inscription,
            })
            .collect();

        Ok(Some(PeriodSnapshot {
            period,
            terms,
            students,
        }))
    }

    /// 评价计划 LEFT JOIN: 计划缺失时 percentage/term_id 为 NULL
    fn load_qualifications(
        conn: &Connection,
        period_id: &str,
    ) -> RepositoryResult<HashMap<String, Vec<QualificationInput>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT q.id, q.inscription_subject_id, q.evaluation_plan_id, q.score,
                   ep.percentage, ep.term_id
            FROM qualification q
            JOIN inscription_subject isub ON isub.id = q.inscription_subject_id
            JOIN inscription i ON i.id = isub.inscription_id
            LEFT JOIN evaluation_plan ep ON ep.id = q.evaluation_plan_id
            WHERE i.school_period_id = ?1
            ORDER BY q.inscription_subject_id, q.id
            "#,
        )?;

        let mut map: HashMap<String, Vec<QualificationInput>> = HashMap::new();
        let rows = stmt.query_map(params![period_id], |row| {
            Ok((
                row.get::<_, String>(1)?,
                QualificationInput {
                    qualification_id: row.get(0)?,
                    evaluation_plan_id: row.get(2)?,
                    score: row.get(3)?,
                    percentage: row.get(4)?,
                    term_id: row.get(5)?,
                },
            ))
        })?;
        for row in rows {
            let (inscription_subject_id, qualification) = row?;
            map.entry(inscription_subject_id).or_default().push(qualification);
        }
        Ok(map)
    }

    fn load_council_points(
        conn: &Connection,
        period_id: &str,
    ) -> RepositoryResult<HashMap<String, Vec<CouncilPointInput>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT cp.inscription_subject_id, cp.term_id, cp.points
            FROM council_point cp
            JOIN inscription_subject isub ON isub.id = cp.inscription_subject_id
            JOIN inscription i ON i.id = isub.inscription_id
            WHERE i.school_period_id = ?1
            ORDER BY cp.inscription_subject_id, cp.term_id
            "#,
        )?;

        let mut map: HashMap<String, Vec<CouncilPointInput>> = HashMap::new();
        let rows = stmt.query_map(params![period_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                CouncilPointInput {
                    term_id: row.get(1)?,
                    points: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (inscription_subject_id, point) = row?;
            map.entry(inscription_subject_id).or_default().push(point);
        }
        Ok(map)
    }
}

fn map_period_row(row: &Row) -> SqliteResult<SchoolPeriod> {
    let parse_date = |idx: usize, raw: String| {
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };
    Ok(SchoolPeriod {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: parse_date(2, row.get(2)?)?,
        end_date: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_date(3, s))
            .transpose()?,
    })
}

fn map_inscription_row(row: &Row) -> SqliteResult<Inscription> {
    Ok(Inscription {
        id: row.get(0)?,
        person_id: row.get(1)?,
        school_period_id: row.get(2)?,
        grade_id: row.get(3)?,
        section_id: row.get(4)?,
        escolaridad: row.get(5)?,
        is_repeater: row.get::<_, i32>(6)? != 0,
        origin_period_id: row.get(7)?,
    })
}
