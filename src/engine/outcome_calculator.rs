// ==========================================
// 学年结转引擎 - 学年结果计算引擎
// ==========================================
// 职责: 对学年内每个注册计算科目期末成绩、平均分、不及格数、结果状态
// 红线: 纯函数，不访问数据库；预览与提交共用，结果必须一致
// ==========================================

use crate::config::closure_policy::ClosurePolicy;
use crate::domain::academic::{PeriodSnapshot, StudentInput};
use crate::domain::outcome::{StudentOutcome, StudentPeriodOutcome};
use crate::domain::rule::TransitionRule;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::engine::grade_aggregator::{round2, AggregationContext, GradeAggregator};
use crate::engine::transition_resolver::TransitionResolver;
use chrono::NaiveDateTime;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};

// ==========================================
// OutcomeCalculator
// ==========================================
pub struct OutcomeCalculator {
    policy: ClosurePolicy,
    aggregator: GradeAggregator,
    resolver: TransitionResolver,
}

impl OutcomeCalculator {
    pub fn new(policy: ClosurePolicy) -> Self {
        Self {
            aggregator: GradeAggregator::new(&policy),
            resolver: TransitionResolver::new(),
            policy,
        }
    }

    /// 计算整个学年的结果
    ///
    /// # 参数
    /// - snapshot: 学年输入快照
    /// - rules: 按 grade_from_id 索引的升级规则
    /// - evaluated_at: 判定时刻（毕业学生的 graduated_at）
    ///
    /// # 返回
    /// - 与 snapshot.students 同序的结果列表
    #[instrument(skip(self, snapshot, rules), fields(
        period_id = %snapshot.period.id,
        students = snapshot.students.len()
    ))]
    pub fn calculate(
        &self,
        snapshot: &PeriodSnapshot,
        rules: &HashMap<String, TransitionRule>,
        evaluated_at: NaiveDateTime,
    ) -> ClosureResult<Vec<StudentOutcome>> {
        let ctx = AggregationContext {
            term_ids: snapshot.term_ids(),
            closing_term_id: snapshot.closing_term_id(),
        };

        snapshot
            .students
            .iter()
            .map(|student| self.calculate_student(student, &ctx, rules, evaluated_at))
            .collect()
    }

    fn calculate_student(
        &self,
        student: &StudentInput,
        ctx: &AggregationContext<'_>,
        rules: &HashMap<String, TransitionRule>,
        evaluated_at: NaiveDateTime,
    ) -> ClosureResult<StudentOutcome> {
        let inscription = &student.inscription;
        let rule = rules.get(&inscription.grade_id).ok_or_else(|| {
            ClosureError::Computation(format!(
                "年级 {} 缺少升级规则 (inscription={})",
                inscription.grade_id, inscription.id
            ))
        })?;

        let subjects = student
            .subjects
            .iter()
            .map(|s| self.aggregator.aggregate(s, ctx))
            .collect::<ClosureResult<Vec<_>>>()?;

        let failed_count = subjects.iter().filter(|s| s.is_failed()).count();
        let failed_subjects = u8::try_from(failed_count).unwrap_or(u8::MAX);
        let final_average = if subjects.is_empty() {
            0.0
        } else {
            round2(subjects.iter().map(|s| s.final_score).sum::<f64>() / subjects.len() as f64)
        };

        let decision = self.resolver.resolve(rule, final_average, failed_subjects);
        debug!(
            inscription_id = %inscription.id,
            final_average,
            failed_subjects,
            status = %decision.status,
            "学生结果判定完成"
        );

        let metadata = json!({
            "rule": {
                "grade_from_id": rule.grade_from_id,
                "grade_to_id": rule.grade_to_id,
                "min_average": rule.min_average,
                "max_pending_subjects": rule.max_pending_subjects,
                "auto_graduate": rule.auto_graduate,
            },
            "reason": decision.reason,
            "passing_score": self.policy.passing_score,
            "council_point_mode": self.policy.council_point_mode.as_str(),
            "subject_count": subjects.len(),
        });

        Ok(StudentOutcome {
            outcome: StudentPeriodOutcome {
                inscription_id: inscription.id.clone(),
                person_id: inscription.person_id.clone(),
                grade_id: inscription.grade_id.clone(),
                final_average,
                failed_subjects,
                status: decision.status,
                promotion_grade_id: decision.promotion_grade_id,
                graduated_at: decision.graduated.then_some(evaluated_at),
                metadata,
            },
            subjects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::academic::{
        Inscription, InscriptionSubjectInput, QualificationInput, SchoolPeriod, Term,
    };
    use crate::domain::types::OutcomeStatus;
    use chrono::NaiveDate;

    fn term() -> Term {
        Term {
            id: "T1".to_string(),
            school_period_id: "P1".to_string(),
            term_order: 1,
            is_blocked: true,
        }
    }

    fn student(id: &str, grade_id: &str, scores: &[f64]) -> StudentInput {
        StudentInput {
            inscription: Inscription {
                id: id.to_string(),
                person_id: format!("PER_{}", id),
                school_period_id: "P1".to_string(),
                grade_id: grade_id.to_string(),
                section_id: Some("S1".to_string()),
                escolaridad: None,
                is_repeater: false,
                origin_period_id: None,
            },
            subjects: scores
                .iter()
                .enumerate()
                .map(|(i, score)| InscriptionSubjectInput {
                    inscription_subject_id: format!("{}_IS{}", id, i),
                    subject_id: format!("SUB{}", i),
                    subject_name: format!("Subject {}", i),
                    qualifications: vec![QualificationInput {
                        qualification_id: format!("{}_Q{}", id, i),
                        evaluation_plan_id: format!("EP{}", i),
                        score: *score,
                        percentage: Some(100.0),
                        term_id: Some("T1".to_string()),
                    }],
                    council_points: vec![],
                })
                .collect(),
        }
    }

    fn snapshot(students: Vec<StudentInput>) -> PeriodSnapshot {
        PeriodSnapshot {
            period: SchoolPeriod {
                id: "P1".to_string(),
                name: "2025-2026".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
                end_date: None,
            },
            terms: vec![term()],
            students,
        }
    }

    fn rules() -> HashMap<String, TransitionRule> {
        let rule = TransitionRule {
            grade_from_id: "G1".to_string(),
            grade_to_id: Some("G2".to_string()),
            min_average: 10.0,
            max_pending_subjects: 2,
            auto_graduate: false,
            updated_at: None,
        };
        HashMap::from([("G1".to_string(), rule)])
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_worked_example() {
        let calc = OutcomeCalculator::new(ClosurePolicy::default());
        let snap = snapshot(vec![
            student("A", "G1", &[12.0, 8.0, 15.0]),
            student("B", "G1", &[5.0, 6.0, 4.0]),
            student("C", "G1", &[18.0, 20.0, 16.0]),
        ]);

        let outcomes = calc.calculate(&snap, &rules(), now()).unwrap();
        let a = &outcomes[0].outcome;
        let b = &outcomes[1].outcome;
        let c = &outcomes[2].outcome;

        assert_eq!(a.final_average, 11.67);
        assert_eq!(a.failed_subjects, 1);
        assert_eq!(a.status, OutcomeStatus::MateriasPendientes);
        assert_eq!(a.promotion_grade_id.as_deref(), Some("G2"));
        assert_eq!(outcomes[0].failed_subject_grades().count(), 1);

        assert_eq!(b.final_average, 5.0);
        assert_eq!(b.failed_subjects, 3);
        assert_eq!(b.status, OutcomeStatus::Reprobado);
        assert_eq!(b.promotion_grade_id.as_deref(), Some("G1"));

        assert_eq!(c.final_average, 18.0);
        assert_eq!(c.failed_subjects, 0);
        assert_eq!(c.status, OutcomeStatus::Aprobado);
        assert!(!c.is_graduated());
    }

    #[test]
    fn test_missing_rule_is_error() {
        let calc = OutcomeCalculator::new(ClosurePolicy::default());
        let snap = snapshot(vec![student("A", "G9", &[12.0])]);

        let err = calc.calculate(&snap, &rules(), now()).unwrap_err();
        assert!(matches!(err, ClosureError::Computation(_)));
    }

    #[test]
    fn test_student_without_subjects_averages_zero() {
        let calc = OutcomeCalculator::new(ClosurePolicy::default());
        let snap = snapshot(vec![student("A", "G1", &[])]);

        let outcomes = calc.calculate(&snap, &rules(), now()).unwrap();
        assert_eq!(outcomes[0].outcome.final_average, 0.0);
        assert_eq!(outcomes[0].outcome.failed_subjects, 0);
        assert_eq!(outcomes[0].outcome.status, OutcomeStatus::Reprobado);
    }

    #[test]
    fn test_graduation_stamps_evaluation_instant() {
        let calc = OutcomeCalculator::new(ClosurePolicy::default());
        let mut graduating = rules();
        if let Some(rule) = graduating.get_mut("G1") {
            rule.grade_to_id = None;
            rule.auto_graduate = true;
        }
        let snap = snapshot(vec![student("C", "G1", &[18.0, 20.0])]);

        let outcomes = calc.calculate(&snap, &graduating, now()).unwrap();
        assert_eq!(outcomes[0].outcome.graduated_at, Some(now()));
        assert_eq!(outcomes[0].outcome.promotion_grade_id, None);
        assert_eq!(outcomes[0].outcome.metadata["rule"]["auto_graduate"], true);
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let calc = OutcomeCalculator::new(ClosurePolicy::default());
        let snap = snapshot(vec![student("A", "G1", &[12.0, 8.0, 15.0])]);

        let first = calc.calculate(&snap, &rules(), now()).unwrap();
        let second = calc.calculate(&snap, &rules(), now()).unwrap();
        assert_eq!(first, second);
    }
}
