// ==========================================
// 学年结转引擎 - 科目成绩汇总引擎
// ==========================================
// 职责: 单科多次评价成绩 + 评议加分 → 一个期末成绩
// 公式: raw = Σ(score × percentage / 100)
//       final = raw + council_points
// 精度: 四舍五入到 2 位小数 (DECIMAL(5,2))
// 红线: 评价计划缺失的成绩不得静默跳过
// ==========================================

use crate::config::closure_policy::ClosurePolicy;
use crate::domain::academic::InscriptionSubjectInput;
use crate::domain::outcome::SubjectFinalGrade;
use crate::domain::types::{CouncilPointMode, SubjectGradeStatus};
use crate::engine::error::{ClosureError, ClosureResult};
use std::collections::BTreeSet;

/// 分数比较容差
pub const SCORE_EPSILON: f64 = 1e-9;

/// 四舍五入到 2 位小数（half-up）
///
/// 先加一个远小于 0.005 的偏移，抵消 11.665 这类值的二进制表示误差
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    (scaled + scaled.signum() * 1e-7).round() / 100.0
}

/// a >= b（含容差）
pub fn score_gte(a: f64, b: f64) -> bool {
    a + SCORE_EPSILON >= b
}

// ==========================================
// AggregationContext - 学年级别的汇总上下文
// ==========================================
#[derive(Debug, Clone)]
pub struct AggregationContext<'a> {
    pub term_ids: BTreeSet<&'a str>,
    pub closing_term_id: Option<&'a str>,
}

// ==========================================
// GradeAggregator
// ==========================================
pub struct GradeAggregator {
    passing_score: f64,
    council_point_mode: CouncilPointMode,
}

impl GradeAggregator {
    pub fn new(policy: &ClosurePolicy) -> Self {
        Self {
            passing_score: policy.passing_score,
            council_point_mode: policy.council_point_mode,
        }
    }

    /// 汇总单科期末成绩
    ///
    /// # 规则
    /// - 只计入评价计划属于本学年学期的成绩
    /// - 无成绩且无评议加分: raw = 0, reprobada（校验器另行告警）
    ///
    /// # 错误
    /// - Computation: 存在评价计划缺失的成绩
    pub fn aggregate(
        &self,
        subject: &InscriptionSubjectInput,
        ctx: &AggregationContext<'_>,
    ) -> ClosureResult<SubjectFinalGrade> {
        if let Some(orphan) = subject.qualifications.iter().find(|q| q.is_orphan()) {
            return Err(ClosureError::Computation(format!(
                "成绩 {} 引用的评价计划 {} 不存在 (inscription_subject={})",
                orphan.qualification_id, orphan.evaluation_plan_id, subject.inscription_subject_id
            )));
        }

        let weighted: f64 = subject
            .qualifications
            .iter()
            .filter_map(|q| match (q.term_id.as_deref(), q.percentage) {
                (Some(term_id), Some(pct)) if ctx.term_ids.contains(term_id) => {
                    Some(q.score * pct / 100.0)
                }
                _ => None,
            })
            .sum();
        let raw_score = round2(weighted);

        let council_points = round2(self.council_points(subject, ctx));
        let final_score = round2(raw_score + council_points);

        let status = if score_gte(final_score, self.passing_score) {
            SubjectGradeStatus::Aprobada
        } else {
            SubjectGradeStatus::Reprobada
        };

        Ok(SubjectFinalGrade {
            inscription_subject_id: subject.inscription_subject_id.clone(),
            subject_id: subject.subject_id.clone(),
            raw_score,
            council_points,
            final_score,
            status,
        })
    }

    fn council_points(&self, subject: &InscriptionSubjectInput, ctx: &AggregationContext<'_>) -> f64 {
        match self.council_point_mode {
            CouncilPointMode::FinalTerm => subject
                .council_points
                .iter()
                .filter(|cp| Some(cp.term_id.as_str()) == ctx.closing_term_id)
                .map(|cp| cp.points)
                .sum(),
            CouncilPointMode::AllTerms => subject
                .council_points
                .iter()
                .filter(|cp| ctx.term_ids.contains(cp.term_id.as_str()))
                .map(|cp| cp.points)
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::academic::{CouncilPointInput, QualificationInput};

    fn ctx() -> AggregationContext<'static> {
        AggregationContext {
            term_ids: ["T1", "T2", "T3"].into_iter().collect(),
            closing_term_id: Some("T3"),
        }
    }

    fn qual(id: &str, score: f64, pct: f64, term: &str) -> QualificationInput {
        QualificationInput {
            qualification_id: id.to_string(),
            evaluation_plan_id: format!("EP_{}", id),
            score,
            percentage: Some(pct),
            term_id: Some(term.to_string()),
        }
    }

    fn subject(quals: Vec<QualificationInput>, points: Vec<(&str, f64)>) -> InscriptionSubjectInput {
        InscriptionSubjectInput {
            inscription_subject_id: "IS1".to_string(),
            subject_id: "MAT".to_string(),
            subject_name: "Matemática".to_string(),
            qualifications: quals,
            council_points: points
                .into_iter()
                .map(|(term, p)| CouncilPointInput {
                    term_id: term.to_string(),
                    points: p,
                })
                .collect(),
        }
    }

    fn aggregator(mode: CouncilPointMode) -> GradeAggregator {
        GradeAggregator::new(&ClosurePolicy {
            council_point_mode: mode,
            ..ClosurePolicy::default()
        })
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(11.665), 11.67);
        assert_eq!(round2(35.0 / 3.0), 11.67);
        assert_eq!(round2(9.994), 9.99);
        assert_eq!(round2(9.995), 10.0);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_weighted_sum() {
        let input = subject(
            vec![qual("Q1", 12.0, 30.0, "T1"), qual("Q2", 15.0, 30.0, "T2"), qual("Q3", 9.0, 40.0, "T3")],
            vec![],
        );
        let grade = aggregator(CouncilPointMode::FinalTerm).aggregate(&input, &ctx()).unwrap();

        // 3.6 + 4.5 + 3.6
        assert_eq!(grade.raw_score, 11.7);
        assert_eq!(grade.final_score, 11.7);
        assert_eq!(grade.status, SubjectGradeStatus::Aprobada);
    }

    #[test]
    fn test_passing_boundary_is_inclusive() {
        let at_threshold = subject(vec![qual("Q1", 10.0, 100.0, "T1")], vec![]);
        let below = subject(vec![qual("Q1", 9.99, 100.0, "T1")], vec![]);
        let agg = aggregator(CouncilPointMode::FinalTerm);

        assert_eq!(agg.aggregate(&at_threshold, &ctx()).unwrap().status, SubjectGradeStatus::Aprobada);
        assert_eq!(agg.aggregate(&below, &ctx()).unwrap().status, SubjectGradeStatus::Reprobada);
    }

    #[test]
    fn test_council_points_final_term_only() {
        let input = subject(vec![qual("Q1", 9.0, 100.0, "T1")], vec![("T1", 2.0), ("T3", 1.0)]);
        let grade = aggregator(CouncilPointMode::FinalTerm).aggregate(&input, &ctx()).unwrap();

        assert_eq!(grade.council_points, 1.0);
        assert_eq!(grade.final_score, 10.0);
        assert_eq!(grade.status, SubjectGradeStatus::Aprobada);
    }

    #[test]
    fn test_council_points_all_terms() {
        let input = subject(
            vec![qual("Q1", 9.0, 100.0, "T1")],
            vec![("T1", 2.0), ("T3", 1.0), ("T_OTHER_PERIOD", 5.0)],
        );
        let grade = aggregator(CouncilPointMode::AllTerms).aggregate(&input, &ctx()).unwrap();

        assert_eq!(grade.council_points, 3.0);
        assert_eq!(grade.final_score, 12.0);
    }

    #[test]
    fn test_qualifications_outside_period_are_ignored() {
        let input = subject(
            vec![qual("Q1", 14.0, 100.0, "T1"), qual("Q2", 20.0, 100.0, "T_OTHER_PERIOD")],
            vec![],
        );
        let grade = aggregator(CouncilPointMode::FinalTerm).aggregate(&input, &ctx()).unwrap();
        assert_eq!(grade.raw_score, 14.0);
    }

    #[test]
    fn test_empty_subject_is_failed_with_zero() {
        let input = subject(vec![], vec![]);
        let grade = aggregator(CouncilPointMode::FinalTerm).aggregate(&input, &ctx()).unwrap();

        assert_eq!(grade.raw_score, 0.0);
        assert_eq!(grade.final_score, 0.0);
        assert_eq!(grade.status, SubjectGradeStatus::Reprobada);
    }

    #[test]
    fn test_orphan_qualification_is_computation_error() {
        let mut orphan = qual("Q1", 14.0, 100.0, "T1");
        orphan.percentage = None;
        orphan.term_id = None;
        let input = subject(vec![orphan], vec![]);

        let err = aggregator(CouncilPointMode::FinalTerm).aggregate(&input, &ctx()).unwrap_err();
        assert!(matches!(err, ClosureError::Computation(_)));
    }
}
