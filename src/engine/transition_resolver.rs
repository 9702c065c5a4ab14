// ==========================================
// 学年结转引擎 - 升级规则判定引擎
// ==========================================
// 输入: 年级规则 + 学年平均分 + 不及格科目数
// 输出: aprobado / materias_pendientes / reprobado + 升级目标年级
// 规则（顺序执行，命中即返回）:
// 1) auto_graduate 且 failed = 0 且 average ≥ min_average → aprobado，毕业
// 2) failed = 0 且 average ≥ min_average → aprobado，升至 grade_to
// 3) 0 < failed ≤ max_pending_subjects → materias_pendientes，升至 grade_to
// 4) 其他 → reprobado，留在 grade_from
// 边界: 两个比较均为闭区间
// ==========================================

use crate::domain::rule::{TransitionDecision, TransitionRule};
use crate::domain::types::OutcomeStatus;
use crate::engine::grade_aggregator::score_gte;

pub struct TransitionResolver;

impl TransitionResolver {
    pub fn new() -> Self {
        Self
    }

    /// 按规则判定学年结果
    ///
    /// 毕业年级 (grade_to_id = None) 的 materias_pendientes 学生
    /// 留在原年级补考，promotion_grade_id 回落为 grade_from_id
    pub fn resolve(&self, rule: &TransitionRule, average: f64, failed: u8) -> TransitionDecision {
        let average_ok = score_gte(average, rule.min_average);

        if failed == 0 && average_ok {
            if rule.auto_graduate {
                return TransitionDecision {
                    status: OutcomeStatus::Aprobado,
                    promotion_grade_id: None,
                    graduated: true,
                    reason: format!(
                        "GRADUATED: failed=0, average={:.2} >= min_average={:.2}",
                        average, rule.min_average
                    ),
                };
            }
            return TransitionDecision {
                status: OutcomeStatus::Aprobado,
                promotion_grade_id: rule.grade_to_id.clone(),
                graduated: false,
                reason: format!(
                    "PROMOTED: failed=0, average={:.2} >= min_average={:.2}",
                    average, rule.min_average
                ),
            };
        }

        if failed > 0 && failed <= rule.max_pending_subjects {
            return TransitionDecision {
                status: OutcomeStatus::MateriasPendientes,
                promotion_grade_id: Some(
                    rule.grade_to_id
                        .clone()
                        .unwrap_or_else(|| rule.grade_from_id.clone()),
                ),
                graduated: false,
                reason: format!(
                    "PENDING_SUBJECTS: failed={} <= max_pending_subjects={}",
                    failed, rule.max_pending_subjects
                ),
            };
        }

        let reason = if failed > rule.max_pending_subjects {
            format!(
                "RETAINED: failed={} > max_pending_subjects={}",
                failed, rule.max_pending_subjects
            )
        } else {
            format!(
                "RETAINED: average={:.2} < min_average={:.2}",
                average, rule.min_average
            )
        };
        TransitionDecision {
            status: OutcomeStatus::Reprobado,
            promotion_grade_id: Some(rule.grade_from_id.clone()),
            graduated: false,
            reason,
        }
    }
}

impl Default for TransitionResolver {
    fn default() -> Self {
        Self::new()
    }
}
