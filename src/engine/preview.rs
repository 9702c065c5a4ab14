// ==========================================
// 学年结转引擎 - 结转预览
// ==========================================
// 红线: 不写任何数据；与执行器共用 OutcomeCalculator
// ==========================================

use crate::config::closure_policy::ClosurePolicy;
use crate::domain::outcome::StudentOutcome;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::engine::outcome_calculator::OutcomeCalculator;
use crate::repository::{AcademicRepository, TransitionRuleRepository};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct PreviewCalculator {
    academic_repo: Arc<AcademicRepository>,
    rule_repo: Arc<TransitionRuleRepository>,
}

impl PreviewCalculator {
    pub fn new(academic_repo: Arc<AcademicRepository>, rule_repo: Arc<TransitionRuleRepository>) -> Self {
        Self {
            academic_repo,
            rule_repo,
        }
    }

    /// 按当前数据计算整个学年的结果（可重复、可并发调用）
    #[instrument(skip(self, policy))]
    pub fn calculate(&self, period_id: &str, policy: ClosurePolicy) -> ClosureResult<Vec<StudentOutcome>> {
        let snapshot = self
            .academic_repo
            .load_period_snapshot(period_id)?
            .ok_or_else(|| ClosureError::NotFound {
                entity: "SchoolPeriod".to_string(),
                id: period_id.to_string(),
            })?;
        let rules = self.rule_repo.find_all_indexed()?;

        let evaluated_at = snapshot.period.closing_instant();
        let outcomes = OutcomeCalculator::new(policy).calculate(&snapshot, &rules, evaluated_at)?;

        info!(students = outcomes.len(), "结转预览完成");
        Ok(outcomes)
    }
}
