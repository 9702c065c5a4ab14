// ==========================================
// 学年结转引擎 - 核对清单 / 就绪门禁
// ==========================================
// 职责: 维护 (年级, 班级, 学期) 的评议核对状态，汇总结转就绪度
// 规则:
// - total = 学年内已分班的 (年级, 班级) 组合 × 学期数
// - 已结转学年的核对条目不可再修改
// ==========================================

use crate::domain::checklist::{ChecklistScope, ChecklistSummary, CouncilChecklist};
use crate::domain::closure::PeriodClosure;
use crate::domain::types::ChecklistStatus;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::repository::{AcademicRepository, ChecklistRepository, ClosureRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

// ==========================================
// ClosureStatusResponse - 学年结转状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureStatusResponse {
    pub school_period_id: String,
    pub checklist: ChecklistSummary,
    pub terms_total: usize,
    pub terms_blocked: usize,
    pub is_closed: bool,
    pub last_closure: Option<PeriodClosure>,
}

impl ClosureStatusResponse {
    pub fn all_terms_blocked(&self) -> bool {
        self.terms_blocked == self.terms_total
    }
}

// ==========================================
// ReadinessGate
// ==========================================
pub struct ReadinessGate {
    academic_repo: Arc<AcademicRepository>,
    checklist_repo: Arc<ChecklistRepository>,
    closure_repo: Arc<ClosureRepository>,
}

impl ReadinessGate {
    pub fn new(
        academic_repo: Arc<AcademicRepository>,
        checklist_repo: Arc<ChecklistRepository>,
        closure_repo: Arc<ClosureRepository>,
    ) -> Self {
        Self {
            academic_repo,
            checklist_repo,
            closure_repo,
        }
    }

    /// 新增或更新核对条目
    ///
    /// # 错误
    /// - Validation: 范围字段为空
    /// - NotFound: 学年不存在
    /// - Conflict: 学年已结转
    #[instrument(skip(self, scope, status), fields(
        period_id = %scope.school_period_id,
        grade_id = %scope.grade_id,
        section_id = %scope.section_id,
        term_id = %scope.term_id,
        status = %status
    ))]
    pub fn upsert_entry(
        &self,
        scope: &ChecklistScope,
        status: ChecklistStatus,
        actor: &str,
    ) -> ClosureResult<CouncilChecklist> {
        if let Some(field) = scope.first_blank_field() {
            return Err(ClosureError::Validation {
                errors: vec![format!("核对范围字段 {} 不能为空", field)],
            });
        }
        self.ensure_period_exists(&scope.school_period_id)?;

        if let Some(closed) = self.closure_repo.find_closed_for_period(&scope.school_period_id)? {
            return Err(ClosureError::Conflict {
                period_id: scope.school_period_id.clone(),
                closure_id: closed.id,
            });
        }

        let entry = self.checklist_repo.upsert(scope, status, actor)?;
        info!(checklist_id = %entry.id, actor, "核对条目已更新");
        Ok(entry)
    }

    /// 汇总学年核对进度
    pub fn summarize(&self, period_id: &str) -> ClosureResult<ChecklistSummary> {
        let terms = self.academic_repo.find_terms(period_id)?;
        let grade_sections = self.academic_repo.find_grade_sections(period_id)?;
        let entries: HashMap<ChecklistScope, ChecklistStatus> = self
            .checklist_repo
            .find_by_period(period_id)?
            .into_iter()
            .map(|e| (e.scope, e.status))
            .collect();

        let mut summary = ChecklistSummary::default();
        for (grade_id, section_id) in &grade_sections {
            for term in &terms {
                let scope = ChecklistScope::new(period_id, grade_id, section_id, &term.id);
                summary.total += 1;
                match entries.get(&scope) {
                    Some(ChecklistStatus::Done) => summary.done += 1,
                    Some(ChecklistStatus::InReview) => summary.in_review += 1,
                    Some(ChecklistStatus::Open) => summary.open += 1,
                    None => summary.missing.push(scope),
                }
            }
        }
        Ok(summary)
    }

    /// 学年结转状态（核对进度、学期锁定、最近一次结转）
    #[instrument(skip(self))]
    pub fn status(&self, period_id: &str) -> ClosureResult<ClosureStatusResponse> {
        self.ensure_period_exists(period_id)?;

        let terms = self.academic_repo.find_terms(period_id)?;
        let checklist = self.summarize(period_id)?;
        let is_closed = self.closure_repo.find_closed_for_period(period_id)?.is_some();
        let last_closure = self.closure_repo.find_latest_for_period(period_id)?;

        Ok(ClosureStatusResponse {
            school_period_id: period_id.to_string(),
            checklist,
            terms_total: terms.len(),
            terms_blocked: terms.iter().filter(|t| t.is_blocked).count(),
            is_closed,
            last_closure,
        })
    }

    fn ensure_period_exists(&self, period_id: &str) -> ClosureResult<()> {
        match self.academic_repo.find_period(period_id)? {
            Some(_) => Ok(()),
            None => Err(ClosureError::NotFound {
                entity: "SchoolPeriod".to_string(),
                id: period_id.to_string(),
            }),
        }
    }
}
