// ==========================================
// 学年结转引擎 - 结转前置校验
// ==========================================
// 红线: 只读；收集全部问题，不在第一个错误处停止
// ==========================================
// 错误（阻断执行）:
// - 学年已结转
// - 学期未全部锁定
// - 核对清单未全部完成
// - 年级缺少升级规则 / 非毕业规则缺少升级目标
// - 成绩引用的评价计划不存在
// - 有注册但不存在下一学年
// 告警（不阻断）:
// - 科目既无成绩也无评议加分
// - 注册没有任何科目
// - 评价计划权重合计不等于 100
// ==========================================

use crate::domain::academic::PeriodSnapshot;
use crate::domain::closure::ValidationReport;
use crate::domain::rule::RuleLookup;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::engine::readiness_gate::ReadinessGate;
use crate::repository::{AcademicRepository, ClosureRepository, TransitionRuleRepository};
use std::sync::Arc;
use tracing::{info, instrument};

const PERCENTAGE_TOLERANCE: f64 = 0.01;

pub struct ClosureValidator {
    academic_repo: Arc<AcademicRepository>,
    rule_repo: Arc<TransitionRuleRepository>,
    closure_repo: Arc<ClosureRepository>,
    gate: Arc<ReadinessGate>,
}

impl ClosureValidator {
    pub fn new(
        academic_repo: Arc<AcademicRepository>,
        rule_repo: Arc<TransitionRuleRepository>,
        closure_repo: Arc<ClosureRepository>,
        gate: Arc<ReadinessGate>,
    ) -> Self {
        Self {
            academic_repo,
            rule_repo,
            closure_repo,
            gate,
        }
    }

    /// 校验学年是否可以结转
    ///
    /// # 错误
    /// - NotFound: 学年不存在（其余问题都进入报告）
    #[instrument(skip(self))]
    pub fn validate(&self, period_id: &str) -> ClosureResult<ValidationReport> {
        let snapshot = self
            .academic_repo
            .load_period_snapshot(period_id)?
            .ok_or_else(|| ClosureError::NotFound {
                entity: "SchoolPeriod".to_string(),
                id: period_id.to_string(),
            })?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(closed) = self.closure_repo.find_closed_for_period(period_id)? {
            errors.push(format!("学年 {} 已结转 (closure_id={})", period_id, closed.id));
        }

        self.check_terms(&snapshot, &mut errors);
        self.check_checklist(period_id, &mut errors)?;
        self.check_rules(&snapshot, &mut errors)?;
        self.check_next_period(&snapshot, &mut errors)?;
        Self::check_grade_inputs(&snapshot, &mut errors, &mut warnings);
        self.check_plan_percentages(period_id, &mut warnings)?;

        let report = ValidationReport::from_findings(errors, warnings);
        info!(
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "结转前置校验完成"
        );
        Ok(report)
    }

    fn check_terms(&self, snapshot: &PeriodSnapshot, errors: &mut Vec<String>) {
        if snapshot.terms.is_empty() {
            errors.push(format!("学年 {} 没有任何学期", snapshot.period.id));
            return;
        }
        for term in snapshot.terms.iter().filter(|t| !t.is_blocked) {
            errors.push(format!("学期 {} (order={}) 尚未锁定", term.id, term.term_order));
        }
    }

    fn check_checklist(&self, period_id: &str, errors: &mut Vec<String>) -> ClosureResult<()> {
        let summary = self.gate.summarize(period_id)?;
        if !summary.is_complete() {
            errors.push(format!(
                "评议核对未完成: done={}/{} (in_review={}, open={}, missing={})",
                summary.done,
                summary.total,
                summary.in_review,
                summary.open,
                summary.missing.len()
            ));
        }
        Ok(())
    }

    fn check_rules(&self, snapshot: &PeriodSnapshot, errors: &mut Vec<String>) -> ClosureResult<()> {
        for grade_id in snapshot.grade_ids() {
            match self.rule_repo.lookup(&grade_id)? {
                RuleLookup::MissingRule(grade) => {
                    errors.push(format!("年级 {} 缺少升级规则", grade));
                }
                RuleLookup::Found(rule) if rule.is_missing_target() => {
                    errors.push(format!(
                        "年级 {} 的升级规则未配置 grade_to_id 且非自动毕业",
                        rule.grade_from_id
                    ));
                }
                RuleLookup::Found(_) => {}
            }
        }
        Ok(())
    }

    fn check_next_period(&self, snapshot: &PeriodSnapshot, errors: &mut Vec<String>) -> ClosureResult<()> {
        if snapshot.students.is_empty() {
            return Ok(());
        }
        if self.academic_repo.find_next_period(&snapshot.period.id)?.is_none() {
            errors.push(format!(
                "学年 {} 之后不存在下一学年，无法生成新学年注册",
                snapshot.period.id
            ));
        }
        Ok(())
    }

    fn check_grade_inputs(
        snapshot: &PeriodSnapshot,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        for student in &snapshot.students {
            let inscription_id = &student.inscription.id;
            if student.subjects.is_empty() {
                warnings.push(format!("注册 {} 没有任何科目", inscription_id));
                continue;
            }
            for subject in &student.subjects {
                if subject.has_no_inputs() {
                    warnings.push(format!(
                        "注册 {} 的科目 {} 没有任何成绩或评议加分，将按 0 分计",
                        inscription_id, subject.subject_id
                    ));
                }
                for q in subject.qualifications.iter().filter(|q| q.is_orphan()) {
                    errors.push(format!(
                        "成绩 {} 引用的评价计划 {} 不存在 (注册 {}, 科目 {})",
                        q.qualification_id, q.evaluation_plan_id, inscription_id, subject.subject_id
                    ));
                }
            }
        }
    }

    fn check_plan_percentages(&self, period_id: &str, warnings: &mut Vec<String>) -> ClosureResult<()> {
        for total in self.academic_repo.find_plan_percentage_totals(period_id)? {
            if (total.total_percentage - 100.0).abs() > PERCENTAGE_TOLERANCE {
                warnings.push(format!(
                    "科目 {} (班级 {}) 的评价计划权重合计为 {:.2}%，不等于 100%",
                    total.subject_id,
                    total.section_id.as_deref().unwrap_or("-"),
                    total.total_percentage
                ));
            }
        }
        Ok(())
    }
}
