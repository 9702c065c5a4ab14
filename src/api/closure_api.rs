// ==========================================
// 学年结转引擎 - 结转 API
// ==========================================
// 职责: 对外暴露结转子系统的全部操作，记录 ActionLog
// 红线: 学年ID显式传入，API 不持有“当前学年”
// ==========================================

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::closure_config_trait::ClosureConfigReader;
use crate::config::closure_policy::ClosurePolicy;
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::checklist::{ChecklistScope, CouncilChecklist};
use crate::domain::closure::{ClosureExecutionResult, PeriodClosure, ValidationReport};
use crate::domain::outcome::{PendingSubject, StudentOutcome};
use crate::domain::rule::{RuleLookup, TransitionRule};
use crate::domain::types::{ChecklistStatus, PendingSubjectStatus};
use crate::engine::{
    ClosureExecutor, ClosureStatusResponse, ClosureValidator, PendingSubjectResolver,
    PreviewCalculator, ReadinessGate,
};
use crate::repository::{ActionLogRepository, ClosureRepository, TransitionRuleRepository};

// ==========================================
// ClosureApi - 结转 API
// ==========================================

/// 结转API
///
/// 职责：
/// 1. 结转状态 / 核对清单
/// 2. 校验、预览、执行
/// 3. 欠科结清
/// 4. 升级规则与结转配置维护
/// 5. ActionLog记录
pub struct ClosureApi {
    gate: Arc<ReadinessGate>,
    validator: Arc<ClosureValidator>,
    preview: Arc<PreviewCalculator>,
    executor: Arc<ClosureExecutor>,
    pending_resolver: Arc<PendingSubjectResolver>,
    rule_repo: Arc<TransitionRuleRepository>,
    closure_repo: Arc<ClosureRepository>,
    config_manager: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ClosureApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: Arc<ReadinessGate>,
        validator: Arc<ClosureValidator>,
        preview: Arc<PreviewCalculator>,
        executor: Arc<ClosureExecutor>,
        pending_resolver: Arc<PendingSubjectResolver>,
        rule_repo: Arc<TransitionRuleRepository>,
        closure_repo: Arc<ClosureRepository>,
        config_manager: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            gate,
            validator,
            preview,
            executor,
            pending_resolver,
            rule_repo,
            closure_repo,
            config_manager,
            action_log_repo,
        }
    }

    // ==========================================
    // 状态与核对清单
    // ==========================================

    /// 查询学年结转状态
    pub fn get_closure_status(&self, period_id: &str) -> ApiResult<ClosureStatusResponse> {
        ensure_not_blank("学年ID", period_id)?;
        Ok(self.gate.status(period_id)?)
    }

    /// 新增或更新核对条目
    ///
    /// # 参数
    /// - scope: (学年, 年级, 班级, 学期)
    /// - status: 核对状态
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Ok(CouncilChecklist): 更新后的条目
    /// - Err(ApiError::Conflict): 学年已结转
    pub fn upsert_checklist_entry(
        &self,
        scope: &ChecklistScope,
        status: ChecklistStatus,
        actor: &str,
    ) -> ApiResult<CouncilChecklist> {
        ensure_not_blank("操作人", actor)?;

        let entry = self.gate.upsert_entry(scope, status, actor)?;

        let log = ActionLog::new(ActionType::ChecklistUpsert, actor)
            .with_period(&scope.school_period_id)
            .with_target(&entry.id)
            .with_payload(&json!({
                "grade_id": scope.grade_id,
                "section_id": scope.section_id,
                "term_id": scope.term_id,
                "status": status.as_str(),
            }));
        self.action_log_repo.insert(&log)?;

        Ok(entry)
    }

    // ==========================================
    // 校验 / 预览 / 执行
    // ==========================================

    /// 结转前置校验（只读）
    pub async fn validate_closure(&self, period_id: &str) -> ApiResult<ValidationReport> {
        ensure_not_blank("学年ID", period_id)?;
        Ok(self.validator.validate(period_id)?)
    }

    /// 结转预览（只读，与执行结果一致）
    pub async fn calculate_preview(&self, period_id: &str) -> ApiResult<Vec<StudentOutcome>> {
        ensure_not_blank("学年ID", period_id)?;
        let policy = self.load_policy().await?;
        Ok(self.preview.calculate(period_id, policy)?)
    }

    /// 执行学年结转
    ///
    /// # 参数
    /// - period_id: 结转学年
    /// - initiated_by: 发起人
    ///
    /// # 返回
    /// - Ok(result): success=true 已结转；success=false 本次尝试失败（已记录）
    /// - Err(ApiError::Conflict): 学年已结转，未做任何写入
    pub async fn execute_closure(
        &self,
        period_id: &str,
        initiated_by: &str,
    ) -> ApiResult<ClosureExecutionResult> {
        ensure_not_blank("学年ID", period_id)?;
        ensure_not_blank("发起人", initiated_by)?;

        let policy = self.load_policy().await?;
        let config_snapshot = self
            .config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::ConfigError(format!("读取配置快照失败: {}", e)))?;

        let outcome = self
            .executor
            .execute(period_id, initiated_by, policy, config_snapshot);

        let log = ActionLog::new(ActionType::ClosureExecute, initiated_by).with_period(period_id);
        match &outcome {
            Ok(result) => {
                let log = log
                    .with_target(&result.closure_id)
                    .with_payload(&json!({
                        "success": result.success,
                        "stats": result.stats,
                        "failure_kind": result.failure_kind,
                        "errors": result.errors,
                    }));
                self.action_log_repo.insert(&log)?;
                if result.success {
                    info!(period_id, closure_id = %result.closure_id, "学年结转成功");
                } else {
                    warn!(period_id, closure_id = %result.closure_id, "学年结转失败");
                }
            }
            Err(e) => {
                self.action_log_repo
                    .insert(&log.with_detail(format!("结转被拒绝: {}", e)))?;
            }
        }

        Ok(outcome?)
    }

    // ==========================================
    // 欠科
    // ==========================================

    /// 登记欠科结果（aprobada / convalidada）
    pub fn resolve_pending_subject(
        &self,
        pending_subject_id: &str,
        status: PendingSubjectStatus,
        actor: &str,
    ) -> ApiResult<PendingSubject> {
        ensure_not_blank("欠科ID", pending_subject_id)?;
        ensure_not_blank("操作人", actor)?;

        let pending = self.pending_resolver.resolve(pending_subject_id, status, actor)?;

        let log = ActionLog::new(ActionType::PendingSubjectResolve, actor)
            .with_period(&pending.origin_period_id)
            .with_target(&pending.id)
            .with_payload(&json!({
                "subject_id": pending.subject_id,
                "new_inscription_id": pending.new_inscription_id,
                "status": status.as_str(),
            }));
        self.action_log_repo.insert(&log)?;

        Ok(pending)
    }

    /// 查询注册下的欠科
    pub fn list_pending_subjects(&self, inscription_id: &str) -> ApiResult<Vec<PendingSubject>> {
        ensure_not_blank("注册ID", inscription_id)?;
        Ok(self.pending_resolver.list_for_inscription(inscription_id)?)
    }

    // ==========================================
    // 升级规则
    // ==========================================

    /// 新增或覆盖升级规则
    pub fn upsert_transition_rule(&self, rule: &TransitionRule, actor: &str) -> ApiResult<()> {
        ensure_not_blank("操作人", actor)?;
        rule.check().map_err(ApiError::InvalidInput)?;

        self.rule_repo.upsert(rule)?;

        let log = ActionLog::new(ActionType::TransitionRuleUpsert, actor)
            .with_target(&rule.grade_from_id)
            .with_payload(rule);
        self.action_log_repo.insert(&log)?;

        info!(grade_from_id = %rule.grade_from_id, actor, "升级规则已更新");
        Ok(())
    }

    pub fn list_transition_rules(&self) -> ApiResult<Vec<TransitionRule>> {
        Ok(self.rule_repo.find_all()?)
    }

    pub fn find_rule(&self, grade_from_id: &str) -> ApiResult<RuleLookup> {
        ensure_not_blank("年级ID", grade_from_id)?;
        Ok(self.rule_repo.lookup(grade_from_id)?)
    }

    // ==========================================
    // 结转历史
    // ==========================================

    /// 学年的全部结转尝试（最新在前）
    pub fn list_closures(&self, period_id: &str) -> ApiResult<Vec<PeriodClosure>> {
        ensure_not_blank("学年ID", period_id)?;
        Ok(self.closure_repo.find_by_period(period_id)?)
    }

    pub fn get_closure(&self, closure_id: &str) -> ApiResult<PeriodClosure> {
        ensure_not_blank("结转ID", closure_id)?;
        self.closure_repo
            .find_by_id(closure_id)?
            .ok_or_else(|| ApiError::NotFound(format!("PeriodClosure(id={})不存在", closure_id)))
    }

    // ==========================================
    // 配置
    // ==========================================

    /// 当前生效的结转参数
    pub async fn get_closure_policy(&self) -> ApiResult<ClosurePolicy> {
        self.load_policy().await
    }

    /// 更新全局配置
    pub fn update_config(&self, key: &str, value: &str, actor: &str) -> ApiResult<()> {
        ensure_not_blank("配置键", key)?;
        ensure_not_blank("操作人", actor)?;

        let previous = self
            .config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        self.config_manager
            .set_global_config_value(key, value)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let log = ActionLog::new(ActionType::ConfigUpdate, actor)
            .with_target(key)
            .with_payload(&json!({ "old_value": previous, "new_value": value }));
        self.action_log_repo.insert(&log)?;

        info!(config_key = key, actor, "配置已更新");
        Ok(())
    }

    async fn load_policy(&self) -> ApiResult<ClosurePolicy> {
        self.config_manager
            .get_closure_policy()
            .await
            .map_err(|e| ApiError::ConfigError(format!("读取结转参数失败: {}", e)))
    }
}

fn ensure_not_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}
