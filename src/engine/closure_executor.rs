// ==========================================
// 学年结转引擎 - 结转执行器
// ==========================================
// 状态机: draft → validating → closed | failed
// 红线:
// - 同一学年只能有一条 closed 记录（事务内复查）
// - 成绩/结果/新注册/欠科在同一个 IMMEDIATE 事务中写入，失败整体回滚
// - PeriodClosure 永不删除，失败尝试保留日志
// ==========================================

use crate::config::closure_policy::ClosurePolicy;
use crate::domain::academic::{Inscription, PeriodSnapshot};
use crate::domain::closure::{
    ClosureExecutionResult, ClosureFailureKind, ClosureLogEntry, ClosureStats, PeriodClosure,
    ValidationReport,
};
use crate::domain::outcome::{PendingSubject, StudentOutcome};
use crate::domain::types::{ClosureStatus, OutcomeStatus};
use crate::engine::closure_validator::ClosureValidator;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::engine::outcome_calculator::OutcomeCalculator;
use crate::repository::{
    AcademicRepository, ClosureRepository, OutcomeRepository, PendingSubjectRepository,
    RepositoryError, TransitionRuleRepository,
};
use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

// 日志步骤名
const STEP_START: &str = "start";
const STEP_VALIDATE: &str = "validate";
const STEP_COMPUTE: &str = "compute";
const STEP_PROMOTE: &str = "promote";
const STEP_COMMIT: &str = "commit";

pub struct ClosureExecutor {
    conn: Arc<Mutex<Connection>>,
    academic_repo: Arc<AcademicRepository>,
    closure_repo: Arc<ClosureRepository>,
    validator: Arc<ClosureValidator>,
}

impl ClosureExecutor {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        academic_repo: Arc<AcademicRepository>,
        closure_repo: Arc<ClosureRepository>,
        validator: Arc<ClosureValidator>,
    ) -> Self {
        Self {
            conn,
            academic_repo,
            closure_repo,
            validator,
        }
    }

    /// 执行学年结转
    ///
    /// # 返回
    /// - Ok(result): 结转完成或失败（失败时 success=false，尝试记录为 failed）
    /// - Err(Conflict): 学年已结转，不做任何写入
    /// - Err(NotFound): 学年不存在
    #[instrument(skip(self, initiated_by, policy, config_snapshot), fields(initiated_by = %initiated_by))]
    pub fn execute(
        &self,
        period_id: &str,
        initiated_by: &str,
        policy: ClosurePolicy,
        config_snapshot: JsonValue,
    ) -> ClosureResult<ClosureExecutionResult> {
        // ===== 1. 幂等保护 =====
        if let Some(closed) = self.closure_repo.find_closed_for_period(period_id)? {
            warn!(closure_id = %closed.id, "学年已结转，拒绝重复执行");
            return Err(ClosureError::Conflict {
                period_id: period_id.to_string(),
                closure_id: closed.id,
            });
        }
        if self.academic_repo.find_period(period_id)?.is_none() {
            return Err(ClosureError::NotFound {
                entity: "SchoolPeriod".to_string(),
                id: period_id.to_string(),
            });
        }

        let mut closure = PeriodClosure::new_draft(period_id, initiated_by);
        closure.push_log(ClosureLogEntry::ok(STEP_START, format!("{} 发起结转", initiated_by)));
        self.closure_repo.insert(&closure)?;
        info!(closure_id = %closure.id, "结转尝试已创建");

        // ===== 2. 前置校验 =====
        let report = match self.validator.validate(period_id) {
            Ok(report) => report,
            Err(e) => return self.fail(closure, e, Vec::new()),
        };
        if !report.valid {
            return self.fail_validation(closure, report);
        }

        closure.status = ClosureStatus::Validating;
        let validate_entry = if report.warnings.is_empty() {
            ClosureLogEntry::ok(STEP_VALIDATE, "前置校验通过")
        } else {
            ClosureLogEntry::warning(
                STEP_VALIDATE,
                format!("前置校验通过，{} 条告警", report.warnings.len()),
            )
            .with_details(&report.warnings)
        };
        closure.push_log(validate_entry);
        self.closure_repo.update(&closure)?;

        // ===== 3-6. 事务内计算与写入 =====
        match self.commit_in_transaction(&mut closure, policy, config_snapshot) {
            Ok(stats) => {
                info!(
                    closure_id = %closure.id,
                    students = stats.students_processed,
                    inscriptions = stats.inscriptions_created,
                    pending = stats.pending_subjects_created,
                    "学年结转完成"
                );
                Ok(ClosureExecutionResult {
                    success: true,
                    closure_id: closure.id.clone(),
                    stats: Some(stats),
                    errors: Vec::new(),
                    warnings: report.warnings,
                    failure_kind: None,
                    log: closure.log,
                })
            }
            Err(e) => self.fail(closure, e, report.warnings),
        }
    }

    /// 单个 IMMEDIATE 事务: 复查幂等 → 读快照 → 计算 → 写入 → closed → 提交
    ///
    /// 持有连接锁期间只能调用 *_tx 函数
    fn commit_in_transaction(
        &self,
        closure: &mut PeriodClosure,
        policy: ClosurePolicy,
        config_snapshot: JsonValue,
    ) -> ClosureResult<ClosureStats> {
        let started = Instant::now();
        let period_id = closure.school_period_id.clone();

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ClosureError::Persistence(format!("无法开启写事务: {}", e)))?;

        if let Some(closed) = ClosureRepository::find_closed_for_period_tx(&tx, &period_id)? {
            return Err(ClosureError::Conflict {
                period_id,
                closure_id: closed.id,
            });
        }

        let snapshot = AcademicRepository::load_period_snapshot_tx(&tx, &period_id)?.ok_or_else(
            || ClosureError::NotFound {
                entity: "SchoolPeriod".to_string(),
                id: period_id.clone(),
            },
        )?;
        let rules = TransitionRuleRepository::find_all_indexed_tx(&tx)?;
        let next_period = AcademicRepository::find_next_period_tx(&tx, &period_id)?;

        // ===== 计算 =====
        let evaluated_at = snapshot.period.closing_instant();
        let outcomes = OutcomeCalculator::new(policy).calculate(&snapshot, &rules, evaluated_at)?;

        // 事务内日志先暂存，提交成功后才并入 closure.log
        let mut staged_log = Vec::new();
        let mut stats = ClosureStats::default();
        for student in &outcomes {
            stats.subjects_finalized +=
                OutcomeRepository::upsert_final_grades_tx(&tx, &closure.id, &student.subjects)?;
            OutcomeRepository::upsert_outcome_tx(&tx, &closure.id, &student.outcome)?;
            stats.record_outcome(student.outcome.status, student.outcome.is_graduated());
        }
        staged_log.push(
            ClosureLogEntry::ok(
                STEP_COMPUTE,
                format!("已写入 {} 名学生的期末成绩与学年结果", stats.students_processed),
            )
            .with_details(&json!({
                "aprobado": stats.aprobado,
                "materias_pendientes": stats.materias_pendientes,
                "reprobado": stats.reprobado,
                "graduated": stats.graduated,
            })),
        );

        // ===== 升级: 新学年注册 + 欠科 =====
        if !outcomes.is_empty() {
            let next_period_id = next_period
                .as_ref()
                .map(|p| p.id.clone())
                .ok_or_else(|| {
                    ClosureError::Computation(format!("学年 {} 之后不存在下一学年", period_id))
                })?;
            let created_at = chrono::Utc::now().naive_utc();
            Self::promote_students(&tx, &snapshot, &outcomes, &next_period_id, created_at, &mut stats)?;
            staged_log.push(ClosureLogEntry::ok(
                STEP_PROMOTE,
                format!(
                    "已在学年 {} 生成 {} 条注册、{} 门欠科",
                    next_period_id, stats.inscriptions_created, stats.pending_subjects_created
                ),
            ));
        }

        // ===== 超时检查 =====
        let elapsed = started.elapsed();
        if elapsed > policy.commit_timeout() {
            return Err(ClosureError::Timeout {
                elapsed_ms: elapsed.as_millis(),
                limit_ms: policy.closure_timeout_ms,
            });
        }

        // ===== 提交 =====
        let mut committed = closure.clone();
        committed.status = ClosureStatus::Closed;
        committed.finished_at = Some(chrono::Utc::now().naive_utc());
        committed.snapshot = Some(json!({
            "stats": stats,
            "policy": policy,
            "config": config_snapshot,
            "next_period_id": next_period.map(|p| p.id),
        }));
        for entry in staged_log {
            committed.push_log(entry);
        }
        committed.push_log(ClosureLogEntry::ok(STEP_COMMIT, "事务已提交"));
        ClosureRepository::update_tx(&tx, &committed)?;

        tx.commit()
            .map_err(|e| ClosureError::Persistence(format!("事务提交失败: {}", e)))?;

        *closure = committed;
        Ok(stats)
    }

    /// 按学年结果生成下一学年注册与欠科
    ///
    /// - aprobado: 升至 promotion_grade_id；毕业学生不再注册
    /// - materias_pendientes: 升至 promotion_grade_id + 每门不及格科目一条欠科
    /// - reprobado: 原年级重读 (is_repeater = true)
    fn promote_students(
        tx: &Transaction,
        snapshot: &PeriodSnapshot,
        outcomes: &[StudentOutcome],
        next_period_id: &str,
        created_at: NaiveDateTime,
        stats: &mut ClosureStats,
    ) -> ClosureResult<()> {
        let inscriptions: HashMap<&str, &Inscription> = snapshot
            .students
            .iter()
            .map(|s| (s.inscription.id.as_str(), &s.inscription))
            .collect();

        for student in outcomes {
            let outcome = &student.outcome;
            if outcome.is_graduated() {
                continue;
            }

            let origin = inscriptions
                .get(outcome.inscription_id.as_str())
                .ok_or_else(|| ClosureError::NotFound {
                    entity: "Inscription".to_string(),
                    id: outcome.inscription_id.clone(),
                })?;
            let grade_id = outcome.promotion_grade_id.clone().ok_or_else(|| {
                ClosureError::Computation(format!(
                    "注册 {} 的学年结果缺少升级目标年级",
                    outcome.inscription_id
                ))
            })?;

            let new_inscription = Inscription {
                id: uuid::Uuid::new_v4().to_string(),
                person_id: origin.person_id.clone(),
                school_period_id: next_period_id.to_string(),
                grade_id,
                section_id: None,
                escolaridad: origin.escolaridad.clone(),
                is_repeater: outcome.status == OutcomeStatus::Reprobado,
                origin_period_id: Some(snapshot.period.id.clone()),
            };
            AcademicRepository::insert_inscription_tx(tx, &new_inscription)?;
            stats.inscriptions_created += 1;

            if outcome.status == OutcomeStatus::MateriasPendientes {
                for failed in student.failed_subject_grades() {
                    let pending = PendingSubject::new_pending(
                        &new_inscription.id,
                        &failed.subject_id,
                        &snapshot.period.id,
                        Some(&failed.inscription_subject_id),
                        created_at,
                    );
                    PendingSubjectRepository::insert_tx(tx, &pending)?;
                    stats.pending_subjects_created += 1;
                }
            }
        }
        Ok(())
    }

    /// 校验失败: 记录 failed，返回问题清单
    fn fail_validation(
        &self,
        mut closure: PeriodClosure,
        report: ValidationReport,
    ) -> ClosureResult<ClosureExecutionResult> {
        warn!(
            closure_id = %closure.id,
            errors = report.errors.len(),
            "前置校验未通过，结转终止"
        );
        closure.status = ClosureStatus::Failed;
        closure.finished_at = Some(chrono::Utc::now().naive_utc());
        closure.push_log(
            ClosureLogEntry::failed(
                STEP_VALIDATE,
                format!("前置校验未通过: {} 条错误", report.errors.len()),
            )
            .with_details(&report),
        );
        self.closure_repo.update(&closure)?;

        Ok(ClosureExecutionResult {
            success: false,
            closure_id: closure.id.clone(),
            stats: None,
            errors: report.errors,
            warnings: report.warnings,
            failure_kind: Some(ClosureFailureKind::Validation),
            log: closure.log,
        })
    }

    /// 事务失败（已回滚）: 记录 failed
    ///
    /// 事务内发现的并发结转仍以 Conflict 返回
    fn fail(
        &self,
        mut closure: PeriodClosure,
        err: ClosureError,
        warnings: Vec<String>,
    ) -> ClosureResult<ClosureExecutionResult> {
        error!(closure_id = %closure.id, error = %err, "结转失败，事务已回滚");

        closure.status = ClosureStatus::Failed;
        closure.finished_at = Some(chrono::Utc::now().naive_utc());
        closure.snapshot = None;
        closure.push_log(ClosureLogEntry::failed(STEP_COMMIT, err.to_string()));
        self.closure_repo.update(&closure)?;

        if matches!(err, ClosureError::Conflict { .. }) {
            return Err(err);
        }

        Ok(ClosureExecutionResult {
            success: false,
            closure_id: closure.id.clone(),
            stats: None,
            errors: vec![err.to_string()],
            warnings,
            failure_kind: Some(err.failure_kind()),
            log: closure.log,
        })
    }
}
