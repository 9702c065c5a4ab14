// ==========================================
// 学年结转引擎 - 结转尝试领域模型
// ==========================================
// 职责: PeriodClosure（审计轨迹）、步骤日志、统计快照、校验报告
// 红线: PeriodClosure 永不删除，每次重试都新增一行
// ==========================================

use crate::domain::types::{ClosureStatus, OutcomeStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// StepStatus - 步骤结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Warning,
    Failed,
}

// ==========================================
// ClosureLogEntry - 结转步骤日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureLogEntry {
    pub step: String,
    pub status: StepStatus,
    pub message: String,
    pub at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ClosureLogEntry {
    pub fn ok(step: &str, message: impl Into<String>) -> Self {
        Self::with_status(step, StepStatus::Ok, message)
    }

    pub fn warning(step: &str, message: impl Into<String>) -> Self {
        Self::with_status(step, StepStatus::Warning, message)
    }

    pub fn failed(step: &str, message: impl Into<String>) -> Self {
        Self::with_status(step, StepStatus::Failed, message)
    }

    fn with_status(step: &str, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            status,
            message: message.into(),
            at: chrono::Utc::now().naive_utc(),
            details: None,
        }
    }

    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }
}

// ==========================================
// ClosureStats - 结转统计（写入 snapshot）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureStats {
    pub students_processed: usize,
    pub aprobado: usize,
    pub materias_pendientes: usize,
    pub reprobado: usize,
    pub graduated: usize,
    pub subjects_finalized: usize,
    pub inscriptions_created: usize,
    pub pending_subjects_created: usize,
}

impl ClosureStats {
    pub fn record_outcome(&mut self, status: OutcomeStatus, graduated: bool) {
        self.students_processed += 1;
        match status {
            OutcomeStatus::Aprobado => self.aprobado += 1,
            OutcomeStatus::MateriasPendientes => self.materias_pendientes += 1,
            OutcomeStatus::Reprobado => self.reprobado += 1,
        }
        if graduated {
            self.graduated += 1;
        }
    }
}

// ==========================================
// PeriodClosure - 结转尝试
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodClosure {
    pub id: String,
    pub school_period_id: String,
    pub status: ClosureStatus,
    pub initiated_by: String,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub log: Vec<ClosureLogEntry>,
    pub snapshot: Option<JsonValue>,
}

impl PeriodClosure {
    /// 新建草稿状态的结转尝试
    pub fn new_draft(school_period_id: &str, initiated_by: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            school_period_id: school_period_id.to_string(),
            status: ClosureStatus::Draft,
            initiated_by: initiated_by.to_string(),
            started_at: chrono::Utc::now().naive_utc(),
            finished_at: None,
            log: Vec::new(),
            snapshot: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == ClosureStatus::Closed
    }

    pub fn push_log(&mut self, entry: ClosureLogEntry) {
        self.log.push(entry);
    }
}

// ==========================================
// ValidationReport - 结转前置校验报告
// ==========================================
// valid 当且仅当 errors 为空；warnings 不阻断执行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

// ==========================================
// ClosureFailureKind - 失败分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureFailureKind {
    Validation,
    Computation,
    Persistence,
    Timeout,
}

// ==========================================
// ClosureExecutionResult - 执行结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureExecutionResult {
    pub success: bool,
    pub closure_id: String,
    pub stats: Option<ClosureStats>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub failure_kind: Option<ClosureFailureKind>,
    pub log: Vec<ClosureLogEntry>,
}
