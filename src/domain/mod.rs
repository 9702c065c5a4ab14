// ==========================================
// 学年结转引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod academic;
pub mod action_log;
pub mod checklist;
pub mod closure;
pub mod outcome;
pub mod rule;
pub mod types;

// 重导出核心类型
pub use academic::{
    CouncilPointInput, Inscription, InscriptionSubjectInput, PeriodSnapshot,
    QualificationInput, SchoolPeriod, StudentInput, Term,
};
pub use action_log::{ActionLog, ActionType};
pub use checklist::{ChecklistScope, ChecklistSummary, CouncilChecklist};
pub use closure::{
    ClosureExecutionResult, ClosureFailureKind, ClosureLogEntry, ClosureStats, PeriodClosure,
    StepStatus, ValidationReport,
};
pub use outcome::{PendingSubject, StudentOutcome, StudentPeriodOutcome, SubjectFinalGrade};
pub use rule::{RuleLookup, TransitionDecision, TransitionRule, MAX_SCORE};
pub use types::{
    ChecklistStatus, ClosureStatus, CouncilPointMode, OutcomeStatus, PendingSubjectStatus,
    SubjectGradeStatus,
};
