// ==========================================
// 学年结转引擎 - 核心库
// ==========================================
// 职责: 期末成绩结算、升留级判定、下学年注册与欠科登记
// 技术栈: Rust + SQLite
// 系统定位: 教务系统的学年结转子系统（人工发起、人工复核）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组合根
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ChecklistStatus, ClosureStatus, CouncilPointMode, OutcomeStatus, PendingSubjectStatus,
    SubjectGradeStatus,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, ChecklistScope, ChecklistSummary, ClosureExecutionResult,
    ClosureStats, CouncilChecklist, PendingSubject, PeriodClosure, StudentOutcome,
    StudentPeriodOutcome, SubjectFinalGrade, TransitionRule, ValidationReport,
};

// 引擎
pub use engine::{
    ClosureError, ClosureExecutor, ClosureValidator, GradeAggregator, OutcomeCalculator,
    PendingSubjectResolver, PreviewCalculator, ReadinessGate, TransitionResolver,
};

// API
pub use api::{ApiError, ApiResult, ClosureApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "学年结转引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
