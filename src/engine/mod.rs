// ==========================================
// 学年结转引擎 - 引擎层
// ==========================================
// 职责: 实现结转业务规则,不拼 SQL
// 红线: 计算为纯函数；所有判定必须输出 reason
// ==========================================
// 依赖顺序（叶子在前）:
// grade_aggregator → transition_resolver → outcome_calculator
// readiness_gate → closure_validator → preview / closure_executor
// pending_resolver（结转后独立生命周期）
// ==========================================

pub mod closure_executor;
pub mod closure_validator;
pub mod error;
pub mod grade_aggregator;
pub mod outcome_calculator;
pub mod pending_resolver;
pub mod preview;
pub mod readiness_gate;
pub mod transition_resolver;

// 重导出核心引擎
pub use closure_executor::ClosureExecutor;
pub use closure_validator::ClosureValidator;
pub use error::{ClosureError, ClosureResult};
pub use grade_aggregator::{round2, AggregationContext, GradeAggregator};
pub use outcome_calculator::OutcomeCalculator;
pub use pending_resolver::PendingSubjectResolver;
pub use preview::PreviewCalculator;
pub use readiness_gate::{ClosureStatusResponse, ReadinessGate};
pub use transition_resolver::TransitionResolver;
