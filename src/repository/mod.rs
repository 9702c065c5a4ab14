// ==========================================
// 学年结转引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: *_tx 关联函数在调用方持有的连接/事务上执行
// ==========================================

pub mod academic_repo;
pub mod action_log_repo;
pub mod checklist_repo;
pub mod closure_repo;
pub mod error;
pub mod outcome_repo;
pub mod pending_subject_repo;
pub mod rule_repo;

// 重导出核心仓储
pub use academic_repo::{AcademicRepository, PlanPercentageTotal};
pub use action_log_repo::ActionLogRepository;
pub use checklist_repo::ChecklistRepository;
pub use closure_repo::ClosureRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use outcome_repo::OutcomeRepository;
pub use pending_subject_repo::PendingSubjectRepository;
pub use rule_repo::TransitionRuleRepository;
