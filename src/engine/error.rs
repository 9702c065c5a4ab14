// ==========================================
// 学年结转引擎 - 引擎层错误类型
// ==========================================
// 分类: 校验 / 计算 / 冲突 / 持久化 / 超时
// 所有错误均可由操作员修正后重试
// ==========================================

use crate::domain::closure::ClosureFailureKind;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClosureError {
    /// 前置校验未通过（操作员可修正的问题清单）
    #[error("结转前置校验未通过: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// 计算失败（如成绩对应的评价计划缺失）
    #[error("成绩计算失败: {0}")]
    Computation(String),

    /// 学年已结转
    #[error("学年已结转: period_id={period_id}, closure_id={closure_id}")]
    Conflict {
        period_id: String,
        closure_id: String,
    },

    /// 写入失败（事务已回滚）
    #[error("结转写入失败: {0}")]
    Persistence(String),

    #[error("结转超时: 已耗时 {elapsed_ms}ms, 上限 {limit_ms}ms")]
    Timeout { elapsed_ms: u128, limit_ms: u64 },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ClosureError {
    /// 执行器失败分类（写入 ClosureExecutionResult）
    pub fn failure_kind(&self) -> ClosureFailureKind {
        match self {
            ClosureError::Validation { .. } => ClosureFailureKind::Validation,
            ClosureError::Computation(_) => ClosureFailureKind::Computation,
            ClosureError::Timeout { .. } => ClosureFailureKind::Timeout,
            _ => ClosureFailureKind::Persistence,
        }
    }
}

pub type ClosureResult<T> = Result<T, ClosureError>;
