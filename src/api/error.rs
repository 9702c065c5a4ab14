// ==========================================
// 学年结转引擎 - API层错误类型
// ==========================================
// 职责: 将 Repository / 引擎错误转换为调用方可理解的错误
// 要求: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::ClosureError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 结转错误
    // ==========================================
    /// 前置校验未通过（操作员可修正）
    #[error("数据验证失败: {}", errors.join("; "))]
    ValidationError { errors: Vec<String> },

    #[error("成绩计算失败: {0}")]
    ComputationError(String),

    /// 学年已结转
    #[error("学年已结转: period_id={period_id}, closure_id={closure_id}")]
    Conflict {
        period_id: String,
        closure_id: String,
    },

    #[error("结转超时: {0}")]
    Timeout(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ClosureError 转换
// ==========================================
impl From<ClosureError> for ApiError {
    fn from(err: ClosureError) -> Self {
        match err {
            ClosureError::Validation { errors } => ApiError::ValidationError { errors },
            ClosureError::Computation(msg) => ApiError::ComputationError(msg),
            ClosureError::Conflict {
                period_id,
                closure_id,
            } => ApiError::Conflict {
                period_id,
                closure_id,
            },
            ClosureError::Persistence(msg) => ApiError::DatabaseTransactionError(msg),
            timeout @ ClosureError::Timeout { .. } => ApiError::Timeout(timeout.to_string()),
            ClosureError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            ClosureError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            ClosureError::Config(msg) => ApiError::ConfigError(msg),
            ClosureError::Repository(err) => ApiError::from(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_conversion() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "PeriodClosure".to_string(),
            id: "C1".to_string(),
        }
        .into();
        match err {
            ApiError::NotFound(msg) => assert_eq!(msg, "PeriodClosure(id=C1)不存在"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_conflict_conversion_keeps_ids() {
        let err: ApiError = ClosureError::Conflict {
            period_id: "P1".to_string(),
            closure_id: "C1".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ApiError::Conflict { ref period_id, ref closure_id } if period_id == "P1" && closure_id == "C1"
        ));
    }

    #[test]
    fn test_nested_repository_error_conversion() {
        let err: ApiError =
            ClosureError::Repository(RepositoryError::UniqueConstraintViolation("UNIQUE".to_string()))
                .into();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    }
}
