// ==========================================
// 学年结转引擎 - API 层
// ==========================================
// 职责: 提供结转业务接口（纯 serde 结构，无 CLI / GUI）
// ==========================================

pub mod closure_api;
pub mod error;

// 重导出核心类型
pub use closure_api::ClosureApi;
pub use error::{ApiError, ApiResult};
