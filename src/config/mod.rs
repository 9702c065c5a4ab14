// ==========================================
// 学年结转引擎 - 配置层
// ==========================================
// 职责: 结转参数管理（及格线、评议加分口径、事务超时）
// 存储: config_kv 表
// ==========================================

pub mod closure_config_trait;
pub mod closure_policy;
pub mod config_manager;

// 重导出核心配置管理器
pub use closure_config_trait::ClosureConfigReader;
pub use closure_policy::ClosurePolicy;
pub use config_manager::{config_keys, ConfigManager};
