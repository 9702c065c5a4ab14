// ==========================================
// 学年结转引擎 - 结转策略参数
// ==========================================
// 职责: 一次结转/预览所用的全部可配置参数
// 存储: config_kv 各键（见 config_keys）
// ==========================================

use crate::domain::types::CouncilPointMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认及格线（20 分制）
pub const DEFAULT_PASSING_SCORE: f64 = 10.0;

/// 默认事务超时（毫秒）
pub const DEFAULT_CLOSURE_TIMEOUT_MS: u64 = 60_000;

// ==========================================
// ClosurePolicy - 结转策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosurePolicy {
    pub passing_score: f64,
    pub council_point_mode: CouncilPointMode,
    pub closure_timeout_ms: u64,
}

impl ClosurePolicy {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.closure_timeout_ms)
    }
}

impl Default for ClosurePolicy {
    fn default() -> Self {
        Self {
            passing_score: DEFAULT_PASSING_SCORE,
            council_point_mode: CouncilPointMode::default(),
            closure_timeout_ms: DEFAULT_CLOSURE_TIMEOUT_MS,
        }
    }
}
