// ==========================================
// 学年结转引擎 - 升级规则领域模型
// ==========================================
// 职责: SchoolPeriodTransitionRule 及其查找结果
// 约束: 每个 grade_from_id 恰好一条规则
// ==========================================

use crate::domain::types::OutcomeStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 成绩满分（20 分制）
pub const MAX_SCORE: f64 = 20.0;

// ==========================================
// TransitionRule - 升级规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub grade_from_id: String,
    pub grade_to_id: Option<String>, // 毕业年级为 None
    pub min_average: f64,
    pub max_pending_subjects: u8,
    pub auto_graduate: bool,
    pub updated_at: Option<NaiveDateTime>,
}

impl TransitionRule {
    /// 规则自身的合法性检查
    ///
    /// # 返回
    /// - Ok(()): 合法
    /// - Err(reason): 不合法原因
    pub fn check(&self) -> Result<(), String> {
        if self.grade_from_id.trim().is_empty() {
            return Err("grade_from_id 不能为空".to_string());
        }
        if !(0.0..=MAX_SCORE).contains(&self.min_average) {
            return Err(format!(
                "min_average={} 超出范围 [0, {}]",
                self.min_average, MAX_SCORE
            ));
        }
        if self.grade_to_id.as_deref() == Some(self.grade_from_id.as_str()) {
            return Err(format!("grade_to_id 不能等于 grade_from_id ({})", self.grade_from_id));
        }
        Ok(())
    }

    /// 非毕业年级必须配置升级目标
    pub fn is_missing_target(&self) -> bool {
        !self.auto_graduate && self.grade_to_id.is_none()
    }
}

// ==========================================
// RuleLookup - 规则查找结果
// ==========================================
// 用途: 校验器可以枚举所有缺失规则，而不是遇到第一个就失败
#[derive(Debug, Clone, PartialEq)]
pub enum RuleLookup {
    Found(TransitionRule),
    MissingRule(String),
}

impl RuleLookup {
    pub fn rule(&self) -> Option<&TransitionRule> {
        match self {
            RuleLookup::Found(rule) => Some(rule),
            RuleLookup::MissingRule(_) => None,
        }
    }
}

// ==========================================
// TransitionDecision - 规则判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub status: OutcomeStatus,
    pub promotion_grade_id: Option<String>,
    pub graduated: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> TransitionRule {
        TransitionRule {
            grade_from_id: "G1".to_string(),
            grade_to_id: Some("G2".to_string()),
            min_average: 10.0,
            max_pending_subjects: 2,
            auto_graduate: false,
            updated_at: None,
        }
    }

    #[test]
    fn test_rule_check() {
        assert!(rule().check().is_ok());

        let mut bad = rule();
        bad.min_average = 21.0;
        assert!(bad.check().is_err());

        let mut self_loop = rule();
        self_loop.grade_to_id = Some("G1".to_string());
        assert!(self_loop.check().is_err());
    }

    #[test]
    fn test_missing_target() {
        let mut r = rule();
        assert!(!r.is_missing_target());
        r.grade_to_id = None;
        assert!(r.is_missing_target());
        r.auto_graduate = true;
        assert!(!r.is_missing_target());
    }
}
