// ==========================================
// 学年结转引擎 - 评议核对清单领域模型
// ==========================================
// 唯一键: (school_period_id, grade_id, section_id, term_id)
// ==========================================

use crate::domain::types::ChecklistStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ChecklistScope - 核对范围（年级/班级/学期）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChecklistScope {
    pub school_period_id: String,
    pub grade_id: String,
    pub section_id: String,
    pub term_id: String,
}

impl ChecklistScope {
    pub fn new(school_period_id: &str, grade_id: &str, section_id: &str, term_id: &str) -> Self {
        Self {
            school_period_id: school_period_id.to_string(),
            grade_id: grade_id.to_string(),
            section_id: section_id.to_string(),
            term_id: term_id.to_string(),
        }
    }

    /// 检查空字段，返回第一个为空的字段名
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("school_period_id", &self.school_period_id),
            ("grade_id", &self.grade_id),
            ("section_id", &self.section_id),
            ("term_id", &self.term_id),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}

// ==========================================
// CouncilChecklist - 核对条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilChecklist {
    pub id: String,
    #[serde(flatten)]
    pub scope: ChecklistScope,
    pub status: ChecklistStatus,
    pub completed_by: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// ChecklistSummary - 核对进度汇总
// ==========================================
// total: 学年结构应有的 (年级, 班级, 学期) 组合数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSummary {
    pub total: usize,
    pub done: usize,
    pub in_review: usize,
    pub open: usize,
    pub missing: Vec<ChecklistScope>, // 尚无任何条目的组合
}

impl ChecklistSummary {
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_blank_field() {
        let scope = ChecklistScope::new("P1", "G1", "S1", "T1");
        assert_eq!(scope.first_blank_field(), None);

        let scope = ChecklistScope::new("P1", "G1", " ", "T1");
        assert_eq!(scope.first_blank_field(), Some("section_id"));
    }

    #[test]
    fn test_summary_completion() {
        let summary = ChecklistSummary {
            total: 2,
            done: 2,
            ..Default::default()
        };
        assert!(summary.is_complete());

        let empty = ChecklistSummary::default();
        assert!(empty.is_complete());
    }
}
