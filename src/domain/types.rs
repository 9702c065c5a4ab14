// ==========================================
// 学年结转引擎 - 领域类型定义
// ==========================================
// 职责: 结转过程中的所有状态枚举
// 存储格式: 小写 token (与数据库、前端一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 科目期末状态 (SubjectFinalGrade.status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectGradeStatus {
    Aprobada,  // 及格
    Reprobada, // 不及格
}

impl SubjectGradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectGradeStatus::Aprobada => "aprobada",
            SubjectGradeStatus::Reprobada => "reprobada",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "aprobada" => Some(SubjectGradeStatus::Aprobada),
            "reprobada" => Some(SubjectGradeStatus::Reprobada),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectGradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 学生学年结果 (StudentPeriodOutcome.status)
// ==========================================
// 不变量:
// - Aprobado => failed_subjects = 0
// - MateriasPendientes => 0 < failed_subjects <= max_pending_subjects
// - Reprobado => 超出欠科上限或未达平均分门槛
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Aprobado,           // 升级
    MateriasPendientes, // 带欠科升级
    Reprobado,          // 留级
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Aprobado => "aprobado",
            OutcomeStatus::MateriasPendientes => "materias_pendientes",
            OutcomeStatus::Reprobado => "reprobado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "aprobado" => Some(OutcomeStatus::Aprobado),
            "materias_pendientes" => Some(OutcomeStatus::MateriasPendientes),
            "reprobado" => Some(OutcomeStatus::Reprobado),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 欠科状态 (PendingSubject.status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingSubjectStatus {
    Pendiente,   // 待补考
    Aprobada,    // 补考通过
    Convalidada, // 行政认定
}

impl PendingSubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingSubjectStatus::Pendiente => "pendiente",
            PendingSubjectStatus::Aprobada => "aprobada",
            PendingSubjectStatus::Convalidada => "convalidada",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(PendingSubjectStatus::Pendiente),
            "aprobada" => Some(PendingSubjectStatus::Aprobada),
            "convalidada" => Some(PendingSubjectStatus::Convalidada),
            _ => None,
        }
    }

    /// 是否为终态（已结清）
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PendingSubjectStatus::Pendiente)
    }
}

impl fmt::Display for PendingSubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 评议核对状态 (CouncilChecklist.status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Open,
    InReview,
    Done,
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistStatus::Open => "open",
            ChecklistStatus::InReview => "in_review",
            ChecklistStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ChecklistStatus::Open),
            "in_review" => Some(ChecklistStatus::InReview),
            "done" => Some(ChecklistStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 结转尝试状态 (PeriodClosure.status)
// ==========================================
// 状态机: Draft -> Validating -> Closed | Failed
// Draft 也可直接 -> Failed（校验未通过）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureStatus {
    Draft,
    Validating,
    Closed,
    Failed,
}

impl ClosureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosureStatus::Draft => "draft",
            ClosureStatus::Validating => "validating",
            ClosureStatus::Closed => "closed",
            ClosureStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ClosureStatus::Draft),
            "validating" => Some(ClosureStatus::Validating),
            "closed" => Some(ClosureStatus::Closed),
            "failed" => Some(ClosureStatus::Failed),
            _ => None,
        }
    }

    /// 判断状态转换是否合法
    pub fn can_transition_to(&self, next: ClosureStatus) -> bool {
        matches!(
            (self, next),
            (ClosureStatus::Draft, ClosureStatus::Validating)
                | (ClosureStatus::Draft, ClosureStatus::Failed)
                | (ClosureStatus::Validating, ClosureStatus::Closed)
                | (ClosureStatus::Validating, ClosureStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClosureStatus::Closed | ClosureStatus::Failed)
    }
}

impl fmt::Display for ClosureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 评议加分口径 (Council Point Mode)
// ==========================================
// FINAL_TERM: 只取结转学期（order 最大的学期）的评议加分
// ALL_TERMS:  累加本学年所有学期的评议加分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilPointMode {
    FinalTerm,
    AllTerms,
}

impl CouncilPointMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouncilPointMode::FinalTerm => "FINAL_TERM",
            CouncilPointMode::AllTerms => "ALL_TERMS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FINAL_TERM" => Some(CouncilPointMode::FinalTerm),
            "ALL_TERMS" => Some(CouncilPointMode::AllTerms),
            _ => None,
        }
    }
}

impl Default for CouncilPointMode {
    fn default() -> Self {
        CouncilPointMode::FinalTerm
    }
}

impl fmt::Display for CouncilPointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_tokens() {
        for status in [
            OutcomeStatus::Aprobado,
            OutcomeStatus::MateriasPendientes,
            OutcomeStatus::Reprobado,
        ] {
            assert_eq!(OutcomeStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(
            serde_json::to_string(&OutcomeStatus::MateriasPendientes).unwrap(),
            "\"materias_pendientes\""
        );
        assert_eq!(OutcomeStatus::from_str("APROBADO"), None);
    }

    #[test]
    fn test_closure_status_transitions() {
        assert!(ClosureStatus::Draft.can_transition_to(ClosureStatus::Validating));
        assert!(ClosureStatus::Draft.can_transition_to(ClosureStatus::Failed));
        assert!(ClosureStatus::Validating.can_transition_to(ClosureStatus::Closed));
        assert!(!ClosureStatus::Draft.can_transition_to(ClosureStatus::Closed));
        assert!(!ClosureStatus::Closed.can_transition_to(ClosureStatus::Failed));
        assert!(!ClosureStatus::Failed.can_transition_to(ClosureStatus::Validating));
    }

    #[test]
    fn test_council_point_mode_parse() {
        assert_eq!(CouncilPointMode::from_str("final_term"), Some(CouncilPointMode::FinalTerm));
        assert_eq!(CouncilPointMode::from_str(" ALL_TERMS "), Some(CouncilPointMode::AllTerms));
        assert_eq!(CouncilPointMode::from_str("SUM"), None);
        assert_eq!(CouncilPointMode::default(), CouncilPointMode::FinalTerm);
    }

    #[test]
    fn test_pending_status_resolved() {
        assert!(!PendingSubjectStatus::Pendiente.is_resolved());
        assert!(PendingSubjectStatus::Aprobada.is_resolved());
        assert!(PendingSubjectStatus::Convalidada.is_resolved());
    }
}
