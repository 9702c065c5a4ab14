// ==========================================
// 学年结转引擎 - 结转结果领域模型
// ==========================================
// 职责: 科目期末成绩、学生学年结果、欠科
// 红线: 只由结转执行器写入，普通 CRUD 不得修改
// ==========================================

use crate::domain::types::{OutcomeStatus, PendingSubjectStatus, SubjectGradeStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// SubjectFinalGrade - 科目期末成绩
// ==========================================
// 唯一键: inscription_subject_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectFinalGrade {
    pub inscription_subject_id: String,
    pub subject_id: String,
    pub raw_score: f64,      // 加权原始分 (评议加分前)
    pub council_points: f64, // 评议加分
    pub final_score: f64,    // raw_score + council_points
    pub status: SubjectGradeStatus,
}

impl SubjectFinalGrade {
    pub fn is_failed(&self) -> bool {
        self.status == SubjectGradeStatus::Reprobada
    }
}

// ==========================================
// StudentPeriodOutcome - 学生学年结果
// ==========================================
// 唯一键: inscription_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPeriodOutcome {
    pub inscription_id: String,
    pub person_id: String,
    pub grade_id: String,
    pub final_average: f64,
    pub failed_subjects: u8,
    pub status: OutcomeStatus,
    pub promotion_grade_id: Option<String>,
    pub graduated_at: Option<NaiveDateTime>,
    pub metadata: JsonValue, // 审计信息: 命中规则、阈值、判定原因
}

impl StudentPeriodOutcome {
    pub fn is_graduated(&self) -> bool {
        self.graduated_at.is_some()
    }
}

// ==========================================
// StudentOutcome - 单个学生的完整结转结果
// ==========================================
// 用途: 预览与提交共用，含科目明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentOutcome {
    pub outcome: StudentPeriodOutcome,
    pub subjects: Vec<SubjectFinalGrade>,
}

impl StudentOutcome {
    pub fn failed_subject_grades(&self) -> impl Iterator<Item = &SubjectFinalGrade> {
        self.subjects.iter().filter(|s| s.is_failed())
    }
}

// ==========================================
// PendingSubject - 欠科
// ==========================================
// 唯一键: (new_inscription_id, subject_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubject {
    pub id: String,
    pub new_inscription_id: String,
    pub subject_id: String,
    pub origin_period_id: String,
    pub origin_inscription_subject_id: Option<String>,
    pub status: PendingSubjectStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
}

impl PendingSubject {
    /// 新建待补考欠科
    pub fn new_pending(
        new_inscription_id: &str,
        subject_id: &str,
        origin_period_id: &str,
        origin_inscription_subject_id: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            new_inscription_id: new_inscription_id.to_string(),
            subject_id: subject_id.to_string(),
            origin_period_id: origin_period_id.to_string(),
            origin_inscription_subject_id: origin_inscription_subject_id.map(str::to_string),
            status: PendingSubjectStatus::Pendiente,
            created_at,
            resolved_at: None,
            resolved_by: None,
        }
    }
}
