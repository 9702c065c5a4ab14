// ==========================================
// 学年结转引擎 - 外部输入领域模型
// ==========================================
// 职责: 学年/学期/年级/注册/成绩等外部协作方数据的只读视图
// 红线: 结转引擎不修改这些数据（新学年注册除外）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// SchoolPeriod - 学年
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolPeriod {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl SchoolPeriod {
    /// 学年结束时刻: 结束日 00:00:00，未填结束日时取开始日
    ///
    /// 毕业学生的 graduated_at 取此值，预览与提交结果一致
    pub fn closing_instant(&self) -> NaiveDateTime {
        self.end_date
            .unwrap_or(self.start_date)
            .and_time(NaiveTime::MIN)
    }
}

// ==========================================
// Term - 学期
// ==========================================
// 红线: is_blocked = true 后不再允许录入成绩/评议加分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: String,
    pub school_period_id: String,
    pub term_order: i32,
    pub is_blocked: bool,
}

// ==========================================
// Inscription - 学生学年注册
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inscription {
    pub id: String,
    pub person_id: String,
    pub school_period_id: String,
    pub grade_id: String,
    pub section_id: Option<String>,      // 新学年注册时尚未分班
    pub escolaridad: Option<String>,     // 学籍类别 (外部口径, 原样传递)
    pub is_repeater: bool,
    pub origin_period_id: Option<String>,
}

// ==========================================
// QualificationInput - 单次评价成绩
// ==========================================
// percentage/term_id 为 None 表示评价计划已被删除（孤儿数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationInput {
    pub qualification_id: String,
    pub evaluation_plan_id: String,
    pub score: f64,
    pub percentage: Option<f64>,
    pub term_id: Option<String>,
}

impl QualificationInput {
    pub fn is_orphan(&self) -> bool {
        self.percentage.is_none() || self.term_id.is_none()
    }
}

// ==========================================
// CouncilPointInput - 评议加分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilPointInput {
    pub term_id: String,
    pub points: f64,
}

// ==========================================
// InscriptionSubjectInput - 学生单科输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionSubjectInput {
    pub inscription_subject_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub qualifications: Vec<QualificationInput>,
    pub council_points: Vec<CouncilPointInput>,
}

impl InscriptionSubjectInput {
    /// 既无成绩也无评议加分（通常是教师未提交）
    pub fn has_no_inputs(&self) -> bool {
        self.qualifications.is_empty() && self.council_points.is_empty()
    }
}

// ==========================================
// StudentInput - 学生结转输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInput {
    pub inscription: Inscription,
    pub subjects: Vec<InscriptionSubjectInput>,
}

// ==========================================
// PeriodSnapshot - 学年结转输入快照
// ==========================================
// 用途: 预览与提交共用同一份输入结构，保证计算一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub period: SchoolPeriod,
    pub terms: Vec<Term>,
    pub students: Vec<StudentInput>,
}

impl PeriodSnapshot {
    /// 结转学期: order 最大的学期
    pub fn closing_term_id(&self) -> Option<&str> {
        self.terms
            .iter()
            .max_by_key(|t| t.term_order)
            .map(|t| t.id.as_str())
    }

    /// 计入结转的学期ID集合
    pub fn term_ids(&self) -> BTreeSet<&str> {
        self.terms.iter().map(|t| t.id.as_str()).collect()
    }

    /// 学年结构中出现的年级
    pub fn grade_ids(&self) -> BTreeSet<String> {
        self.students
            .iter()
            .map(|s| s.inscription.grade_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: &str, order: i32) -> Term {
        Term {
            id: id.to_string(),
            school_period_id: "P1".to_string(),
            term_order: order,
            is_blocked: true,
        }
    }

    #[test]
    fn test_closing_term_is_highest_order() {
        let snapshot = PeriodSnapshot {
            period: SchoolPeriod {
                id: "P1".to_string(),
                name: "2025-2026".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
                end_date: None,
            },
            terms: vec![term("T2", 2), term("T3", 3), term("T1", 1)],
            students: vec![],
        };

        assert_eq!(snapshot.closing_term_id(), Some("T3"));
        assert_eq!(snapshot.term_ids().len(), 3);
        assert!(snapshot.grade_ids().is_empty());
    }

    #[test]
    fn test_closing_instant_prefers_end_date() {
        let mut period = SchoolPeriod {
            id: "P1".to_string(),
            name: "2025-2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
            end_date: Some(NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()),
        };
        assert_eq!(
            period.closing_instant(),
            NaiveDate::from_ymd_opt(2026, 7, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );

        period.end_date = None;
        assert_eq!(
            period.closing_instant(),
            NaiveDate::from_ymd_opt(2025, 9, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }
}
