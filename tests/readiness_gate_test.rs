// ==========================================
// ReadinessGate 集成测试
// ==========================================
// 测试范围:
// 1. 核对进度汇总（done / in_review / open / missing）
// 2. 结转状态（学期锁定、最近一次结转）
// 3. 已结转学年的核对条目锁定
// ==========================================


use academic_closure::config::ClosurePolicy;
use academic_closure::domain::checklist::ChecklistScope;
use academic_closure::domain::types::{ChecklistStatus, ClosureStatus};
use academic_closure::engine::ClosureError;
use serde_json::json;
use test_helpers::*;

fn scope(term_id: &str) -> ChecklistScope {
    ChecklistScope::new(PERIOD_ID, GRADE_1, SECTION_1, term_id)
}

#[test]
fn test_汇总_无条目时全部缺失() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example().without_checklist()).unwrap();

    let summary = env.gate.summarize(PERIOD_ID).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.done, 0);
    assert_eq!(summary.missing.len(), 2);
    assert!(!summary.is_complete());
}

#[test]
fn test_汇总_按状态计数() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example().without_checklist()).unwrap();

    env.gate
        .upsert_entry(&scope("T1"), ChecklistStatus::Done, "coordinador")
        .unwrap();
    env.gate
        .upsert_entry(&scope("T2"), ChecklistStatus::InReview, "coordinador")
        .unwrap();

    let summary = env.gate.summarize(PERIOD_ID).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.in_review, 1);
    assert_eq!(summary.open, 0);
    assert!(summary.missing.is_empty());

    // 再次更新同一范围: 幂等覆盖
    let entry = env
        .gate
        .upsert_entry(&scope("T2"), ChecklistStatus::Done, "director")
        .unwrap();
    assert_eq!(entry.status, ChecklistStatus::Done);
    assert_eq!(entry.completed_by.as_deref(), Some("director"));
    assert!(env.gate.summarize(PERIOD_ID).unwrap().is_complete());
}

#[test]
fn test_空字段与未知学年() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    let blank = ChecklistScope::new(PERIOD_ID, GRADE_1, " ", "T1");
    assert!(matches!(
        env.gate.upsert_entry(&blank, ChecklistStatus::Done, "coordinador"),
        Err(ClosureError::Validation { .. })
    ));

    let unknown = ChecklistScope::new("P-UNKNOWN", GRADE_1, SECTION_1, "T1");
    assert!(matches!(
        env.gate.upsert_entry(&unknown, ChecklistStatus::Done, "coordinador"),
        Err(ClosureError::NotFound { .. })
    ));
}

#[test]
fn test_结转状态() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example().with_open_terms()).unwrap();

    let status = env.gate.status(PERIOD_ID).unwrap();
    assert_eq!(status.terms_total, 2);
    assert_eq!(status.terms_blocked, 0);
    assert!(!status.all_terms_blocked());
    assert!(!status.is_closed);
    assert!(status.last_closure.is_none());
    assert!(status.checklist.is_complete());
}

#[test]
fn test_结转后核对条目锁定() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let result = env
        .executor
        .execute(PERIOD_ID, "secretaria", ClosurePolicy::default(), json!({}))
        .unwrap();
    assert!(result.success);

    let status = env.gate.status(PERIOD_ID).unwrap();
    assert!(status.is_closed);
    assert!(status.all_terms_blocked());
    let last = status.last_closure.unwrap();
    assert_eq!(last.id, result.closure_id);
    assert_eq!(last.status, ClosureStatus::Closed);

    match env
        .gate
        .upsert_entry(&scope("T1"), ChecklistStatus::Open, "coordinador")
    {
        Err(ClosureError::Conflict { closure_id, .. }) => assert_eq!(closure_id, result.closure_id),
        other => panic!("Expected Conflict, got {:?}", other),
    }
}
