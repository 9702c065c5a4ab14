// ==========================================
// PendingSubjectResolver 集成测试
// ==========================================
// 测试范围:
// 1. pendiente → aprobada / convalidada
// 2. 终态不可再变、目标不能是 pendiente
// 3. 结清欠科不回写源学年结果
// ==========================================


use academic_closure::config::ClosurePolicy;
use academic_closure::domain::outcome::PendingSubject;
use academic_closure::domain::types::{OutcomeStatus, PendingSubjectStatus};
use academic_closure::engine::ClosureError;
use serde_json::json;
use test_helpers::*;

/// 执行标准样例结转，返回 A 的欠科
fn close_and_get_pending(env: &ClosureTestEnv) -> PendingSubject {
    let result = env
        .executor
        .execute(PERIOD_ID, "secretaria", ClosurePolicy::default(), json!({}))
        .unwrap();
    assert!(result.success, "errors: {:?}", result.errors);

    let mut pending = env
        .pending_repo
        .find_by_origin_period(PERIOD_ID, Some(PendingSubjectStatus::Pendiente))
        .unwrap();
    assert_eq!(pending.len(), 1);
    pending.remove(0)
}

#[test]
fn test_欠科结清_aprobada() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let pending = close_and_get_pending(&env);

    let resolved = env
        .pending_resolver
        .resolve(&pending.id, PendingSubjectStatus::Aprobada, "docente")
        .unwrap();
    assert_eq!(resolved.status, PendingSubjectStatus::Aprobada);
    assert_eq!(resolved.resolved_by.as_deref(), Some("docente"));
    assert!(resolved.resolved_at.is_some());

    let by_inscription = env
        .pending_resolver
        .list_for_inscription(&pending.new_inscription_id)
        .unwrap();
    assert_eq!(by_inscription.len(), 1);
    assert_eq!(by_inscription[0].status, PendingSubjectStatus::Aprobada);

    // 源学年结果保持不变
    let outcomes = env.outcome_repo.find_outcomes_by_period(PERIOD_ID).unwrap();
    let a = outcomes
        .iter()
        .find(|o| o.inscription_id == inscription_id("A"))
        .unwrap();
    assert_eq!(a.status, OutcomeStatus::MateriasPendientes);
    assert_eq!(a.failed_subjects, 1);
}

#[test]
fn test_终态不可再变() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let pending = close_and_get_pending(&env);

    env.pending_resolver
        .resolve(&pending.id, PendingSubjectStatus::Convalidada, "director")
        .unwrap();

    let again = env
        .pending_resolver
        .resolve(&pending.id, PendingSubjectStatus::Aprobada, "docente");
    match again {
        Err(ClosureError::InvalidStateTransition { from, .. }) => assert_eq!(from, "convalidada"),
        other => panic!("Expected InvalidStateTransition, got {:?}", other),
    }
}

#[test]
fn test_目标状态不能是pendiente() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let pending = close_and_get_pending(&env);

    assert!(matches!(
        env.pending_resolver
            .resolve(&pending.id, PendingSubjectStatus::Pendiente, "docente"),
        Err(ClosureError::InvalidStateTransition { .. })
    ));
}

#[test]
fn test_欠科不存在() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    assert!(matches!(
        env.pending_resolver
            .resolve("PS-UNKNOWN", PendingSubjectStatus::Aprobada, "docente"),
        Err(ClosureError::NotFound { .. })
    ));
}
