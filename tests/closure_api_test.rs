// ==========================================
// ClosureApi 集成测试
// ==========================================
// 测试范围:
// 1. 校验 / 预览 / 执行（读取 config_kv 中的结转参数）
// 2. ActionLog 审计记录
// 3. 错误转换（Conflict / InvalidInput / NotFound）
// 4. 升级规则与配置维护
// ==========================================


use academic_closure::api::ApiError;
use academic_closure::config::config_keys;
use academic_closure::domain::action_log::ActionType;
use academic_closure::domain::checklist::ChecklistScope;
use academic_closure::domain::rule::{RuleLookup, TransitionRule};
use academic_closure::domain::types::{ChecklistStatus, OutcomeStatus, PendingSubjectStatus};
use test_helpers::*;

#[tokio::test]
async fn test_执行结转_写入审计日志() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    let report = env.api.validate_closure(PERIOD_ID).await.unwrap();
    assert!(report.valid);

    let result = env.api.execute_closure(PERIOD_ID, "secretaria").await.unwrap();
    assert!(result.success, "errors: {:?}", result.errors);

    let logs = env.action_log_repo.find_by_target(&result.closure_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, ActionType::ClosureExecute.as_str());
    assert_eq!(logs[0].actor, "secretaria");
    assert_eq!(logs[0].school_period_id.as_deref(), Some(PERIOD_ID));
    let payload = logs[0].payload_json.clone().unwrap();
    assert_eq!(payload["success"], serde_json::json!(true));

    let closure = env.api.get_closure(&result.closure_id).unwrap();
    let snapshot = closure.snapshot.unwrap();
    assert_eq!(snapshot["policy"]["passing_score"], serde_json::json!(10.0));

    let status = env.api.get_closure_status(PERIOD_ID).unwrap();
    assert!(status.is_closed);
}

#[tokio::test]
async fn test_重复执行_返回冲突() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let first = env.api.execute_closure(PERIOD_ID, "secretaria").await.unwrap();
    assert!(first.success);

    let second = env.api.execute_closure(PERIOD_ID, "secretaria").await;
    assert!(matches!(second, Err(ApiError::Conflict { .. })));

    // 被拒绝的尝试同样记录日志
    assert_eq!(env.action_log_repo.count_by_period(PERIOD_ID).unwrap(), 2);
    assert_eq!(env.api.list_closures(PERIOD_ID).unwrap().len(), 1);
}

#[tokio::test]
async fn test_配置及格线影响预览() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    env.api
        .update_config(config_keys::PASSING_SCORE, "8", "admin")
        .unwrap();
    let policy = env.api.get_closure_policy().await.unwrap();
    assert_eq!(policy.passing_score, 8.0);

    let preview = env.api.calculate_preview(PERIOD_ID).await.unwrap();
    let a = preview
        .iter()
        .find(|s| s.outcome.inscription_id == inscription_id("A"))
        .unwrap();
    // 及格线 8: A 的 8 分科目及格
    assert_eq!(a.outcome.failed_subjects, 0);
    assert_eq!(a.outcome.status, OutcomeStatus::Aprobado);

    let logs = env.action_log_repo.find_by_target(config_keys::PASSING_SCORE).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, ActionType::ConfigUpdate.as_str());
}

#[tokio::test]
async fn test_空输入_返回无效输入() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    assert!(matches!(
        env.api.execute_closure(PERIOD_ID, "  ").await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.api.calculate_preview("").await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.api.get_closure("C-UNKNOWN"),
        Err(ApiError::NotFound(_))
    ));
    assert_eq!(env.count_rows("period_closure"), 0);
}

#[test]
fn test_核对条目与欠科结清_记录日志() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example().without_checklist()).unwrap();

    for term_id in TERMS {
        let scope = ChecklistScope::new(PERIOD_ID, GRADE_1, SECTION_1, term_id);
        env.api
            .upsert_checklist_entry(&scope, ChecklistStatus::Done, "coordinador")
            .unwrap();
    }
    assert!(env.api.get_closure_status(PERIOD_ID).unwrap().checklist.is_complete());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime
        .block_on(env.api.execute_closure(PERIOD_ID, "secretaria"))
        .unwrap();
    assert!(result.success, "errors: {:?}", result.errors);

    let next_a = env
        .academic_repo
        .find_inscriptions(NEXT_PERIOD_ID)
        .unwrap()
        .into_iter()
        .find(|i| i.person_id == person_id("A"))
        .unwrap();
    let pending = env.api.list_pending_subjects(&next_a.id).unwrap();
    assert_eq!(pending.len(), 1);

    let resolved = env
        .api
        .resolve_pending_subject(&pending[0].id, PendingSubjectStatus::Convalidada, "director")
        .unwrap();
    assert_eq!(resolved.status, PendingSubjectStatus::Convalidada);

    let checklist_logs = env
        .action_log_repo
        .find_by_action_type(ActionType::ChecklistUpsert.as_str(), 10)
        .unwrap();
    assert_eq!(checklist_logs.len(), 2);
    let resolve_logs = env.action_log_repo.find_by_target(&pending[0].id).unwrap();
    assert_eq!(resolve_logs.len(), 1);
    assert_eq!(resolve_logs[0].actor, "director");
}

#[test]
fn test_升级规则维护() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    let rule = TransitionRule {
        grade_from_id: GRADE_1.to_string(),
        grade_to_id: Some(GRADE_2.to_string()),
        min_average: 12.0,
        max_pending_subjects: 1,
        auto_graduate: false,
        updated_at: None,
    };
    env.api.upsert_transition_rule(&rule, "admin").unwrap();

    match env.api.find_rule(GRADE_1).unwrap() {
        RuleLookup::Found(found) => {
            assert_eq!(found.min_average, 12.0);
            assert_eq!(found.max_pending_subjects, 1);
            assert!(found.updated_at.is_some());
        }
        other => panic!("Expected Found, got {:?}", other),
    }
    assert_eq!(
        env.api.find_rule("G9").unwrap(),
        RuleLookup::MissingRule("G9".to_string())
    );
    assert_eq!(env.api.list_transition_rules().unwrap().len(), 2);

    let invalid = TransitionRule {
        min_average: 25.0,
        ..rule
    };
    assert!(matches!(
        env.api.upsert_transition_rule(&invalid, "admin"),
        Err(ApiError::InvalidInput(_))
    ));

    let logs = env.action_log_repo.find_by_target(GRADE_1).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, ActionType::TransitionRuleUpsert.as_str());
}
