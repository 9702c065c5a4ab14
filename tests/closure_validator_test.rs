// ==========================================
// ClosureValidator 集成测试
// ==========================================
// 测试范围:
// 1. 合法学年通过校验
// 2. 一次收集全部错误
// 3. 告警不阻断
// 4. 孤儿成绩 / 已结转学年
// ==========================================


use academic_closure::config::ClosurePolicy;
use academic_closure::engine::ClosureError;
use serde_json::json;
use test_helpers::*;

#[test]
fn test_合法学年通过校验() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(report.valid, "errors: {:?}", report.errors);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
}

#[test]
fn test_收集全部错误而非首个() {
    let fixture = PeriodFixture::worked_example()
        .with_open_terms()
        .without_checklist()
        .without_rules()
        .without_next_period();
    let env = ClosureTestEnv::new(&fixture).unwrap();

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(!report.valid);

    let joined = report.errors.join("\n");
    // 2 个学期未锁定 + 核对未完成 + G1 缺规则 + 无下一学年
    assert_eq!(report.errors.len(), 5, "errors: {}", joined);
    assert!(joined.contains("T1"));
    assert!(joined.contains("T2"));
    assert!(joined.contains("评议核对未完成"));
    assert!(joined.contains("年级 G1 缺少升级规则"));
    assert!(joined.contains("不存在下一学年"));
}

#[test]
fn test_非毕业规则缺少升级目标() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    env.exec(
        "UPDATE school_period_transition_rule SET grade_to_id = NULL WHERE grade_from_id = 'G1';",
    );

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("grade_to_id"));
}

#[test]
fn test_告警不阻断() {
    let fixture = PeriodFixture::worked_example().student("F", GRADE_1, SECTION_1, &[]);
    let env = ClosureTestEnv::new(&fixture).unwrap();
    env.exec(
        r#"
        UPDATE evaluation_plan SET percentage = 40.0 WHERE id = 'EP-S1-MAT-T2';
        INSERT INTO subject (id, name) VALUES ('HIS', '历史');
        INSERT INTO inscription_subject (id, inscription_id, subject_id)
            VALUES ('IS-C-HIS', 'INS-C', 'HIS');
        "#,
    );

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(report.valid, "errors: {:?}", report.errors);
    assert_eq!(report.warnings.len(), 3, "warnings: {:?}", report.warnings);

    let joined = report.warnings.join("\n");
    assert!(joined.contains("注册 INS-F 没有任何科目"));
    assert!(joined.contains("HIS"));
    assert!(joined.contains("90.00%"));
}

#[test]
fn test_仅有评议加分的科目不告警() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    env.exec(
        r#"
        INSERT INTO subject (id, name) VALUES ('HIS', '历史');
        INSERT INTO inscription_subject (id, inscription_id, subject_id)
            VALUES ('IS-C-HIS', 'INS-C', 'HIS');
        INSERT INTO council_point (id, inscription_subject_id, term_id, points)
            VALUES ('CP-C-HIS', 'IS-C-HIS', 'T2', 1.0);
        "#,
    );

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(report.valid, "errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
}

#[test]
fn test_孤儿成绩_校验错误且预览失败() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    env.exec(
        r#"
        INSERT INTO qualification (id, inscription_subject_id, evaluation_plan_id, score)
        VALUES ('Q-ORPHAN', 'IS-A-MAT', 'EP-GONE', 19.0);
        "#,
    );

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("EP-GONE"));

    let preview = env.preview.calculate(PERIOD_ID, ClosurePolicy::default());
    assert!(matches!(preview, Err(ClosureError::Computation(_))));
}

#[test]
fn test_已结转学年_校验报错() {
    let env = ClosureTestEnv::new(&PeriodFixture::worked_example()).unwrap();
    let result = env
        .executor
        .execute(PERIOD_ID, "secretaria", ClosurePolicy::default(), json!({}))
        .unwrap();
    assert!(result.success);

    let report = env.validator.validate(PERIOD_ID).unwrap();
    assert!(!report.valid);
    assert!(report.errors[0].contains("已结转"));
}

#[test]
fn test_不存在的学年_返回未找到() {
    let env = ClosureTestEnv::new(&PeriodFixture::new()).unwrap();
    assert!(matches!(
        env.validator.validate("P-UNKNOWN"),
        Err(ClosureError::NotFound { .. })
    ));
    assert!(matches!(
        env.preview.calculate("P-UNKNOWN", ClosurePolicy::default()),
        Err(ClosureError::NotFound { .. })
    ));
}
