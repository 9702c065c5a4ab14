// ==========================================
// 学年结转引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等的建表脚本，供 AppState 与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 外部协作方的表（学年、学期、注册、成绩等）也在此创建，
/// 以便独立部署和测试；生产环境中通常已由主系统建好。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 外部输入 =====

CREATE TABLE IF NOT EXISTS school_period (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT
);

CREATE TABLE IF NOT EXISTS grade (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    grade_order INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS section (
    id TEXT PRIMARY KEY,
    grade_id TEXT NOT NULL REFERENCES grade(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subject (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS term (
    id TEXT PRIMARY KEY,
    school_period_id TEXT NOT NULL REFERENCES school_period(id),
    term_order INTEGER NOT NULL,
    is_blocked INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS inscription (
    id TEXT PRIMARY KEY,
    person_id TEXT NOT NULL,
    school_period_id TEXT NOT NULL REFERENCES school_period(id),
    grade_id TEXT NOT NULL REFERENCES grade(id),
    section_id TEXT REFERENCES section(id),
    escolaridad TEXT,
    is_repeater INTEGER NOT NULL DEFAULT 0,
    origin_period_id TEXT REFERENCES school_period(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (person_id, school_period_id)
);

CREATE TABLE IF NOT EXISTS inscription_subject (
    id TEXT PRIMARY KEY,
    inscription_id TEXT NOT NULL REFERENCES inscription(id),
    subject_id TEXT NOT NULL REFERENCES subject(id),
    UNIQUE (inscription_id, subject_id)
);

CREATE TABLE IF NOT EXISTS evaluation_plan (
    id TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL REFERENCES subject(id),
    section_id TEXT REFERENCES section(id),
    term_id TEXT NOT NULL REFERENCES term(id),
    percentage REAL NOT NULL,
    eval_date TEXT
);

-- evaluation_plan_id 不加外键: 评价计划可能被主系统删除，由校验器识别孤儿成绩
CREATE TABLE IF NOT EXISTS qualification (
    id TEXT PRIMARY KEY,
    inscription_subject_id TEXT NOT NULL REFERENCES inscription_subject(id),
    evaluation_plan_id TEXT NOT NULL,
    score REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS council_point (
    id TEXT PRIMARY KEY,
    inscription_subject_id TEXT NOT NULL REFERENCES inscription_subject(id),
    term_id TEXT NOT NULL REFERENCES term(id),
    points REAL NOT NULL,
    UNIQUE (inscription_subject_id, term_id)
);

-- ===== 结转子系统自有数据 =====

CREATE TABLE IF NOT EXISTS period_closure (
    id TEXT PRIMARY KEY,
    school_period_id TEXT NOT NULL REFERENCES school_period(id),
    status TEXT NOT NULL CHECK (status IN ('draft', 'validating', 'closed', 'failed')),
    initiated_by TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    log TEXT NOT NULL DEFAULT '[]',
    snapshot TEXT
);

CREATE TABLE IF NOT EXISTS subject_final_grade (
    id TEXT PRIMARY KEY,
    inscription_subject_id TEXT NOT NULL UNIQUE REFERENCES inscription_subject(id),
    subject_id TEXT NOT NULL REFERENCES subject(id),
    raw_score REAL NOT NULL,
    council_points REAL NOT NULL DEFAULT 0,
    final_score REAL NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('aprobada', 'reprobada')),
    period_closure_id TEXT REFERENCES period_closure(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_period_outcome (
    id TEXT PRIMARY KEY,
    inscription_id TEXT NOT NULL UNIQUE REFERENCES inscription(id),
    final_average REAL NOT NULL,
    failed_subjects INTEGER NOT NULL CHECK (failed_subjects BETWEEN 0 AND 255),
    status TEXT NOT NULL CHECK (status IN ('aprobado', 'materias_pendientes', 'reprobado')),
    promotion_grade_id TEXT REFERENCES grade(id),
    graduated_at TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    period_closure_id TEXT REFERENCES period_closure(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_subject (
    id TEXT PRIMARY KEY,
    new_inscription_id TEXT NOT NULL REFERENCES inscription(id),
    subject_id TEXT NOT NULL REFERENCES subject(id),
    origin_period_id TEXT NOT NULL REFERENCES school_period(id),
    origin_inscription_subject_id TEXT REFERENCES inscription_subject(id),
    status TEXT NOT NULL CHECK (status IN ('pendiente', 'aprobada', 'convalidada')),
    created_at TEXT NOT NULL,
    resolved_at TEXT,
    resolved_by TEXT,
    UNIQUE (new_inscription_id, subject_id)
);

CREATE TABLE IF NOT EXISTS school_period_transition_rule (
    grade_from_id TEXT PRIMARY KEY REFERENCES grade(id),
    grade_to_id TEXT REFERENCES grade(id),
    min_average REAL NOT NULL,
    max_pending_subjects INTEGER NOT NULL CHECK (max_pending_subjects BETWEEN 0 AND 255),
    auto_graduate INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS council_checklist (
    id TEXT PRIMARY KEY,
    school_period_id TEXT NOT NULL REFERENCES school_period(id),
    grade_id TEXT NOT NULL REFERENCES grade(id),
    section_id TEXT NOT NULL REFERENCES section(id),
    term_id TEXT NOT NULL REFERENCES term(id),
    status TEXT NOT NULL CHECK (status IN ('open', 'in_review', 'done')),
    completed_by TEXT,
    completed_at TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE (school_period_id, grade_id, section_id, term_id)
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    school_period_id TEXT,
    target_id TEXT,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_inscription_period ON inscription(school_period_id);
CREATE INDEX IF NOT EXISTS idx_period_closure_period ON period_closure(school_period_id, status);
CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
CREATE INDEX IF NOT EXISTS idx_action_log_target ON action_log(target_id);
"#;
