// ==========================================
// 学年结转引擎 - 应用状态
// ==========================================
// 职责: 组合根，初始化共享连接、仓储、引擎和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ClosureApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    ClosureExecutor, ClosureValidator, PendingSubjectResolver, PreviewCalculator, ReadinessGate,
};
use crate::repository::{
    AcademicRepository, ActionLogRepository, ChecklistRepository, ClosureRepository,
    OutcomeRepository, PendingSubjectRepository, TransitionRuleRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个 `Arc<Mutex<Connection>>`，
/// 结转事务与其他写入因此天然串行。
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 结转API
    pub closure_api: Arc<ClosureApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 成绩/结果仓储（用于结果查询）
    pub outcome_repo: Arc<OutcomeRepository>,

    /// 欠科仓储
    pub pending_subject_repo: Arc<PendingSubjectRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema
    /// 2. 初始化所有Repository
    /// 3. 初始化所有Engine
    /// 4. 创建API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let academic_repo = Arc::new(AcademicRepository::new(conn.clone()));
        let rule_repo = Arc::new(TransitionRuleRepository::new(conn.clone()));
        let checklist_repo = Arc::new(ChecklistRepository::new(conn.clone()));
        let closure_repo = Arc::new(ClosureRepository::new(conn.clone()));
        let outcome_repo = Arc::new(OutcomeRepository::new(conn.clone()));
        let pending_subject_repo = Arc::new(PendingSubjectRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let gate = Arc::new(ReadinessGate::new(
            academic_repo.clone(),
            checklist_repo,
            closure_repo.clone(),
        ));
        let validator = Arc::new(ClosureValidator::new(
            academic_repo.clone(),
            rule_repo.clone(),
            closure_repo.clone(),
            gate.clone(),
        ));
        let preview = Arc::new(PreviewCalculator::new(academic_repo.clone(), rule_repo.clone()));
        let executor = Arc::new(ClosureExecutor::new(
            conn.clone(),
            academic_repo,
            closure_repo.clone(),
            validator.clone(),
        ));
        let pending_resolver = Arc::new(PendingSubjectResolver::new(pending_subject_repo.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let closure_api = Arc::new(ClosureApi::new(
            gate,
            validator,
            preview,
            executor,
            pending_resolver,
            rule_repo,
            closure_repo,
            config_manager.clone(),
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            closure_api,
            config_manager,
            outcome_repo,
            pending_subject_repo,
            action_log_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 ACADEMIC_CLOSURE_DB_PATH（非空时）
/// - 否则: 用户数据目录/academic-closure/academic_closure.db
/// - 无法获取用户数据目录时: ./academic_closure.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("ACADEMIC_CLOSURE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./academic_closure.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("academic-closure");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("academic_closure.db");
        }
    }

    path.to_string_lossy().to_string()
}
