// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// RUST_LOG 未设置时: 本 crate info，依赖库 warn
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "warn,academic_closure=info";
const TEST_DIRECTIVE: &str = "warn,academic_closure=debug";

fn filter_or(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// 初始化日志系统
///
/// 宿主进程已安装全局 subscriber 时静默跳过
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器
///   例如: RUST_LOG=debug 或 RUST_LOG=academic_closure::engine=trace
///
/// # 示例
/// ```no_run
/// use academic_closure::logging;
/// logging::init();
/// ```
pub fn init() {
    let _ = fmt()
        .with_env_filter(filter_or(DEFAULT_DIRECTIVE))
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(filter_or(TEST_DIRECTIVE))
        .with_test_writer()
        .try_init();
}
