// ==========================================
// 学年结转引擎 - 操作日志数据仓储
// ==========================================
// 表: action_log
// 红线: 结转子系统的所有写入必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
