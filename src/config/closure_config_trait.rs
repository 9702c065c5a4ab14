// ==========================================
// 学年结转引擎 - 结转配置读取 Trait
// ==========================================
// 职责: 定义结转引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::closure_policy::ClosurePolicy;
use crate::domain::types::CouncilPointMode;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ClosureConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ClosureConfigReader: Send + Sync {
    /// 获取及格线
    ///
    /// # 默认值
    /// - 10.0（20 分制）
    async fn get_passing_score(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取评议加分口径
    ///
    /// # 默认值
    /// - FINAL_TERM
    async fn get_council_point_mode(&self) -> Result<CouncilPointMode, Box<dyn Error>>;

    /// 获取结转事务超时（毫秒）
    ///
    /// # 默认值
    /// - 60000
    async fn get_closure_timeout_ms(&self) -> Result<u64, Box<dyn Error>>;

    /// 一次读取全部结转参数
    async fn get_closure_policy(&self) -> Result<ClosurePolicy, Box<dyn Error>> {
        let passing_score = self.get_passing_score().await?;
        let council_point_mode = self.get_council_point_mode().await?;
        let closure_timeout_ms = self.get_closure_timeout_ms().await?;
        Ok(ClosurePolicy {
            passing_score,
            council_point_mode,
            closure_timeout_ms,
        })
    }
}
