// ==========================================
// 学年结转引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::closure_config_trait::ClosureConfigReader;
use crate::config::closure_policy::{DEFAULT_CLOSURE_TIMEOUT_MS, DEFAULT_PASSING_SCORE};
use crate::db::open_sqlite_connection;
use crate::domain::rule::MAX_SCORE;
use crate::domain::types::CouncilPointMode;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON）
    ///
    /// # 用途
    /// - 写入每次结转的 snapshot，便于事后复核所用参数
    pub fn get_config_snapshot(&self) -> Result<serde_json::Value, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map))
    }
}

// ==========================================
// ClosureConfigReader 实现
// ==========================================
// 非法取值回退默认值并告警，不阻断结转
#[async_trait]
impl ClosureConfigReader for ConfigManager {
    async fn get_passing_score(&self) -> Result<f64, Box<dyn Error>> {
        let default = DEFAULT_PASSING_SCORE.to_string();
        let value = self.get_config_or_default(config_keys::PASSING_SCORE, &default)?;
        match value.trim().parse::<f64>() {
            Ok(v) if (0.0..=MAX_SCORE).contains(&v) => Ok(v),
            _ => {
                warn!(
                    config_key = config_keys::PASSING_SCORE,
                    raw_value = %value,
                    "配置值非法，使用默认及格线"
                );
                Ok(DEFAULT_PASSING_SCORE)
            }
        }
    }

    async fn get_council_point_mode(&self) -> Result<CouncilPointMode, Box<dyn Error>> {
        let default = CouncilPointMode::default();
        let value = self.get_config_or_default(config_keys::COUNCIL_POINT_MODE, default.as_str())?;
        match CouncilPointMode::from_str(&value) {
            Some(mode) => Ok(mode),
            None => {
                warn!(
                    config_key = config_keys::COUNCIL_POINT_MODE,
                    raw_value = %value,
                    "配置值非法，使用默认评议加分口径"
                );
                Ok(default)
            }
        }
    }

    async fn get_closure_timeout_ms(&self) -> Result<u64, Box<dyn Error>> {
        let default = DEFAULT_CLOSURE_TIMEOUT_MS.to_string();
        let value = self.get_config_or_default(config_keys::CLOSURE_TIMEOUT_MS, &default)?;
        match value.trim().parse::<u64>() {
            Ok(v) if v > 0 => Ok(v),
            _ => {
                warn!(
                    config_key = config_keys::CLOSURE_TIMEOUT_MS,
                    raw_value = %value,
                    "配置值非法，使用默认超时"
                );
                Ok(DEFAULT_CLOSURE_TIMEOUT_MS)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 成绩判定
    pub const PASSING_SCORE: &str = "passing_score";
    pub const COUNCIL_POINT_MODE: &str = "council_point_mode";

    // 执行
    pub const CLOSURE_TIMEOUT_MS: &str = "closure_timeout_ms";
}
