// ==========================================
// 学年结转引擎 - 操作日志领域模型
// ==========================================
// 红线: 结转子系统的所有写入必须记录
// 用途: 审计追踪（核对清单、升级规则、欠科结清、结转执行）
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: String,              // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub school_period_id: Option<String>, // 关联学年 (规则配置等可为None)
    pub target_id: Option<String>,        // 操作对象ID
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ChecklistUpsert,       // 核对清单更新
    TransitionRuleUpsert,  // 升级规则配置
    ClosureExecute,        // 执行结转
    PendingSubjectResolve, // 欠科结清
    ConfigUpdate,          // 配置更新
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ChecklistUpsert => "ChecklistUpsert",
            ActionType::TransitionRuleUpsert => "TransitionRuleUpsert",
            ActionType::ClosureExecute => "ClosureExecute",
            ActionType::PendingSubjectResolve => "PendingSubjectResolve",
            ActionType::ConfigUpdate => "ConfigUpdate",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ChecklistUpsert" => Some(ActionType::ChecklistUpsert),
            "TransitionRuleUpsert" => Some(ActionType::TransitionRuleUpsert),
            "ClosureExecute" => Some(ActionType::ClosureExecute),
            "PendingSubjectResolve" => Some(ActionType::PendingSubjectResolve),
            "ConfigUpdate" => Some(ActionType::ConfigUpdate),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            school_period_id: None,
            target_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_period(mut self, school_period_id: &str) -> Self {
        self.school_period_id = Some(school_period_id.to_string());
        self
    }

    pub fn with_target(mut self, target_id: &str) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
