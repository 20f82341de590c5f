//! 智能体间消息格式
//!
//! 所有跨组件信号（委派、升级、状态汇报）都封装为 Message，带优先级、TTL 与关联ID。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 默认存活时间（秒）
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// 常用收发方标签
pub mod roles {
    pub const ORCHESTRATOR: &str = "orchestrator";
    pub const BOARD: &str = "board";
}

/// 消息意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 请求对方执行
    Request,
    /// 状态变更通知
    Notify,
    /// 移交任务
    Delegate,
    /// 汇报结果
    Report,
    /// 升级到更高权限
    Escalate,
    /// 确认收到
    Acknowledge,
}

/// 消息优先级；Critical 绕过队列同步投递
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// 消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub intent: Intent,
    pub priority: Priority,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    /// 关联的请求消息ID
    pub correlation_id: Option<String>,
}

impl Message {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, intent: Intent) -> Self {
        Self {
            id: format!("msg_{}", uuid::Uuid::new_v4()),
            sender: sender.into(),
            receiver: receiver.into(),
            intent,
            priority: Priority::default(),
            payload: Value::Null,
            created_at: Utc::now(),
            ttl_secs: DEFAULT_TTL_SECS,
            correlation_id: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// 构造对本消息的确认回执（收发方互换，correlation_id 指向本消息）
    pub fn reply(&self, payload: Value) -> Self {
        Message::new(self.receiver.clone(), self.sender.clone(), Intent::Acknowledge)
            .with_priority(self.priority.min(Priority::High))
            .with_payload(payload)
            .with_correlation(self.id.clone())
    }

    /// 存活时长 >= TTL 即视为过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.created_at).num_milliseconds();
        let ttl_ms = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX).saturating_mul(1000);
        age_ms >= ttl_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_expiry_boundary() {
        let mut msg = Message::new("a", "b", Intent::Notify).with_ttl(10);
        msg.created_at = Utc::now() - Duration::seconds(10);
        assert!(msg.is_expired());

        let fresh = Message::new("a", "b", Intent::Notify).with_ttl(10);
        assert!(!fresh.is_expired());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let msg = Message::new("a", "b", Intent::Notify).with_ttl(0);
        assert!(msg.is_expired());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let msg = Message::new("a", "b", Intent::Notify).with_ttl(u64::MAX);
        assert!(!msg.is_expired());
        assert!(!msg.is_expired_at(Utc::now() + Duration::days(365 * 100)));
    }

    #[test]
    fn test_reply_links_correlation() {
        let request = Message::new("orchestrator", "code_worker", Intent::Request)
            .with_priority(Priority::Critical);
        let ack = request.reply(serde_json::json!({"ok": true}));
        assert_eq!(ack.intent, Intent::Acknowledge);
        assert_eq!(ack.sender, "code_worker");
        assert_eq!(ack.receiver, "orchestrator");
        assert_eq!(ack.correlation_id.as_deref(), Some(request.id.as_str()));
        assert_eq!(ack.priority, Priority::High);
    }
}
