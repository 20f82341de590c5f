//! 优先级邮箱
//!
//! 每个接收方一条按优先级排序的队列（同优先级保持到达顺序），receive 为非阻塞轮询。
//! Critical 消息不入队，直接同步投递给该接收方的全部订阅者；订阅者出错或 panic 只记日志，不影响其它订阅者。

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;

use crate::protocol::message::{Intent, Message, Priority, DEFAULT_TTL_SECS};

/// Critical 消息订阅回调
pub type Listener = Arc<dyn Fn(&Message) -> anyhow::Result<()> + Send + Sync>;

/// 进程内邮箱；可在多个工作流之间共享（Arc<Mailbox>）
pub struct Mailbox {
    queues: Mutex<HashMap<String, VecDeque<Message>>>,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    history: Mutex<Vec<Message>>,
    default_ttl_secs: u64,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL_SECS)
    }

    pub fn with_default_ttl(default_ttl_secs: u64) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            default_ttl_secs,
        }
    }

    /// 以配置的默认 TTL 创建消息
    pub fn message(&self, sender: impl Into<String>, receiver: impl Into<String>, intent: Intent) -> Message {
        Message::new(sender, receiver, intent).with_ttl(self.default_ttl_secs)
    }

    /// 发送消息，返回消息ID
    pub fn send(&self, message: Message) -> String {
        let id = message.id.clone();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        tracing::info!(
            "[{:?}] {} -> {}: {:?}",
            message.priority,
            message.sender,
            message.receiver,
            message.intent
        );

        if message.priority == Priority::Critical {
            tracing::warn!(
                "CRITICAL message from {} to {}: {:?}",
                message.sender,
                message.receiver,
                message.intent
            );
            self.notify_listeners(&message);
            return id;
        }

        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = queues.entry(message.receiver.clone()).or_default();
        // 插到所有优先级 >= 它的消息之后：优先级降序，同级按到达顺序
        let pos = queue.partition_point(|queued| queued.priority >= message.priority);
        queue.insert(pos, message);
        id
    }

    /// 取出接收方优先级最高的消息；先清除过期消息，队列为空返回 None
    pub fn receive(&self, recipient: &str) -> Option<Message> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = queues.get_mut(recipient)?;

        let now = Utc::now();
        let before = queue.len();
        queue.retain(|m| !m.is_expired_at(now));
        let expired = before - queue.len();
        if expired > 0 {
            tracing::debug!("Discarded {} expired messages for {}", expired, recipient);
        }

        let message = queue.pop_front()?;
        tracing::info!(
            "{} received [{:?}]: {:?} from {}",
            recipient,
            message.priority,
            message.intent,
            message.sender
        );
        Some(message)
    }

    /// 订阅发往 recipient 的 Critical 消息
    pub fn subscribe<F>(&self, recipient: impl Into<String>, listener: F)
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(recipient.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// 待取消息数（未清理过期）
    pub fn queue_depth(&self, recipient: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(recipient)
            .map_or(0, VecDeque::len)
    }

    /// 最近 limit 条消息（旧 -> 新）
    pub fn history(&self, limit: usize) -> Vec<Message> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    fn notify_listeners(&self, message: &Message) {
        // 先复制回调列表再调用，回调内可以安全地再次 subscribe / send
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.receiver)
            .cloned()
            .unwrap_or_default();

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Subscriber callback failed: {}", e),
                Err(_) => tracing::error!("Subscriber callback panicked for message {}", message.id),
            }
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
