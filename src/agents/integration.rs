//! 集成执行器：调用外部服务的三层恢复
//!
//! 1. 指数退避重试（瞬时故障）
//! 2. 熔断器（持续故障）
//! 3. 优雅降级（缓存或默认值）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::Executor;
use crate::llm::TextGenerator;
use crate::resilience::{CircuitBreakers, CircuitState, FallbackCache};
use crate::workflow::{Task, TaskOutput, TaskStatus};

const DEFAULT_SERVICE: &str = "external_api";
const MAX_RETRIES: u32 = 3;

pub struct IntegrationExecutor {
    generator: Arc<dyn TextGenerator>,
    breakers: Arc<CircuitBreakers>,
    cache: FallbackCache,
    base_backoff: Duration,
}

impl IntegrationExecutor {
    pub fn new(generator: Arc<dyn TextGenerator>, breakers: Arc<CircuitBreakers>, base_backoff: Duration) -> Self {
        Self {
            generator,
            breakers,
            cache: FallbackCache::new(),
            base_backoff,
        }
    }

    /// 重试直到成功或耗尽；每次失败后等待 base * 2^(n-1)
    async fn call_with_retry(&self, task: &Task, service: &str) -> Result<(String, u32), String> {
        let mut last_error = String::new();
        for attempt in 1..=MAX_RETRIES {
            tracing::info!("Attempt {}/{} for {}", attempt, MAX_RETRIES, service);
            let prompt = format!(
                "Execute integration task: {}\nService: {}\nAttempt: {}",
                task.description, service, attempt
            );
            match self.generator.generate("You are an integration worker.", &prompt).await {
                Ok(data) => return Ok((data, attempt)),
                Err(e) => {
                    last_error = e;
                    if attempt < MAX_RETRIES {
                        let backoff = self.base_backoff * 2u32.pow(attempt - 1);
                        tracing::warn!("Retry in {:?} after error: {}", backoff, last_error);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    fn degraded(&self, service: &str, strategy: &str) -> TaskOutput {
        let fallback = self.cache.degrade(service);
        TaskOutput::degraded(json!({
            "service": service,
            "fallback": fallback,
            "recovery_strategy": strategy,
        }))
    }
}

#[async_trait]
impl Executor for IntegrationExecutor {
    async fn execute(&self, task: &Task) -> anyhow::Result<TaskOutput> {
        let service = task.param_str("service").unwrap_or(DEFAULT_SERVICE);
        let breaker = self.breakers.get_or_create(service);

        if !breaker.can_execute() {
            tracing::warn!("Circuit OPEN for {}. Using fallback.", service);
            return Ok(self.degraded(service, "graceful_degradation"));
        }

        match self.call_with_retry(task, service).await {
            Ok((data, attempts)) => {
                breaker.record_success();
                self.cache.store(service, json!(data));
                Ok(TaskOutput::completed(json!({
                    "service": service,
                    "data": data,
                    "attempts": attempts,
                    "recovery_strategy": "none_needed",
                })))
            }
            Err(last_error) => {
                breaker.record_failure();
                if breaker.state() == CircuitState::Open {
                    return Ok(self.degraded(service, "circuit_breaker_to_fallback"));
                }
                Ok(TaskOutput {
                    status: TaskStatus::Failed,
                    payload: json!({
                        "service": service,
                        "recovery_strategy": "retry_exhausted",
                    }),
                    error: Some(last_error),
                })
            }
        }
    }
}
