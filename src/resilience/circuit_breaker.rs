//! 熔断器
//!
//! 按资源名隔离失败：连续失败达到阈值后打开，恢复超时后进入半开放行试探，
//! 半开时成功则关闭、失败则重新打开。熔断只是准入信号，不产生错误。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 正常放行
    Closed,
    /// 拒绝调用
    Open,
    /// 试探资源是否恢复
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// 熔断参数
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// 单个资源的熔断器
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// 记录一次失败；连续失败达到阈值（或半开试探失败）时打开
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        if inner.failure_count >= self.config.failure_threshold && inner.state != CircuitState::Open {
            tracing::warn!(
                "Circuit breaker for {} opening after {} failures",
                self.name,
                inner.failure_count
            );
            inner.state = CircuitState::Open;
        }
    }

    /// 记录一次成功：计数清零并关闭
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit breaker for {} closing after successful call", self.name);
        }
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
    }

    /// 准入检查：关闭放行；打开时超过恢复时间转半开并放行；半开放行
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(Duration::MAX, |at| at.elapsed());
                if elapsed >= self.config.recovery_timeout {
                    tracing::info!("Circuit breaker for {} half-open, allowing trial call", self.name);
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 按资源名懒创建的熔断器集合，组件生命周期内持续存在
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config)))
            .clone()
    }

    /// 所有熔断器的当前状态
    pub fn states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "payments",
            BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_success_resets() {
        let cb = breaker(2, 60_000);
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.can_execute());
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
    }

    #[test]
    fn test_zero_recovery_timeout_goes_half_open() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recovery_after_timeout_elapses() {
        let cb = breaker(1, 20);
        cb.record_failure();
        assert!(!cb.can_execute());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_registry_reuses_breakers() {
        let registry = CircuitBreakers::new(BreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
        });
        registry.get_or_create("db").record_failure();
        assert!(!registry.get_or_create("db").can_execute());
        assert!(registry.get_or_create("cache").can_execute());

        let states = registry.states();
        assert_eq!(states.get("db"), Some(&CircuitState::Open));
        assert_eq!(states.get("cache"), Some(&CircuitState::Closed));
    }
}
