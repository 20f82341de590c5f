//! 执行器（Agent）
//!
//! 所有执行器实现 Executor trait（execute），由 ExecutorRegistry 按类型标签注册与查找；
//! 未注册的标签回退到 "generic" 执行器。内置执行器是一个封闭集合，由 ExecutorKind 在构造时选择。

mod generic;
mod integration;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::TextGenerator;
use crate::resilience::CircuitBreakers;
use crate::workflow::{Task, TaskOutput, DEFAULT_EXECUTOR};

pub use generic::GenericExecutor;
pub use integration::IntegrationExecutor;

/// 执行器 trait：接收任务，返回结构化结果；Err 与 Failed 状态同样触发重试
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task) -> anyhow::Result<TaskOutput>;
}

/// 内置执行器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Generic,
    Integration,
}

impl ExecutorKind {
    /// 由类型标签选择内置执行器
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "integration" | "integration_worker" => ExecutorKind::Integration,
            _ => ExecutorKind::Generic,
        }
    }
}

/// 构造内置执行器所需的依赖
#[derive(Clone)]
pub struct ExecutorDeps {
    pub generator: Arc<dyn TextGenerator>,
    pub breakers: Arc<CircuitBreakers>,
    /// 集成执行器内部重试的基础退避
    pub retry_backoff: Duration,
}

/// 执行器注册表：按类型标签存储 Arc<dyn Executor>
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 generic 与 integration_worker 两个内置执行器
    pub fn with_builtins(deps: &ExecutorDeps) -> Self {
        let mut registry = Self::new();
        registry.register_kind(DEFAULT_EXECUTOR, ExecutorKind::Generic, deps);
        registry.register_kind("integration_worker", ExecutorKind::Integration, deps);
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, executor: Arc<dyn Executor>) {
        let tag = tag.into();
        tracing::info!("Executor registered: {}", tag);
        self.executors.insert(tag, executor);
    }

    pub fn register_kind(&mut self, tag: &str, kind: ExecutorKind, deps: &ExecutorDeps) {
        let executor: Arc<dyn Executor> = match kind {
            ExecutorKind::Generic => Arc::new(GenericExecutor::new(tag, deps.generator.clone())),
            ExecutorKind::Integration => Arc::new(IntegrationExecutor::new(
                deps.generator.clone(),
                deps.breakers.clone(),
                deps.retry_backoff,
            )),
        };
        self.register(tag, executor);
    }

    /// 按标签查找；未注册时回退到 generic
    pub fn resolve(&self, tag: &str) -> Option<Arc<dyn Executor>> {
        self.executors
            .get(tag)
            .or_else(|| self.executors.get(DEFAULT_EXECUTOR))
            .cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.executors.keys().cloned().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::resilience::BreakerConfig;

    fn deps() -> ExecutorDeps {
        ExecutorDeps {
            generator: Arc::new(MockGenerator::new()),
            breakers: Arc::new(CircuitBreakers::new(BreakerConfig::default())),
            retry_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(ExecutorKind::from_tag("integration_worker"), ExecutorKind::Integration);
        assert_eq!(ExecutorKind::from_tag("code_worker"), ExecutorKind::Generic);
    }

    #[tokio::test]
    async fn test_unknown_tag_falls_back_to_generic() {
        let registry = ExecutorRegistry::with_builtins(&deps());
        assert_eq!(registry.tags(), vec!["generic", "integration_worker"]);

        let executor = registry.resolve("architect").expect("generic fallback");
        let output = executor
            .execute(&Task::new("1", "architect", "Design it"))
            .await
            .unwrap();
        assert!(!output.is_failure());
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        assert!(ExecutorRegistry::new().resolve("generic").is_none());
    }
}
