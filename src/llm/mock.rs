//! Mock 文本生成器（用于测试与演示，无需 API）
//!
//! 回显 user prompt；可预置一串失败，用于驱动重试与熔断路径。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::llm::TextGenerator;

/// Mock 生成器：先依次返回预置错误，之后回显 user prompt
#[derive(Debug, Default)]
pub struct MockGenerator {
    failures: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置接下来若干次调用的错误
    pub fn failing_with<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failures: Mutex::new(errors.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next_failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next_failure {
            Some(error) => Err(error),
            None => Ok(format!("Echo from Mock: {user_prompt}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_prompt() {
        let generator = MockGenerator::new();
        let text = generator.generate("sys", "hello").await.unwrap();
        assert!(text.contains("hello"));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_failures_then_success() {
        let generator = MockGenerator::failing_with(["boom"]);
        assert_eq!(generator.generate("", "x").await.unwrap_err(), "boom");
        assert!(generator.generate("", "x").await.is_ok());
        assert_eq!(generator.calls(), 2);
    }
}
