//! 文本生成抽象
//!
//! 执行器通过 TextGenerator 获取自由文本；编排核心本身不直接调用。

use async_trait::async_trait;

/// 文本生成 trait：(system_prompt, user_prompt) -> 文本
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, String>;
}
