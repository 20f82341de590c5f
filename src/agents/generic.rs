//! 通用执行器：把任务描述（及重试时的诊断提示）交给文本生成器

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::Executor;
use crate::llm::TextGenerator;
use crate::workflow::{Task, TaskOutput};

pub struct GenericExecutor {
    name: String,
    generator: Arc<dyn TextGenerator>,
}

impl GenericExecutor {
    pub fn new(name: impl Into<String>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            name: name.into(),
            generator,
        }
    }
}

#[async_trait]
impl Executor for GenericExecutor {
    async fn execute(&self, task: &Task) -> anyhow::Result<TaskOutput> {
        tracing::debug!("{} executing task {}", self.name, task.id);
        let system = format!(
            "You are {}, a task executor in a multi-agent workflow. Complete the task and report the result.",
            self.name
        );
        let mut prompt = format!("Task {}: {}", task.id, task.description);
        if let Some(hint) = task.param_str("diagnostic_hint") {
            prompt.push_str("\n\nPrevious attempt failed. ");
            prompt.push_str(hint);
        }

        let output = self
            .generator
            .generate(&system, &prompt)
            .await
            .map_err(anyhow::Error::msg)?;

        Ok(TaskOutput::completed(serde_json::json!({
            "executor": self.name,
            "output": output,
        })))
    }
}
