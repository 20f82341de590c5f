//! 计划构建器
//!
//! 提供流畅的API来构建任务列表

use std::collections::HashSet;

use serde_json::Value;

use crate::core::OrchestratorError;
use crate::workflow::types::*;

/// 计划构建器
#[derive(Debug, Default)]
pub struct PlanBuilder {
    tasks: Vec<Task>,
}

impl PlanBuilder {
    /// 创建新的计划构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任务
    pub fn task(
        mut self,
        id: impl Into<TaskId>,
        executor: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.tasks.push(Task::new(id, executor, description));
        self
    }

    /// 设置依赖（覆盖已有依赖）
    pub fn depends_on<I, S>(mut self, task_id: &str, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.dependencies = deps.into_iter().map(Into::into).collect();
        }
        self
    }

    /// 设置顺序依赖
    pub fn sequential(self, from: &str, to: &str) -> Self {
        self.depends_on(to, [from])
    }

    /// 设置执行器参数
    pub fn param(mut self, task_id: &str, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.params.insert(key.into(), value.into());
        }
        self
    }

    /// 构建任务列表；任务ID重复时报错
    pub fn build(self) -> Result<Vec<Task>, OrchestratorError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(OrchestratorError::DuplicateTask(task.id.clone()));
            }
        }
        Ok(self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_linear_plan() {
        let plan = PlanBuilder::new()
            .task("a", "code_worker", "Step A")
            .task("b", "code_worker", "Step B")
            .task("c", "test_worker", "Step C")
            .sequential("a", "b")
            .sequential("b", "c")
            .param("c", "service", "ci")
            .build()
            .expect("Failed to build plan");

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[1].dependencies, vec!["a".to_string()]);
        assert_eq!(plan[2].param_str("service"), Some("ci"));
    }

    #[test]
    fn test_duplicate_ids_fail() {
        let result = PlanBuilder::new()
            .task("a", "generic", "first")
            .task("a", "generic", "second")
            .build();

        assert!(matches!(result, Err(OrchestratorError::DuplicateTask(id)) if id == "a"));
    }
}
