//! 计划生成
//!
//! 未提供显式计划时，编排器向 Planner 请求任务列表。TemplatePlanner 返回固定的五步模板：
//! 分析 → 设计 → {实现, 测试} → 验证。

use async_trait::async_trait;

use crate::workflow::builder::PlanBuilder;
use crate::workflow::types::Task;

/// 计划器 trait：目标 -> 任务列表
#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(&self, goal: &str) -> anyhow::Result<Vec<Task>>;
}

/// 模板计划器
#[derive(Debug, Default)]
pub struct TemplatePlanner;

#[async_trait]
impl Planner for TemplatePlanner {
    async fn create_plan(&self, goal: &str) -> anyhow::Result<Vec<Task>> {
        tracing::info!("Planning template workflow for goal: {}", goal);
        let plan = PlanBuilder::new()
            .task("1", "analyzer", format!("Analyze existing structure for: {goal}"))
            .task("2", "architect", "Design solution architecture")
            .task("3", "developer", "Implement core logic")
            .task("4", "tester", "Write unit tests")
            .task("5", "reviewer", "Verify integration")
            .sequential("1", "2")
            .sequential("2", "3")
            .sequential("2", "4")
            .depends_on("5", ["3", "4"])
            .build()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_plan_shape() {
        let plan = TemplatePlanner.create_plan("add login").await.unwrap();
        assert_eq!(plan.len(), 5);
        assert!(plan[0].description.contains("add login"));
        assert!(plan[0].dependencies.is_empty());
        assert_eq!(plan[4].dependencies, vec!["3".to_string(), "4".to_string()]);
    }
}
