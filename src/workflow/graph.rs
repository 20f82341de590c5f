//! 工作流依赖调度
//!
//! 每个调度节拍都从扁平任务列表与已完成集合重新计算就绪任务，不维护增量图。

use std::collections::HashSet;

use crate::workflow::types::*;

/// 依赖调度器：纯函数，作用于不可变快照
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyScheduler;

impl DependencyScheduler {
    /// 按输入顺序返回未完成且全部依赖已完成的任务
    ///
    /// 依赖了任务集中不存在的 ID 的任务永远不会就绪，由编排器按死锁处理。
    pub fn ready_tasks<'a>(tasks: &'a [Task], completed: &HashSet<TaskId>) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|task| !completed.contains(&task.id))
            .filter(|task| task.dependencies.iter().all(|dep| completed.contains(dep)))
            .collect()
    }

    /// 所有任务都已完成
    pub fn is_complete(tasks: &[Task], completed: &HashSet<TaskId>) -> bool {
        tasks.iter().all(|task| completed.contains(&task.id))
    }

    /// 尚未完成的任务ID（按输入顺序）
    pub fn pending_ids(tasks: &[Task], completed: &HashSet<TaskId>) -> Vec<TaskId> {
        tasks
            .iter()
            .filter(|task| !completed.contains(&task.id))
            .map(|task| task.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, DEFAULT_EXECUTOR, format!("Task {id}")).with_dependencies(deps.iter().copied())
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_ready_tasks_in_input_order() {
        let tasks = vec![task("c", &[]), task("a", &[]), task("b", &["a"])];
        let completed = HashSet::new();
        let ready = DependencyScheduler::ready_tasks(&tasks, &completed);
        assert_eq!(ids(&ready), vec!["c", "a"]);
    }

    #[test]
    fn test_ready_tasks_excludes_completed_and_blocked() {
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["a", "b"])];
        let completed: HashSet<TaskId> = ["a".to_string()].into();
        let ready = DependencyScheduler::ready_tasks(&tasks, &completed);
        assert_eq!(ids(&ready), vec!["b"]);
    }

    #[test]
    fn test_folding_acyclic_graph_reaches_completion() {
        let tasks = vec![
            task("1", &[]),
            task("2", &["1"]),
            task("3", &["2"]),
            task("4", &["2"]),
            task("5", &["3", "4"]),
        ];
        let mut completed = HashSet::new();
        let mut ticks = 0;
        while !DependencyScheduler::is_complete(&tasks, &completed) {
            let ready = DependencyScheduler::ready_tasks(&tasks, &completed);
            assert!(!ready.is_empty(), "acyclic graph must always make progress");
            for t in &ready {
                assert!(t.dependencies.iter().all(|d| completed.contains(d)));
            }
            let batch: Vec<TaskId> = ready.iter().map(|t| t.id.clone()).collect();
            completed.extend(batch);
            ticks += 1;
        }
        assert_eq!(ticks, 4);
    }

    #[test]
    fn test_cycle_is_never_ready() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let completed = HashSet::new();
        assert!(DependencyScheduler::ready_tasks(&tasks, &completed).is_empty());
        assert!(!DependencyScheduler::is_complete(&tasks, &completed));
        assert_eq!(DependencyScheduler::pending_ids(&tasks, &completed), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_dependency_is_never_ready() {
        let tasks = vec![task("a", &["ghost"])];
        let completed = HashSet::new();
        assert!(DependencyScheduler::ready_tasks(&tasks, &completed).is_empty());
    }

    #[test]
    fn test_empty_task_set_is_complete() {
        assert!(DependencyScheduler::is_complete(&[], &HashSet::new()));
    }
}
