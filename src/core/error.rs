//! 编排错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：失败文本先被分类，再映射为 CheckPerformance / LintCheck / TraceRootCause 等诊断动作。

use thiserror::Error;

use crate::workflow::TaskId;

/// 编排过程中可能出现的错误（执行器缺失、死锁、重试耗尽、质量门失败等）
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Unknown executor: {0}")]
    UnknownExecutor(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("Reserved task id: {0}")]
    ReservedTaskId(TaskId),

    #[error("Planning failed: {0}")]
    Planning(String),

    /// 仍有未完成任务但没有任何任务就绪（循环依赖或依赖缺失）
    #[error("Deadlock detected: unfinished tasks {pending:?} but no ready tasks")]
    Deadlock { pending: Vec<TaskId> },

    #[error("Task {task} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        task: TaskId,
        attempts: u32,
        last_error: String,
    },

    #[error("Quality gates failed: {0}")]
    QualityGateFailed(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// 恢复引擎根据失败类别给出的诊断动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 超时类：检查性能瓶颈、放宽资源
    CheckPerformance,
    /// 语法/解析类：先做静态检查
    LintCheck,
    /// 未知：沿调用链追查根因
    TraceRootCause,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::CheckPerformance => "check_performance",
            RecoveryAction::LintCheck => "lint_check",
            RecoveryAction::TraceRootCause => "trace_root_cause",
        }
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
