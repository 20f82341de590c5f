//! 工作流类型定义
//!
//! 定义任务、任务状态、工作流阶段与上下文等核心数据类型

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::quality::QualityReport;

pub type WorkflowId = String;
pub type TaskId = String;

/// 未指定执行器类型时使用的标签
pub const DEFAULT_EXECUTOR: &str = "generic";
/// results 中保留给失败原因的键；任务ID不可使用
pub const ERROR_KEY: &str = "error";

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// 等待依赖满足
    Pending,
    /// 依赖已满足，准备执行
    Ready,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

/// 工作流阶段（只能向前推进）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Pending,
    Planning,
    Executing,
    QualityCheck,
    Completed,
    Failed,
    /// 被审批拒绝或被外部中止
    Aborted,
}

impl WorkflowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowPhase::Completed | WorkflowPhase::Failed | WorkflowPhase::Aborted
        )
    }

    fn rank(&self) -> u8 {
        match self {
            WorkflowPhase::Pending => 0,
            WorkflowPhase::Planning => 1,
            WorkflowPhase::Executing => 2,
            WorkflowPhase::QualityCheck => 3,
            WorkflowPhase::Completed | WorkflowPhase::Failed | WorkflowPhase::Aborted => 4,
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowPhase::Pending => "pending",
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::Executing => "executing",
            WorkflowPhase::QualityCheck => "quality_check",
            WorkflowPhase::Completed => "completed",
            WorkflowPhase::Failed => "failed",
            WorkflowPhase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// 工作流中的任务节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务ID（工作流内唯一）
    pub id: TaskId,
    /// 执行器类型标签
    #[serde(default = "default_executor")]
    pub executor: String,
    /// 任务描述
    #[serde(default)]
    pub description: String,
    /// 依赖的任务ID（有序）
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// 执行状态
    #[serde(default = "default_state")]
    pub state: TaskState,
    /// 执行器参数（如 service；重试时附带 diagnostic_hint / attempt）
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_executor() -> String {
    DEFAULT_EXECUTOR.to_string()
}

fn default_state() -> TaskState {
    TaskState::Pending
}

impl Task {
    pub fn new(id: impl Into<TaskId>, executor: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            executor: executor.into(),
            description: description.into(),
            dependencies: Vec::new(),
            state: TaskState::Pending,
            params: Map::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// 执行器返回的状态；只有 Failed 被视为失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    /// 降级结果（熔断后使用缓存或默认值）
    Degraded,
    Other(String),
}

/// 执行器的结构化结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub status: TaskStatus,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutput {
    pub fn completed(payload: impl Into<Value>) -> Self {
        Self {
            status: TaskStatus::Completed,
            payload: payload.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn degraded(payload: impl Into<Value>) -> Self {
        Self {
            status: TaskStatus::Degraded,
            payload: payload.into(),
            error: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    /// 失败原因文本（供诊断分类）
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("executor reported failure: {}", self.payload))
    }
}

/// 单次工作流运行的上下文；进入终态后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub id: WorkflowId,
    pub name: String,
    pub goal: String,
    pub phase: WorkflowPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 涉及的执行器类型（去重、有序）
    pub executors_involved: Vec<String>,
    /// 计划快照（含任务状态）
    pub tasks: Vec<Task>,
    /// 任务ID -> 结果；失败原因记录在 "error" 键下
    pub results: BTreeMap<String, Value>,
    /// 任务ID -> 派发次数（首次 + 修复重试）
    pub attempts: BTreeMap<TaskId, u32>,
    pub quality_report: Option<QualityReport>,
    pub metadata: Map<String, Value>,
}

impl WorkflowContext {
    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("wf_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            goal: goal.into(),
            phase: WorkflowPhase::Pending,
            created_at: now,
            updated_at: now,
            executors_involved: Vec::new(),
            tasks: Vec::new(),
            results: BTreeMap::new(),
            attempts: BTreeMap::new(),
            quality_report: None,
            metadata: Map::new(),
        }
    }

    /// 推进阶段；倒退、原地或终态之后的转换返回 false
    pub fn advance(&mut self, next: WorkflowPhase) -> bool {
        if self.phase.is_terminal() || next.rank() <= self.phase.rank() {
            return false;
        }
        self.phase = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn set_task_state(&mut self, task_id: &str, state: TaskState) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.state = state;
        }
    }

    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.id == task_id).map(|t| t.state)
    }

    pub fn error(&self) -> Option<&str> {
        self.results.get(ERROR_KEY).and_then(Value::as_str)
    }
}
