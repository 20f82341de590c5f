//! 工作流编排器
//!
//! 驱动单次工作流运行：Pending → Planning → (审批) → Executing → QualityCheck → 终态。
//!
//! 执行阶段每个节拍从 DependencyScheduler 取出就绪批次，并行派发（tokio::spawn + join_all），
//! 整批返回后再计算下一批。任务失败进入有界的诊断-重试子循环（每次先诊断、等待指数退避再重新派发），
//! 耗尽后整个工作流立即失败，不再调度后续批次。所有错误与 panic 都在顶层捕获并转为 Failed，
//! execute_workflow 永远不会向调用方返回错误。

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::agents::{ExecutorDeps, ExecutorRegistry};
use crate::board::{Board, WorkflowProposal};
use crate::config::{AppConfig, OrchestratorSection};
use crate::core::{OrchestratorError, RecoveryEngine, TaskScheduler};
use crate::llm::TextGenerator;
use crate::observability::ExecutionMetrics;
use crate::protocol::{roles, Intent, Mailbox, Priority};
use crate::quality::{QualityGateRunner, ThresholdGates};
use crate::resilience::{BreakerConfig, CircuitBreakers};
use crate::workflow::graph::DependencyScheduler;
use crate::workflow::planner::{Planner, TemplatePlanner};
use crate::workflow::types::*;

/// 一次工作流执行请求
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub name: String,
    pub goal: String,
    /// 为空时由 Planner 生成
    pub plan: Option<Vec<Task>>,
    pub quality_gates: Vec<String>,
    pub require_approval: bool,
    /// 提案属性（交给 Board）
    pub complexity: u8,
    pub touches_external_services: bool,
    pub touches_database: bool,
    pub estimated_minutes: u64,
}

impl WorkflowRequest {
    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            plan: None,
            quality_gates: Vec::new(),
            require_approval: false,
            complexity: 5,
            touches_external_services: false,
            touches_database: false,
            estimated_minutes: 60,
        }
    }

    pub fn with_plan(mut self, plan: Vec<Task>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_quality_gates<I, S>(mut self, gates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quality_gates = gates.into_iter().map(Into::into).collect();
        self
    }

    pub fn require_approval(mut self) -> Self {
        self.require_approval = true;
        self
    }

    pub fn complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn touches_external_services(mut self, value: bool) -> Self {
        self.touches_external_services = value;
        self
    }

    pub fn touches_database(mut self, value: bool) -> Self {
        self.touches_database = value;
        self
    }

    pub fn estimated_minutes(mut self, minutes: u64) -> Self {
        self.estimated_minutes = minutes;
        self
    }

    fn proposal_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("goal".into(), json!(self.goal));
        metadata.insert("complexity".into(), json!(self.complexity));
        metadata.insert("touches_external".into(), json!(self.touches_external_services));
        metadata.insert("touches_database".into(), json!(self.touches_database));
        metadata.insert("estimated_minutes".into(), json!(self.estimated_minutes));
        metadata
    }
}

/// 工作流编排器
pub struct Orchestrator {
    executors: ExecutorRegistry,
    planner: Arc<dyn Planner>,
    quality: Arc<dyn QualityGateRunner>,
    board: Arc<Board>,
    mailbox: Option<Arc<Mailbox>>,
    recovery: RecoveryEngine,
    scheduler: TaskScheduler,
    metrics: Arc<ExecutionMetrics>,
    config: OrchestratorSection,
    workflows: RwLock<HashMap<WorkflowId, WorkflowContext>>,
}

impl Orchestrator {
    /// 创建编排器；Planner、质量门、Board 使用默认实现，可通过 with_* 替换
    pub fn new(executors: ExecutorRegistry, config: OrchestratorSection) -> Self {
        Self {
            executors,
            planner: Arc::new(TemplatePlanner),
            quality: Arc::new(ThresholdGates::default()),
            board: Arc::new(Board::new()),
            mailbox: None,
            recovery: RecoveryEngine::new(),
            scheduler: TaskScheduler::new(config.max_parallel),
            metrics: Arc::new(ExecutionMetrics::new()),
            config,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// 按应用配置装配：内置执行器、熔断器、Board 拒绝阈值、邮箱默认 TTL
    pub fn from_config(cfg: &AppConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let deps = ExecutorDeps {
            generator,
            breakers: Arc::new(CircuitBreakers::new(BreakerConfig::from(&cfg.breaker))),
            retry_backoff: Duration::from_millis(cfg.orchestrator.retry_backoff_ms),
        };
        Self::new(ExecutorRegistry::with_builtins(&deps), cfg.orchestrator.clone())
            .with_board(Arc::new(Board::with_rejection_threshold(cfg.board.rejection_threshold)))
            .with_mailbox(Arc::new(Mailbox::with_default_ttl(cfg.mailbox.default_ttl_secs)))
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_quality_gates(mut self, quality: Arc<dyn QualityGateRunner>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_board(mut self, board: Arc<Board>) -> Self {
        self.board = board;
        self
    }

    /// 挂载邮箱后，重试耗尽会向 board 发 Escalate，完成时发 Report
    pub fn with_mailbox(mut self, mailbox: Arc<Mailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    pub fn mailbox(&self) -> Option<&Arc<Mailbox>> {
        self.mailbox.as_ref()
    }

    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    /// 执行完整工作流，返回最终上下文；不会返回错误
    pub async fn execute_workflow(&self, request: WorkflowRequest) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(&request.name, &request.goal);
        ctx.metadata.extend(request.proposal_metadata());
        self.workflows.write().await.insert(ctx.id.clone(), ctx.clone());
        tracing::info!("Workflow {} ({}) started", ctx.id, ctx.name);

        let outcome = AssertUnwindSafe(self.run(&mut ctx, request)).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("Workflow crashed: {}", panic_message(panic))),
        };

        if let Some(error) = error {
            tracing::error!("Workflow {} failed: {}", ctx.id, error);
            ctx.results.insert(ERROR_KEY.into(), Value::String(error));
            self.transition(&mut ctx, WorkflowPhase::Failed).await;
        }
        ctx
    }

    /// 查询工作流当前记录
    pub async fn get_status(&self, workflow_id: &str) -> Option<WorkflowContext> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowContext> {
        let mut all: Vec<WorkflowContext> = self.workflows.read().await.values().cloned().collect();
        all.sort_by_key(|ctx| ctx.created_at);
        all
    }

    /// 将仍在进行中的工作流标记为 Aborted；不取消正在执行的派发，
    /// 编排循环在调度下一批前观察到中止后停止
    pub async fn abort_workflow(&self, workflow_id: &str) -> bool {
        let mut workflows = self.workflows.write().await;
        let Some(ctx) = workflows.get_mut(workflow_id) else {
            return false;
        };
        let aborted = ctx.advance(WorkflowPhase::Aborted);
        if aborted {
            tracing::warn!("Workflow {} aborted", workflow_id);
        }
        aborted
    }

    async fn run(&self, ctx: &mut WorkflowContext, request: WorkflowRequest) -> Result<(), OrchestratorError> {
        let tasks = match request.plan.clone() {
            Some(plan) => plan,
            None => {
                tracing::info!("Planning workflow for goal: {}", request.goal);
                self.planner
                    .create_plan(&request.goal)
                    .await
                    .map_err(|e| OrchestratorError::Planning(e.to_string()))?
            }
        };

        self.phase_planning(ctx, &tasks).await?;

        if request.require_approval && !self.request_approval(ctx, &request).await {
            self.transition(ctx, WorkflowPhase::Aborted).await;
            return Ok(());
        }

        if !self.transition(ctx, WorkflowPhase::Executing).await {
            return Ok(());
        }
        self.phase_executing(ctx, &tasks).await?;
        if ctx.phase.is_terminal() {
            return Ok(());
        }

        if !request.quality_gates.is_empty() {
            self.phase_quality_check(ctx, &request.quality_gates).await?;
        }

        if self.transition(ctx, WorkflowPhase::Completed).await {
            tracing::info!("Workflow {} completed", ctx.id);
            self.notify(
                Intent::Report,
                Priority::Medium,
                json!({
                    "workflow_id": ctx.id,
                    "name": ctx.name,
                    "tasks_completed": ctx.tasks.len(),
                }),
            );
        }
        Ok(())
    }

    async fn phase_planning(&self, ctx: &mut WorkflowContext, tasks: &[Task]) -> Result<(), OrchestratorError> {
        self.transition(ctx, WorkflowPhase::Planning).await;

        let mut seen = HashSet::new();
        for task in tasks {
            if task.id == ERROR_KEY {
                return Err(OrchestratorError::ReservedTaskId(task.id.clone()));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(OrchestratorError::DuplicateTask(task.id.clone()));
            }
        }

        let executors: BTreeSet<String> = tasks.iter().map(|t| t.executor.clone()).collect();
        for tag in &executors {
            if self.executors.resolve(tag).is_none() {
                return Err(OrchestratorError::UnknownExecutor(tag.clone()));
            }
        }

        ctx.executors_involved = executors.into_iter().collect();
        ctx.tasks = tasks.to_vec();
        ctx.metadata.insert("planned_tasks".into(), json!(tasks.len()));
        self.publish(ctx).await;
        Ok(())
    }

    /// 提交提案给 Board；批准时把条件写入 metadata
    async fn request_approval(&self, ctx: &mut WorkflowContext, request: &WorkflowRequest) -> bool {
        tracing::info!("Requesting board review for workflow {}", ctx.id);
        let proposal = WorkflowProposal {
            workflow_name: ctx.name.clone(),
            complexity: request.complexity,
            executors: ctx.executors_involved.clone(),
            estimated_minutes: request.estimated_minutes,
            touches_external_services: request.touches_external_services,
            touches_database: request.touches_database,
        };
        let decision = self.board.review(&proposal);

        ctx.metadata.insert("board_reviewer".into(), json!(decision.reviewer.as_str()));
        ctx.metadata.insert("board_risk".into(), json!(decision.risk.as_str()));
        if decision.approved {
            ctx.metadata.insert("board_conditions".into(), json!(decision.conditions));
        } else {
            tracing::warn!("Board rejected workflow {}: {}", ctx.id, decision.reason);
            ctx.metadata.insert("board_rejection_reason".into(), json!(decision.reason));
        }
        self.publish(ctx).await;
        decision.approved
    }

    async fn phase_executing(&self, ctx: &mut WorkflowContext, tasks: &[Task]) -> Result<(), OrchestratorError> {
        let mut completed: HashSet<TaskId> = HashSet::new();

        while !DependencyScheduler::is_complete(tasks, &completed) {
            if !self.publish(ctx).await {
                tracing::warn!("Workflow {} was aborted, no further batches scheduled", ctx.id);
                return Ok(());
            }

            let batch: Vec<Task> = DependencyScheduler::ready_tasks(tasks, &completed)
                .into_iter()
                .cloned()
                .collect();
            if batch.is_empty() {
                let pending = DependencyScheduler::pending_ids(tasks, &completed);
                tracing::error!("Deadlock detected in workflow {}: {:?}", ctx.id, pending);
                return Err(OrchestratorError::Deadlock { pending });
            }

            let batch_ids: Vec<&str> = batch.iter().map(|t| t.id.as_str()).collect();
            tracing::info!("Executing batch: {:?}", batch_ids);
            for task in &batch {
                ctx.set_task_state(&task.id, TaskState::Ready);
                ctx.set_task_state(&task.id, TaskState::Running);
            }
            self.publish(ctx).await;

            // 扇出 / 扇入：整批结束后才处理结果
            let outcomes = join_all(batch.iter().map(|task| self.dispatch(task))).await;

            for (task, outcome) in batch.iter().zip(outcomes) {
                *ctx.attempts.entry(task.id.clone()).or_default() += 1;
                let output = match outcome {
                    Ok(output) => output,
                    Err(error) => {
                        tracing::warn!("Task {} failed: {}. Entering diagnose-retry loop.", task.id, error);
                        match self.recover(ctx, task, error).await {
                            Ok(Some(output)) => output,
                            Ok(None) => {
                                tracing::warn!("Workflow {} was aborted during recovery of task {}", ctx.id, task.id);
                                return Ok(());
                            }
                            Err(e) => {
                                ctx.set_task_state(&task.id, TaskState::Failed);
                                self.escalate(ctx, task, &e);
                                return Err(e);
                            }
                        }
                    }
                };
                ctx.set_task_state(&task.id, TaskState::Completed);
                ctx.results.insert(task.id.clone(), output.payload);
                completed.insert(task.id.clone());
            }
        }

        self.publish(ctx).await;
        Ok(())
    }

    /// 诊断-重试子循环：最多 max_fix_attempts 次，第一次非失败结果即完成；
    /// 每次重新派发前若发现工作流已被中止则返回 None
    async fn recover(
        &self,
        ctx: &mut WorkflowContext,
        task: &Task,
        first_error: String,
    ) -> Result<Option<TaskOutput>, OrchestratorError> {
        let max = self.config.max_fix_attempts;
        let mut last_error = first_error;

        for attempt in 1..=max {
            let diagnosis = self.recovery.diagnose(&last_error);
            tracing::info!(
                "Fix attempt {}/{} for task {} ({:?}, {})",
                attempt,
                max,
                task.id,
                diagnosis.category,
                diagnosis.action
            );

            let delay = self.config.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if !self.publish(ctx).await {
                return Ok(None);
            }

            let mut retry = task.clone();
            retry.params.insert("diagnostic_hint".into(), json!(diagnosis.hint));
            retry.params.insert("recovery_action".into(), json!(diagnosis.action.as_str()));
            retry.params.insert("attempt".into(), json!(attempt + 1));

            *ctx.attempts.entry(task.id.clone()).or_default() += 1;
            match self.dispatch(&retry).await {
                Ok(output) => {
                    tracing::info!("Fixed task {} on attempt {}", task.id, attempt);
                    return Ok(Some(output));
                }
                Err(e) => last_error = e,
            }
        }

        let attempts = ctx.attempts.get(&task.id).copied().unwrap_or(0);
        tracing::error!("Task {} failed after {} attempts", task.id, attempts);
        Err(OrchestratorError::RetriesExhausted {
            task: task.id.clone(),
            attempts,
            last_error,
        })
    }

    /// 派发单个任务；Err 为失败原因（执行器报错、Failed 状态、超时或 panic）
    async fn dispatch(&self, task: &Task) -> Result<TaskOutput, String> {
        let Some(executor) = self.executors.resolve(&task.executor) else {
            return Err(format!("Unknown executor: {}", task.executor));
        };
        let _permit = self.scheduler.acquire().await.map_err(|e| e.to_string())?;

        let start = Instant::now();
        let deadline = self.config.task_timeout();
        let owned = task.clone();
        let handle = tokio::spawn(async move { tokio::time::timeout(deadline, executor.execute(&owned)).await });

        let result = match handle.await {
            Ok(Ok(Ok(output))) if output.is_failure() => Err(output.failure_reason()),
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(format!("{e:#}")),
            Ok(Err(_)) => Err(format!("Task {} timed out after {}s", task.id, deadline.as_secs())),
            Err(e) => Err(format!("Task {} panicked: {}", task.id, e)),
        };

        let elapsed = start.elapsed();
        self.metrics
            .record(&task.executor, &task.id, elapsed, result.as_ref().err().map(String::as_str));
        let audit = json!({
            "event": "task_audit",
            "task": task.id,
            "executor": task.executor,
            "ok": result.is_ok(),
            "duration_ms": elapsed.as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "task");

        result
    }

    async fn phase_quality_check(&self, ctx: &mut WorkflowContext, gates: &[String]) -> Result<(), OrchestratorError> {
        if !self.transition(ctx, WorkflowPhase::QualityCheck).await {
            return Ok(());
        }
        tracing::info!("Running quality gates: {:?}", gates);

        let report = self.quality.check(&ctx.results, gates).await;
        let passed = report.passed;
        let summary = report.failure_summary();
        ctx.quality_report = Some(report);

        if passed {
            tracing::info!("Quality gates passed");
            Ok(())
        } else {
            Err(OrchestratorError::QualityGateFailed(summary))
        }
    }

    /// 阶段转换并写回注册表；记录已被外部中止时采用中止状态并返回 false
    async fn transition(&self, ctx: &mut WorkflowContext, next: WorkflowPhase) -> bool {
        let mut workflows = self.workflows.write().await;
        if let Some(record) = workflows.get(&ctx.id) {
            if record.phase.is_terminal() {
                ctx.phase = record.phase;
                ctx.updated_at = record.updated_at;
                return false;
            }
        }

        let from = ctx.phase;
        if !ctx.advance(next) {
            return false;
        }
        tracing::info!("Workflow {}: {} -> {}", ctx.id, from, next);
        workflows.insert(ctx.id.clone(), ctx.clone());
        true
    }

    /// 写回当前进度；记录已进入终态（外部中止）时返回 false
    async fn publish(&self, ctx: &mut WorkflowContext) -> bool {
        let mut workflows = self.workflows.write().await;
        match workflows.get(&ctx.id) {
            Some(record) if record.phase.is_terminal() => {
                ctx.phase = record.phase;
                ctx.updated_at = record.updated_at;
                false
            }
            _ => {
                ctx.updated_at = Utc::now();
                workflows.insert(ctx.id.clone(), ctx.clone());
                true
            }
        }
    }

    fn escalate(&self, ctx: &WorkflowContext, task: &Task, error: &OrchestratorError) {
        self.notify(
            Intent::Escalate,
            Priority::High,
            json!({
                "workflow_id": ctx.id,
                "task_id": task.id,
                "executor": task.executor,
                "error": error.to_string(),
            }),
        );
    }

    fn notify(&self, intent: Intent, priority: Priority, payload: Value) {
        if let Some(mailbox) = &self.mailbox {
            let message = mailbox
                .message(roles::ORCHESTRATOR, roles::BOARD, intent)
                .with_priority(priority)
                .with_payload(payload);
            mailbox.send(message);
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Executor;
    use crate::workflow::PlanBuilder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OkExecutor;

    #[async_trait]
    impl Executor for OkExecutor {
        async fn execute(&self, task: &Task) -> anyhow::Result<TaskOutput> {
            Ok(TaskOutput::completed(json!({ "task": task.id })))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl Executor for PanickingExecutor {
        async fn execute(&self, _task: &Task) -> anyhow::Result<TaskOutput> {
            panic!("executor exploded")
        }
    }

    struct FailingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for FailingExecutor {
        async fn execute(&self, _task: &Task) -> anyhow::Result<TaskOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TaskOutput::failed("upstream returned 500"))
        }
    }

    struct SlowExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for SlowExecutor {
        async fn execute(&self, task: &Task) -> anyhow::Result<TaskOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(TaskOutput::completed(json!({ "task": task.id })))
        }
    }

    fn config() -> OrchestratorSection {
        OrchestratorSection {
            retry_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Default::default()
        }
    }

    fn orchestrator_with(executor: Arc<dyn Executor>) -> Orchestrator {
        let mut registry = ExecutorRegistry::new();
        registry.register(DEFAULT_EXECUTOR, executor);
        Orchestrator::new(registry, config())
    }

    #[tokio::test]
    async fn test_generated_plan_when_none_given() {
        let orchestrator = orchestrator_with(Arc::new(OkExecutor));
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("auto", "build a parser"))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Completed);
        assert_eq!(ctx.tasks.len(), 5);
        assert_eq!(ctx.metadata["planned_tasks"], 5);
        assert_eq!(
            ctx.executors_involved,
            vec!["analyzer", "architect", "developer", "reviewer", "tester"]
        );
    }

    #[tokio::test]
    async fn test_deadlock_fails_without_hanging() {
        let orchestrator = orchestrator_with(Arc::new(OkExecutor));
        let plan = PlanBuilder::new()
            .task("a", DEFAULT_EXECUTOR, "A")
            .task("b", DEFAULT_EXECUTOR, "B")
            .sequential("a", "b")
            .sequential("b", "a")
            .build()
            .unwrap();
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("cycle", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
        assert!(ctx.error().unwrap().contains("Deadlock"));
        assert!(orchestrator.metrics().total_dispatches() == 0);
    }

    #[tokio::test]
    async fn test_panicking_executor_is_contained() {
        let orchestrator = orchestrator_with(Arc::new(PanickingExecutor));
        let plan = vec![Task::new("boom", DEFAULT_EXECUTOR, "explode")];
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("panic", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
        assert_eq!(ctx.attempts["boom"], 4);
        assert!(ctx.error().unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_unknown_executor_fails_in_planning() {
        let orchestrator = Orchestrator::new(ExecutorRegistry::new(), config());
        let plan = vec![Task::new("1", "code_worker", "x")];
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("wf", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
        assert!(ctx.error().unwrap().contains("Unknown executor"));
    }

    #[tokio::test]
    async fn test_duplicate_task_ids_fail() {
        let orchestrator = orchestrator_with(Arc::new(OkExecutor));
        let plan = vec![
            Task::new("1", DEFAULT_EXECUTOR, "x"),
            Task::new("1", DEFAULT_EXECUTOR, "y"),
        ];
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("wf", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
    }

    #[tokio::test]
    async fn test_task_deadline_counts_as_failure() {
        let slow = Arc::new(SlowExecutor {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ExecutorRegistry::new();
        registry.register(DEFAULT_EXECUTOR, slow.clone());
        let orchestrator = Orchestrator::new(
            registry,
            OrchestratorSection {
                task_timeout_secs: 0,
                max_fix_attempts: 1,
                ..config()
            },
        );
        let plan = vec![Task::new("slow", DEFAULT_EXECUTOR, "x")];
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("wf", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
        assert!(ctx.error().unwrap().contains("timed out"));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abort_stops_next_batch() {
        let slow = Arc::new(SlowExecutor {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Arc::new(orchestrator_with(slow.clone()));
        let plan = PlanBuilder::new()
            .task("a", DEFAULT_EXECUTOR, "A")
            .task("b", DEFAULT_EXECUTOR, "B")
            .sequential("a", "b")
            .build()
            .unwrap();

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move {
            runner
                .execute_workflow(WorkflowRequest::new("abortable", "").with_plan(plan))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = orchestrator.list_workflows().await[0].id.clone();
        assert!(orchestrator.abort_workflow(&id).await);
        assert!(!orchestrator.abort_workflow(&id).await);
        assert_eq!(
            orchestrator.get_status(&id).await.unwrap().phase,
            WorkflowPhase::Aborted
        );

        let ctx = handle.await.unwrap();
        assert_eq!(ctx.phase, WorkflowPhase::Aborted);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            orchestrator.get_status(&id).await.unwrap().phase,
            WorkflowPhase::Aborted
        );
    }

    #[tokio::test]
    async fn test_abort_unknown_or_finished_workflow() {
        let orchestrator = orchestrator_with(Arc::new(OkExecutor));
        assert!(!orchestrator.abort_workflow("wf_missing").await);

        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("done", "").with_plan(vec![Task::new(
                "1",
                DEFAULT_EXECUTOR,
                "x",
            )]))
            .await;
        assert!(!orchestrator.abort_workflow(&ctx.id).await);
        assert_eq!(
            orchestrator.get_status(&ctx.id).await.unwrap().phase,
            WorkflowPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_task_named_error_is_rejected() {
        let orchestrator = orchestrator_with(Arc::new(OkExecutor));
        let plan = vec![Task::new(ERROR_KEY, DEFAULT_EXECUTOR, "x")];
        let ctx = orchestrator
            .execute_workflow(WorkflowRequest::new("wf", "").with_plan(plan))
            .await;
        assert_eq!(ctx.phase, WorkflowPhase::Failed);
        assert_eq!(ctx.error(), Some("Reserved task id: error"));
        assert_eq!(orchestrator.metrics().total_dispatches(), 0);
    }

    #[tokio::test]
    async fn test_abort_during_backoff_skips_remaining_fixes() {
        let failing = Arc::new(FailingExecutor {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ExecutorRegistry::new();
        registry.register(DEFAULT_EXECUTOR, failing.clone());
        let orchestrator = Arc::new(Orchestrator::new(
            registry,
            OrchestratorSection {
                retry_backoff_ms: 200,
                max_backoff_ms: 1000,
                ..Default::default()
            },
        ));

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move {
            runner
                .execute_workflow(
                    WorkflowRequest::new("retrying", "").with_plan(vec![Task::new("a", DEFAULT_EXECUTOR, "x")]),
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = orchestrator.list_workflows().await[0].id.clone();
        assert!(orchestrator.abort_workflow(&id).await);

        let ctx = handle.await.unwrap();
        assert_eq!(ctx.phase, WorkflowPhase::Aborted);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert!(ctx.error().is_none());
    }
}
