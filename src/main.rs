//! Hive - 工作流编排命令行
//!
//! 入口：初始化日志、加载配置、用 Mock 生成器装配编排器，对命令行给出的目标运行一次工作流，
//! 并以 JSON 输出最终上下文与执行指标。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hive::core::OrchestratorError;
use hive::llm::MockGenerator;
use hive::{config::load_config, observability, Orchestrator, WorkflowPhase, WorkflowRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut goal_parts = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(args.next().context("--config requires a path")?));
        } else {
            goal_parts.push(arg);
        }
    }
    let goal = if goal_parts.is_empty() {
        "Build a REST API with authentication".to_string()
    } else {
        goal_parts.join(" ")
    };

    let cfg = load_config(config_path).map_err(|e| OrchestratorError::Config(e.to_string()))?;
    let orchestrator = Orchestrator::from_config(&cfg, Arc::new(MockGenerator::new()));

    let request = WorkflowRequest::new("cli", &goal).require_approval();
    let ctx = orchestrator.execute_workflow(request).await;

    let report = serde_json::json!({
        "workflow": ctx,
        "metrics": orchestrator.metrics().summary(),
        "top_errors": orchestrator.metrics().top_errors(5),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize workflow report")?
    );

    if ctx.phase != WorkflowPhase::Completed {
        anyhow::bail!("Workflow ended in phase {}", ctx.phase);
    }
    Ok(())
}
