//! Hive - 多执行器工作流编排与弹性内核
//!
//! 模块划分：
//! - **agents**: 执行器 trait、注册表与内置执行器（generic / integration）
//! - **board**: 按复杂度路由的审批委员会
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、失败诊断、并发许可
//! - **llm**: 文本生成抽象与 Mock 实现
//! - **observability**: 日志初始化与执行指标
//! - **protocol**: 消息与优先级邮箱
//! - **quality**: 质量门
//! - **resilience**: 熔断器与降级缓存
//! - **workflow**: 任务模型、依赖调度、Planner 与编排器

pub mod agents;
pub mod board;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod quality;
pub mod resilience;
pub mod workflow;

pub use workflow::{Orchestrator, WorkflowContext, WorkflowPhase, WorkflowRequest};
