//! 可观测性：日志初始化与执行指标

pub mod metrics;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use metrics::{ExecutionMetrics, ExecutorSummary};

/// 日志：默认 info，可通过 RUST_LOG 覆盖；重复初始化时忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
