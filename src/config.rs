//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ORCHESTRATOR__MAX_PARALLEL=8`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::resilience::BreakerConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorSection,
    pub mailbox: MailboxSection,
    pub breaker: BreakerSection,
    pub board: BoardSection,
}

/// [orchestrator] 段：重试、退避、单任务超时、并行度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 首次派发失败后的最大修复重试次数
    pub max_fix_attempts: u32,
    /// 第 n 次重试前等待 retry_backoff_ms * 2^(n-1)
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 单次派发的截止时间（秒）
    pub task_timeout_secs: u64,
    /// 同一批次内同时运行的执行器上限
    pub max_parallel: usize,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_fix_attempts: 3,
            retry_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            task_timeout_secs: 30 * 60,
            max_parallel: 5,
        }
    }
}

impl OrchestratorSection {
    /// 第 attempt 次修复重试前的退避（attempt 从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self.retry_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// [mailbox] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailboxSection {
    pub default_ttl_secs: u64,
}

impl Default for MailboxSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: crate::protocol::DEFAULT_TTL_SECS,
        }
    }
}

/// [breaker] 段：连续失败阈值与恢复超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_ms: 30_000,
        }
    }
}

impl From<&BreakerSection> for BreakerConfig {
    fn from(section: &BreakerSection) -> Self {
        BreakerConfig {
            failure_threshold: section.failure_threshold.max(1),
            recovery_timeout: Duration::from_millis(section.recovery_timeout_ms),
        }
    }
}

/// [board] 段：未设置 rejection_threshold 时所有提案都会被批准
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BoardSection {
    pub rejection_threshold: Option<u8>,
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
