//! 核心层：错误类型、失败诊断、派发并发控制

pub mod error;
pub mod recovery;
pub mod task_scheduler;

pub use error::{OrchestratorError, RecoveryAction};
pub use recovery::{Diagnosis, FailureCategory, RecoveryEngine};
pub use task_scheduler::TaskScheduler;
