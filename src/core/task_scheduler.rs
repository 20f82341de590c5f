//! 派发并发控制
//!
//! 同一批就绪任务并行派发，但同时运行的执行器数量受 Semaphore 限制（默认 5）。

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// 执行器并发许可
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    permits: Arc<Semaphore>,
    max_parallel: usize,
}

impl TaskScheduler {
    pub fn new(max_parallel: usize) -> Self {
        let max_parallel = max_parallel.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_parallel)),
            max_parallel,
        }
    }

    /// 获取一次派发许可；许可随返回值 drop 归还
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.permits.clone().acquire_owned().await
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// 当前空闲许可数
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(5)
    }
}
