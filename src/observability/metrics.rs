//! 执行指标
//!
//! 记录每次派发（执行器、任务、耗时、成败、错误），按执行器汇总成功率与平均耗时，并统计最常见错误。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub executor: String,
    pub task_id: String,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// 单个执行器的汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutorSummary {
    pub runs: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    records: Mutex<Vec<DispatchRecord>>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, executor: &str, task_id: &str, duration: Duration, error: Option<&str>) {
        let record = DispatchRecord {
            executor: executor.to_string(),
            task_id: task_id.to_string(),
            duration_ms: duration.as_millis() as u64,
            success: error.is_none(),
            error: error.map(str::to_string),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn total_dispatches(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 执行器 -> 汇总
    pub fn summary(&self) -> BTreeMap<String, ExecutorSummary> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary: BTreeMap<String, ExecutorSummary> = BTreeMap::new();
        let mut total_ms: HashMap<String, u64> = HashMap::new();

        for r in records.iter() {
            let entry = summary.entry(r.executor.clone()).or_default();
            entry.runs += 1;
            if r.success {
                entry.successes += 1;
            }
            *total_ms.entry(r.executor.clone()).or_default() += r.duration_ms;
        }

        for (executor, entry) in summary.iter_mut() {
            entry.success_rate = entry.successes as f64 / entry.runs as f64;
            entry.avg_duration_ms = total_ms.get(executor).copied().unwrap_or(0) as f64 / entry.runs as f64;
        }
        summary
    }

    /// 出现次数最多的前 limit 个错误（次数降序，同次数按文本排序）
    pub fn top_errors(&self, limit: usize) -> Vec<(String, usize)> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for error in records.iter().filter_map(|r| r.error.as_deref()) {
            *counts.entry(error).or_default() += 1;
        }
        let mut errors: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(error, n)| (error.to_string(), n))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        errors.truncate(limit);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_per_executor() {
        let metrics = ExecutionMetrics::new();
        metrics.record("developer", "1", Duration::from_millis(10), None);
        metrics.record("developer", "2", Duration::from_millis(30), Some("boom"));
        metrics.record("tester", "3", Duration::from_millis(5), None);

        let summary = metrics.summary();
        let dev = &summary["developer"];
        assert_eq!(dev.runs, 2);
        assert_eq!(dev.successes, 1);
        assert!((dev.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((dev.avg_duration_ms - 20.0).abs() < f64::EPSILON);
        assert_eq!(summary["tester"].success_rate, 1.0);
        assert_eq!(metrics.total_dispatches(), 3);
    }

    #[test]
    fn test_top_errors() {
        let metrics = ExecutionMetrics::new();
        for _ in 0..3 {
            metrics.record("a", "1", Duration::ZERO, Some("timeout"));
        }
        metrics.record("a", "2", Duration::ZERO, Some("syntax"));
        metrics.record("a", "3", Duration::ZERO, None);

        let top = metrics.top_errors(1);
        assert_eq!(top, vec![("timeout".to_string(), 3)]);
        assert_eq!(metrics.top_errors(10).len(), 2);
    }
}
