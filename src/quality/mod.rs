//! 质量门
//!
//! 编排器在所有任务完成后把累积的任务结果交给 QualityGateRunner。
//! ThresholdGates 是基于结果数据的参考实现：缺少数据或未知的门记为 Skipped，不会导致失败。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单个门的结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub status: GateStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateFailure {
    pub gate: String,
    pub reason: String,
}

/// 质量门报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub passed: bool,
    pub total_gates: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub failures: Vec<GateFailure>,
    pub details: BTreeMap<String, GateResult>,
}

impl QualityReport {
    /// 由各门结果汇总报告
    pub fn from_details(details: BTreeMap<String, GateResult>) -> Self {
        let failures: Vec<GateFailure> = details
            .iter()
            .filter(|(_, r)| r.status == GateStatus::Failed)
            .map(|(gate, r)| GateFailure {
                gate: gate.clone(),
                reason: r.reason.clone(),
            })
            .collect();
        Self {
            passed: failures.is_empty(),
            total_gates: details.len(),
            passed_count: details.len() - failures.len(),
            failed_count: failures.len(),
            failures,
            details,
        }
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.gate, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 质量门执行器 trait
#[async_trait]
pub trait QualityGateRunner: Send + Sync {
    async fn check(&self, results: &BTreeMap<String, Value>, gates: &[String]) -> QualityReport;
}

/// 阈值质量门
#[derive(Debug, Clone)]
pub struct ThresholdGates {
    /// 最低覆盖率（%）
    pub min_coverage: f64,
    /// 最大圈复杂度
    pub max_complexity: f64,
}

impl Default for ThresholdGates {
    fn default() -> Self {
        Self {
            min_coverage: 70.0,
            max_complexity: 10.0,
        }
    }
}

#[async_trait]
impl QualityGateRunner for ThresholdGates {
    async fn check(&self, results: &BTreeMap<String, Value>, gates: &[String]) -> QualityReport {
        tracing::info!("Running {} quality gates", gates.len());
        let mut details = BTreeMap::new();
        for gate in gates {
            let result = match gate.as_str() {
                "code_coverage" => self.check_coverage(results),
                "complexity" => self.check_complexity(results),
                "security_scan" => check_security(results),
                "test_pass" => check_tests(results),
                other => skipped(format!("Unknown gate: {other}")),
            };
            match result.status {
                GateStatus::Failed => tracing::error!("Gate FAILED: {} ({})", gate, result.reason),
                GateStatus::Passed => tracing::info!("Gate PASSED: {}", gate),
                GateStatus::Skipped => tracing::debug!("Gate skipped: {} ({})", gate, result.reason),
            }
            details.insert(gate.clone(), result);
        }
        QualityReport::from_details(details)
    }
}

impl ThresholdGates {
    fn check_coverage(&self, results: &BTreeMap<String, Value>) -> GateResult {
        let Some(coverage) = find_number(results, "coverage") else {
            return skipped("No coverage data available");
        };
        let threshold = self.min_coverage;
        if coverage >= threshold {
            passed(format!("Coverage {coverage}% meets threshold {threshold}%"))
        } else {
            failed(format!("Coverage {coverage}% below threshold {threshold}%"))
        }
    }

    fn check_complexity(&self, results: &BTreeMap<String, Value>) -> GateResult {
        let Some(complexity) = find_number(results, "complexity_score") else {
            return skipped("No complexity data available");
        };
        let limit = self.max_complexity;
        if complexity <= limit {
            passed(format!("Complexity {complexity} within limit {limit}"))
        } else {
            failed(format!("Complexity {complexity} exceeds limit {limit}"))
        }
    }
}

fn check_security(results: &BTreeMap<String, Value>) -> GateResult {
    let Some(security) = find_field(results, "security") else {
        return skipped("No security data available");
    };
    match security.get("passed").and_then(Value::as_bool) {
        Some(true) => passed("No security issues found"),
        Some(false) => {
            let findings = security
                .get("findings")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            failed(format!("Found {findings} security issues"))
        }
        None => skipped("Security data has no verdict"),
    }
}

fn check_tests(results: &BTreeMap<String, Value>) -> GateResult {
    match find_field(results, "tests_passed").and_then(Value::as_bool) {
        Some(true) => passed("All tests passed"),
        Some(false) => failed("Test suite reported failures"),
        None => skipped("No test results available"),
    }
}

/// 顶层键优先，其次在各任务结果对象中查找
fn find_field<'a>(results: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a Value> {
    results
        .get(key)
        .or_else(|| results.values().find_map(|v| v.get(key)))
}

fn find_number(results: &BTreeMap<String, Value>, key: &str) -> Option<f64> {
    find_field(results, key).and_then(Value::as_f64)
}

fn passed(reason: impl Into<String>) -> GateResult {
    GateResult {
        status: GateStatus::Passed,
        reason: reason.into(),
    }
}

fn failed(reason: impl Into<String>) -> GateResult {
    GateResult {
        status: GateStatus::Failed,
        reason: reason.into(),
    }
}

fn skipped(reason: impl Into<String>) -> GateResult {
    GateResult {
        status: GateStatus::Skipped,
        reason: reason.into(),
    }
}
