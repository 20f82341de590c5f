//! 审批委员会（Board）
//!
//! 按复杂度把工作流提案路由到不同审批层级，并附加强制条件：
//! - 1-3：运营层自动批准，无条件
//! - 4-6：产品层，需进度汇报（执行器类型 > 2 时加协调检查点）
//! - 7-8：技术层，每日检查点 + 代码评审（外部服务加集成测试，数据库加回滚方案并升为高风险）
//! - 9-10：全体委员会，技术层条件 + 回滚方案、安全审计、最终签字、复盘；风险为 critical
//!
//! 默认所有层级都批准；配置 rejection_threshold 后，复杂度超过阈值的提案被拒绝。
//! 每个决定都追加到只增不减的历史中。

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 审批层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reviewer {
    Operations,
    Product,
    Technology,
    FullBoard,
}

impl Reviewer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reviewer::Operations => "operations",
            Reviewer::Product => "product",
            Reviewer::Technology => "technology",
            Reviewer::FullBoard => "full_board",
        }
    }
}

/// 风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// 提交给委员会的工作流提案
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowProposal {
    pub workflow_name: String,
    /// 1-10
    pub complexity: u8,
    pub executors: Vec<String>,
    pub estimated_minutes: u64,
    pub touches_external_services: bool,
    pub touches_database: bool,
}

/// 委员会决定，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDecision {
    pub approved: bool,
    pub reviewer: Reviewer,
    pub reason: String,
    pub conditions: Vec<String>,
    pub risk: RiskLevel,
    pub decided_at: DateTime<Utc>,
}

/// 审批委员会
#[derive(Debug, Default)]
pub struct Board {
    rejection_threshold: Option<u8>,
    history: Mutex<Vec<BoardDecision>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// 复杂度超过 threshold 的提案将被拒绝
    pub fn with_rejection_threshold(threshold: Option<u8>) -> Self {
        Self {
            rejection_threshold: threshold,
            history: Mutex::new(Vec::new()),
        }
    }

    /// 审查提案并记录决定
    pub fn review(&self, proposal: &WorkflowProposal) -> BoardDecision {
        tracing::info!(
            "Reviewing proposal: {} (complexity: {})",
            proposal.workflow_name,
            proposal.complexity
        );

        let (reviewer, reason, conditions, risk) = route(proposal);
        let mut decision = BoardDecision {
            approved: true,
            reviewer,
            reason: reason.to_string(),
            conditions,
            risk,
            decided_at: Utc::now(),
        };

        if let Some(threshold) = self.rejection_threshold {
            if proposal.complexity > threshold {
                decision.approved = false;
                decision.reason = format!(
                    "Complexity {} exceeds rejection threshold {}",
                    proposal.complexity, threshold
                );
            }
        }

        tracing::info!(
            "Decision by {}: {} ({})",
            decision.reviewer.as_str(),
            if decision.approved { "approved" } else { "rejected" },
            decision.reason
        );
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
        decision
    }

    /// 历史决定（按时间顺序）
    pub fn history(&self) -> Vec<BoardDecision> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn route(proposal: &WorkflowProposal) -> (Reviewer, &'static str, Vec<String>, RiskLevel) {
    match proposal.complexity {
        0..=3 => (
            Reviewer::Operations,
            "Low complexity - auto-approved by Operations",
            Vec::new(),
            RiskLevel::Low,
        ),
        4..=6 => {
            let mut conditions = vec!["progress_report_on_completion".to_string()];
            if proposal.executors.len() > 2 {
                conditions.push("coordination_checkpoint".to_string());
            }
            (
                Reviewer::Product,
                "Medium complexity - approved with product oversight",
                conditions,
                RiskLevel::Medium,
            )
        }
        7..=8 => {
            let (conditions, risk) = technical_safeguards(proposal);
            (
                Reviewer::Technology,
                "High complexity - approved with technical safeguards",
                conditions,
                risk,
            )
        }
        _ => {
            let (mut conditions, _) = technical_safeguards(proposal);
            conditions.extend(
                [
                    "rollback_plan_mandatory",
                    "security_audit_required",
                    "final_sign_off",
                    "post_mortem_on_completion",
                ]
                .map(String::from),
            );
            if proposal.touches_external_services {
                conditions.push("penetration_test_before_deploy".to_string());
            }
            (
                Reviewer::FullBoard,
                "Critical complexity - full board approval with maximum safeguards",
                conditions,
                RiskLevel::Critical,
            )
        }
    }
}

fn technical_safeguards(proposal: &WorkflowProposal) -> (Vec<String>, RiskLevel) {
    let mut conditions = vec![
        "daily_checkpoints".to_string(),
        "code_review_required".to_string(),
    ];
    if proposal.touches_external_services {
        conditions.push("integration_test_mandatory".to_string());
    }
    if proposal.touches_database {
        conditions.push("migration_rollback_plan".to_string());
    }
    let risk = if proposal.touches_database {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };
    (conditions, risk)
}
