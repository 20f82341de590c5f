//! 失败诊断引擎
//!
//! 对失败文本做启发式分类（超时 / 语法 / 未知），返回 Diagnosis，
//! 供重试子循环在重新派发任务前选择诊断提示。

use std::sync::OnceLock;

use regex::Regex;

use crate::core::RecoveryAction;

static TIMEOUT_RE: OnceLock<Regex> = OnceLock::new();
static SYNTAX_RE: OnceLock<Regex> = OnceLock::new();

fn timeout_re() -> &'static Regex {
    TIMEOUT_RE.get_or_init(|| {
        Regex::new(r"(?i)timed?[\s_-]?out|deadline exceeded|elapsed").expect("valid timeout regex")
    })
}

fn syntax_re() -> &'static Regex {
    SYNTAX_RE.get_or_init(|| {
        Regex::new(r"(?i)syntax|parse error|unexpected token|invalid json").expect("valid syntax regex")
    })
}

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Timeout,
    Syntax,
    Unknown,
}

/// 单次诊断结果
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub category: FailureCategory,
    pub action: RecoveryAction,
    /// 注入下一次派发的提示文本
    pub hint: String,
}

/// 语义化失败诊断：将失败文本映射为诊断动作与提示
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &str) -> FailureCategory {
        if timeout_re().is_match(error) {
            FailureCategory::Timeout
        } else if syntax_re().is_match(error) {
            FailureCategory::Syntax
        } else {
            FailureCategory::Unknown
        }
    }

    /// 根据失败文本返回诊断；只影响提示内容，不决定是否重试
    pub fn diagnose(&self, error: &str) -> Diagnosis {
        let category = self.classify(error);
        let (action, hint) = match category {
            FailureCategory::Timeout => (
                RecoveryAction::CheckPerformance,
                format!("上一次执行超时: {error}。请缩小工作范围或拆分步骤后重试。"),
            ),
            FailureCategory::Syntax => (
                RecoveryAction::LintCheck,
                format!("上一次输出存在语法/格式错误: {error}。请先做静态检查再重试。"),
            ),
            FailureCategory::Unknown => (
                RecoveryAction::TraceRootCause,
                format!("上一次执行失败: {error}。请回顾最近改动、检查日志并隔离失败组件。"),
            ),
        };
        Diagnosis {
            category,
            action,
            hint,
        }
    }
}
