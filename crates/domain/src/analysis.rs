use serde::{Deserialize, Serialize};

/// 静态分析发现的问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SyntaxError,
    InfiniteLoop,
    ResourceHeavy,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// 单条分析结论，行号从1开始
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub line: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CodeIssue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        line: usize,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self {
            kind,
            severity,
            line,
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        }
    }
    pub fn is_high(&self) -> bool {
        self.severity == Severity::High
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_issues: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
}

/// 一次准入分析的完整结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub should_execute: bool,
    pub issues: Vec<CodeIssue>,
    pub suggestions: Vec<String>,
    pub analysis_summary: AnalysisSummary,
}

impl AnalysisReport {
    /// 根据问题列表推导放行结论，高危问题数为零才放行
    pub fn from_issues(issues: Vec<CodeIssue>, suggestions: Vec<String>) -> Self {
        let high = issues.iter().filter(|i| i.severity == Severity::High).count();
        let medium = issues
            .iter()
            .filter(|i| i.severity == Severity::Medium)
            .count();
        let low = issues.iter().filter(|i| i.severity == Severity::Low).count();

        Self {
            should_execute: high == 0,
            analysis_summary: AnalysisSummary {
                total_issues: issues.len(),
                high_severity: high,
                medium_severity: medium,
                low_severity: low,
            },
            issues,
            suggestions,
        }
    }
    pub fn high_severity_count(&self) -> usize {
        self.analysis_summary.high_severity
    }
}
