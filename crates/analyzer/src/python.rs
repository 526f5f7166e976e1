use regex::Regex;
use tracing::debug;

use gridx_domain::{AnalysisReport, CodeIssue, IssueKind, Severity};

use crate::blocks::{parse_blocks, BlockNode, NodeKind};
use crate::CodeAnalyzer;

/// Python代码准入分析器
///
/// 三道检查：正则扫描死循环惯用法、正则扫描重资源操作、
/// 块结构树上的嵌套与无break检查。结论偏保守，高危即拒绝。
pub struct PythonAnalyzer {
    loop_patterns: Vec<Regex>,
    resource_patterns: Vec<Regex>,
    def_pattern: Regex,
    while_true_pattern: Regex,
    big_range_pattern: Regex,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        let loop_patterns = [
            r"\bwhile\s+True\s*:",
            r"\bwhile\s+1\s*:",
            r"\bwhile\s+not\s+False\s*:",
            r"for\s+\w+\s+in\s+itertools\.count\(\)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static loop pattern"))
        .collect();

        let resource_patterns = [
            r"range\(\s*\d{6,}\s*\)",
            r"\.read\(\)",
            r"requests\.get\(",
            r"urllib\.request",
            r"subprocess\.",
            r"\[\s*\w+\s*\*\s*\d{4,}\s*\]",
            r"numpy\.zeros\(\s*\d{5,}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static resource pattern"))
        .collect();

        Self {
            loop_patterns,
            resource_patterns,
            def_pattern: Regex::new(r"def\s+(\w+)").expect("static def pattern"),
            while_true_pattern: Regex::new(r"\bwhile\s+True\s*:").expect("static pattern"),
            big_range_pattern: Regex::new(r"range\(\s*\d{6,}\s*\)").expect("static pattern"),
        }
    }

    /// 逐行扫描死循环惯用法，循环体内有break/return降为中危提示
    fn scan_loop_patterns(&self, source: &str) -> Vec<CodeIssue> {
        let lines: Vec<&str> = source.lines().collect();
        let mut issues = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let mut hit = self.loop_patterns.iter().any(|p| p.is_match(line));
            if !hit {
                hit = self.is_single_line_recursion(line);
            }
            if !hit {
                continue;
            }

            let loop_end = find_loop_end(&lines, idx);
            let body = &lines[(idx + 1).min(lines.len())..loop_end.min(lines.len())];
            let has_escape = body
                .iter()
                .any(|l| l.contains("break") || l.contains("return"));

            if has_escape {
                issues.push(CodeIssue::new(
                    IssueKind::InfiniteLoop,
                    Severity::Medium,
                    idx + 1,
                    "Loop with 'while True' pattern detected (has break/return)",
                    Some("Consider using a more explicit condition"),
                ));
            } else {
                issues.push(CodeIssue::new(
                    IssueKind::InfiniteLoop,
                    Severity::High,
                    idx + 1,
                    "Potential infinite loop detected with no break condition",
                    Some("Add a break condition or use a different loop structure"),
                ));
            }
        }

        issues
    }

    /// 单行递归定义，例如 `def f(n): return f(n)`
    fn is_single_line_recursion(&self, line: &str) -> bool {
        if let Some(caps) = self.def_pattern.captures(line) {
            if let (Some(m), Some(name)) = (caps.get(0), caps.get(1)) {
                let rest = &line[m.end()..];
                if let Some(colon) = rest.find(':') {
                    return rest[colon..].contains(&format!("{}(", name.as_str()));
                }
            }
        }
        false
    }

    fn scan_resource_patterns(&self, source: &str) -> Vec<CodeIssue> {
        let mut issues = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            for pattern in &self.resource_patterns {
                if pattern.is_match(line) {
                    issues.push(CodeIssue::new(
                        IssueKind::ResourceHeavy,
                        Severity::Medium,
                        idx + 1,
                        "Resource-intensive operation detected",
                        Some("Consider adding progress monitoring or limits"),
                    ));
                }
            }
        }
        issues
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnalyzer for PythonAnalyzer {
    fn language(&self) -> &str {
        "python"
    }

    fn analyze(&self, source: &str) -> AnalysisReport {
        let suggestions = self.suggest_safe_patterns(source);

        let tree = match parse_blocks(source) {
            Ok(tree) => tree,
            Err(fault) => {
                debug!("代码语法检查失败: 行{} {}", fault.line, fault.message);
                let issue = CodeIssue::new(
                    IssueKind::SyntaxError,
                    Severity::High,
                    fault.line,
                    format!("Syntax error: {}", fault.message),
                    Some("Fix syntax errors before execution"),
                );
                return AnalysisReport::from_issues(vec![issue], suggestions);
            }
        };

        let mut issues = Vec::new();
        issues.extend(self.scan_loop_patterns(source));
        issues.extend(self.scan_resource_patterns(source));
        walk_tree(&tree, &mut issues);

        AnalysisReport::from_issues(issues, suggestions)
    }

    fn suggest_safe_patterns(&self, source: &str) -> Vec<String> {
        let mut suggestions = Vec::new();

        if self.while_true_pattern.is_match(source) {
            suggestions.push(
                "Consider using 'for i in range(max_iterations)' with a reasonable limit"
                    .to_string(),
            );
            suggestions
                .push("Add a counter variable and check it in the while condition".to_string());
        }

        if self.big_range_pattern.is_match(source) {
            suggestions
                .push("For large ranges, consider using generators or batch processing".to_string());
            suggestions.push(
                "Add progress monitoring: if i % 1000 == 0: print(f'Progress: {i}')".to_string(),
            );
        }

        suggestions
    }
}

/// 结构树检查：过深嵌套与无break的恒真while
fn walk_tree(nodes: &[BlockNode], issues: &mut Vec<CodeIssue>) {
    for node in nodes {
        if node.is_loop() {
            let depth = node.loop_depth();
            if depth > 2 {
                issues.push(CodeIssue::new(
                    IssueKind::Warning,
                    Severity::Medium,
                    node.line,
                    format!("Deeply nested loops ({depth} levels) detected"),
                    Some("Consider refactoring to reduce nesting"),
                ));
            }
        }
        if let NodeKind::While { always_true: true } = node.kind {
            if !node.contains_break() {
                issues.push(CodeIssue::new(
                    IssueKind::InfiniteLoop,
                    Severity::High,
                    node.line,
                    "while True loop without break statement",
                    Some("Add break condition to prevent infinite loop"),
                ));
            }
        }
        walk_tree(&node.children, issues);
    }
}

/// 按缩进找到循环体结束处的行下标（不含），0基
fn find_loop_end(lines: &[&str], start: usize) -> usize {
    let header = lines[start];
    let indent = header.len() - header.trim_start().len();

    for (offset, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        let current = line.len() - line.trim_start().len();
        if current <= indent {
            return offset;
        }
    }
    lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> PythonAnalyzer {
        PythonAnalyzer::new()
    }

    #[test]
    fn test_while_true_without_break_blocks_execution() {
        let source = "while True:\n    x = 1\n";
        let report = analyzer().analyze(source);
        assert!(!report.should_execute);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::InfiniteLoop && i.is_high()));
    }

    #[test]
    fn test_while_true_with_break_is_advisory() {
        let source = "while True:\n    x = 1\n    if x > 3:\n        break\n";
        let report = analyzer().analyze(source);
        assert!(report.should_execute);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::InfiniteLoop && i.severity == Severity::Medium));
        assert_eq!(report.high_severity_count(), 0);
    }

    #[test]
    fn test_while_one_detected() {
        let source = "while 1:\n    pass\n";
        let report = analyzer().analyze(source);
        assert!(!report.should_execute);
    }

    #[test]
    fn test_itertools_count_detected() {
        let source = "for i in itertools.count():\n    print(i)\n";
        let report = analyzer().analyze(source);
        assert!(!report.should_execute);
    }

    #[test]
    fn test_syntax_error_yields_single_high_issue() {
        let source = "while True\n    x = 1\n";
        let report = analyzer().analyze(source);
        assert!(!report.should_execute);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::SyntaxError);
        assert!(report.issues[0].is_high());
    }

    #[test]
    fn test_binary_garbage_never_panics() {
        let source = "\u{0001}\u{0002}\u{0003}while True";
        let report = analyzer().analyze(source);
        assert!(!report.should_execute);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::SyntaxError);
    }

    #[test]
    fn test_resource_heavy_is_advisory_only() {
        let source = "import requests\ndata = requests.get('http://example.com')\nn = range(1000000)\n";
        let report = analyzer().analyze(source);
        assert!(report.should_execute);
        let heavy: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::ResourceHeavy)
            .collect();
        assert_eq!(heavy.len(), 2);
        assert!(heavy.iter().all(|i| i.severity == Severity::Medium));
    }

    #[test]
    fn test_deep_nesting_warning() {
        let source = "for i in range(3):\n    for j in range(3):\n        for k in range(3):\n            print(i, j, k)\n";
        let report = analyzer().analyze(source);
        assert!(report.should_execute);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::Warning && i.message.contains("3 levels")));
    }

    #[test]
    fn test_clean_code_passes() {
        let source = "def add(a, b):\n    return a + b\n\nprint(add(1, 2))\n";
        let report = analyzer().analyze(source);
        assert!(report.should_execute);
        assert!(report.issues.is_empty());
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_single_line_recursion_detected() {
        let source = "def loop(n): return loop(n)\n";
        let report = analyzer().analyze(source);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::InfiniteLoop));
    }

    #[test]
    fn test_suggestions_for_while_true() {
        let source = "while True:\n    pass\n";
        let suggestions = analyzer().suggest_safe_patterns(source);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[0].contains("max_iterations"));
    }

    #[test]
    fn test_suggestions_for_big_range() {
        let source = "for i in range(5000000):\n    print(i)\n";
        let suggestions = analyzer().suggest_safe_patterns(source);
        assert!(suggestions.iter().any(|s| s.contains("batch processing")));
    }

    #[test]
    fn test_issue_line_numbers() {
        let source = "x = 1\ny = 2\nwhile True:\n    pass\n";
        let report = analyzer().analyze(source);
        let issue = report
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::InfiniteLoop)
            .expect("loop issue");
        assert_eq!(issue.line, 3);
    }

    #[test]
    fn test_empty_source() {
        let report = analyzer().analyze("");
        assert!(report.should_execute);
        assert!(report.issues.is_empty());
    }
}
