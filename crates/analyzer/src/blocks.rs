//! 轻量级Python块结构解析。
//!
//! 按缩进还原语句树，只识别准入检查需要的节点类别。
//! 解析失败返回单个 [`SyntaxFault`]，调用方据此拒绝执行。

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// while循环，`always_true` 表示条件恒真（True/1/not False）
    While { always_true: bool },
    For,
    FunctionDef(String),
    Break,
    Return,
    Other,
}

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub kind: NodeKind,
    pub line: usize,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, NodeKind::While { .. } | NodeKind::For)
    }

    /// 子树（含自身）中是否存在break
    pub fn contains_break(&self) -> bool {
        if self.kind == NodeKind::Break {
            return true;
        }
        self.children.iter().any(BlockNode::contains_break)
    }

    /// 以当前节点为根的最大循环嵌套深度
    pub fn loop_depth(&self) -> usize {
        let own = usize::from(self.is_loop());
        own + self
            .children
            .iter()
            .map(BlockNode::loop_depth)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFault {
    pub line: usize,
    pub message: String,
}

impl SyntaxFault {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// 单个逻辑行（括号续行已合并）
struct LogicalLine {
    line: usize,
    indent: usize,
    text: String,
    opens_block: bool,
}

pub fn parse_blocks(source: &str) -> Result<Vec<BlockNode>, SyntaxFault> {
    check_byte_content(source)?;
    let logical = split_logical_lines(source)?;
    build_tree(&logical)
}

fn check_byte_content(source: &str) -> Result<(), SyntaxFault> {
    let mut line = 1;
    for ch in source.chars() {
        if ch == '\n' {
            line += 1;
            continue;
        }
        if ch == '\t' || ch == '\r' {
            continue;
        }
        if ch.is_control() {
            return Err(SyntaxFault::new(line, "invalid non-printable character"));
        }
    }
    Ok(())
}

/// 合并括号续行，剥离注释与字符串内容，检测未闭合结构。
fn split_logical_lines(source: &str) -> Result<Vec<LogicalLine>, SyntaxFault> {
    let mut result = Vec::new();
    let mut depth: i32 = 0;
    let mut pending: Option<LogicalLine> = None;
    let mut in_triple: Option<char> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = strip_line(raw, line_no, &mut depth, &mut in_triple)?;

        if in_triple.is_some() && pending.is_none() && stripped.trim().is_empty() {
            continue;
        }

        match pending.take() {
            Some(mut cur) => {
                cur.text.push(' ');
                cur.text.push_str(stripped.trim());
                pending = Some(cur);
            }
            None => {
                if stripped.trim().is_empty() || stripped.trim_start().starts_with('#') {
                    continue;
                }
                let indent = indent_width(raw);
                pending = Some(LogicalLine {
                    line: line_no,
                    indent,
                    text: stripped.trim().to_string(),
                    opens_block: false,
                });
            }
        }

        if depth == 0 && in_triple.is_none() {
            if let Some(mut cur) = pending.take() {
                cur.opens_block = cur.text.ends_with(':');
                result.push(cur);
            }
        }
    }

    if depth != 0 {
        let last = source.lines().count().max(1);
        return Err(SyntaxFault::new(last, "unexpected EOF, unclosed bracket"));
    }
    if in_triple.is_some() {
        let last = source.lines().count().max(1);
        return Err(SyntaxFault::new(last, "unterminated triple-quoted string"));
    }

    Ok(result)
}

/// 扫描单行：维护括号深度与三引号状态，字符串内容替换为占位符，
/// 返回去掉注释后的文本。
fn strip_line(
    raw: &str,
    line_no: usize,
    depth: &mut i32,
    in_triple: &mut Option<char>,
) -> Result<String, SyntaxFault> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        if let Some(quote) = *in_triple {
            if i + 2 < chars.len()
                && chars[i] == quote
                && chars[i + 1] == quote
                && chars[i + 2] == quote
            {
                *in_triple = None;
                out.push_str("...");
                i += 3;
            } else {
                i += 1;
            }
            continue;
        }

        let ch = chars[i];
        match ch {
            '#' => break,
            '(' | '[' | '{' => {
                *depth += 1;
                out.push(ch);
                i += 1;
            }
            ')' | ']' | '}' => {
                *depth -= 1;
                if *depth < 0 {
                    return Err(SyntaxFault::new(line_no, "unmatched closing bracket"));
                }
                out.push(ch);
                i += 1;
            }
            '\'' | '"' => {
                if i + 2 < chars.len() && chars[i + 1] == ch && chars[i + 2] == ch {
                    *in_triple = Some(ch);
                    i += 3;
                    continue;
                }
                // 单行字符串，必须在行内闭合
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    if chars[j] == '\\' {
                        j += 2;
                        continue;
                    }
                    if chars[j] == ch {
                        closed = true;
                        break;
                    }
                    j += 1;
                }
                if !closed {
                    return Err(SyntaxFault::new(line_no, "unterminated string literal"));
                }
                out.push_str("...");
                i = j + 1;
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    Ok(out)
}

fn indent_width(raw: &str) -> usize {
    let mut width = 0;
    for ch in raw.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 8 - width % 8,
            _ => break,
        }
    }
    width
}

fn build_tree(lines: &[LogicalLine]) -> Result<Vec<BlockNode>, SyntaxFault> {
    // (缩进宽度, 该层已收集的节点)
    let mut stack: Vec<(usize, Vec<BlockNode>)> = vec![(0, Vec::new())];
    let mut expect_indent: Option<usize> = None;

    for line in lines {
        if let Some(header_indent) = expect_indent {
            if line.indent <= header_indent {
                return Err(SyntaxFault::new(line.line, "expected an indented block"));
            }
            stack.push((line.indent, Vec::new()));
            expect_indent = None;
        } else {
            let mut dedented = false;
            while line.indent < stack.last().map(|(w, _)| *w).unwrap_or(0) {
                close_level(&mut stack);
                dedented = true;
            }
            let current = stack.last().map(|(w, _)| *w).unwrap_or(0);
            if line.indent != current {
                // 回退过至少一层说明是缩进回退没有对齐到任何外层
                let message = if dedented {
                    "unindent does not match any outer indentation level"
                } else {
                    "unexpected indent"
                };
                return Err(SyntaxFault::new(line.line, message));
            }
        }

        let node = BlockNode {
            kind: classify(&line.text),
            line: line.line,
            children: Vec::new(),
        };
        if let Some((_, nodes)) = stack.last_mut() {
            nodes.push(node);
        }

        if line.opens_block {
            expect_indent = Some(line.indent);
        }
    }

    if let Some(header_indent) = expect_indent {
        let last = lines.last().map(|l| l.line).unwrap_or(header_indent.max(1));
        return Err(SyntaxFault::new(last, "expected an indented block"));
    }

    while stack.len() > 1 {
        close_level(&mut stack);
    }
    let roots = stack.pop().map(|(_, nodes)| nodes).unwrap_or_default();
    Ok(roots)
}

/// 把栈顶一层的节点挂到上一层最后一个节点上
fn close_level(stack: &mut Vec<(usize, Vec<BlockNode>)>) {
    if stack.len() <= 1 {
        return;
    }
    if let Some((_, children)) = stack.pop() {
        if let Some((_, parent_nodes)) = stack.last_mut() {
            if let Some(parent) = parent_nodes.last_mut() {
                parent.children.extend(children);
            } else {
                parent_nodes.extend(children);
            }
        }
    }
}

fn classify(text: &str) -> NodeKind {
    if text == "break" {
        return NodeKind::Break;
    }
    if text == "return" || text.starts_with("return ") {
        return NodeKind::Return;
    }
    if let Some(rest) = text.strip_prefix("while") {
        let rest = rest.trim_start();
        if !rest.is_empty() {
            let condition = rest.strip_suffix(':').unwrap_or(rest).trim();
            let always_true = matches!(condition, "True" | "1" | "not False");
            return NodeKind::While { always_true };
        }
    }
    if text.starts_with("for ") {
        return NodeKind::For;
    }
    if let Some(rest) = text.strip_prefix("def ") {
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            return NodeKind::FunctionDef(name);
        }
    }
    NodeKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_statements() {
        let tree = parse_blocks("x = 1\ny = 2\n").expect("parse");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].kind, NodeKind::Other);
    }

    #[test]
    fn test_while_true_block() {
        let source = "while True:\n    x = 1\n    break\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].kind, NodeKind::While { always_true: true });
        assert_eq!(tree[0].children.len(), 2);
        assert!(tree[0].contains_break());
    }

    #[test]
    fn test_nested_loop_depth() {
        let source = "for i in range(3):\n    for j in range(3):\n        while x < 2:\n            x += 1\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree[0].loop_depth(), 3);
    }

    #[test]
    fn test_empty_block_suite_faults() {
        let err = parse_blocks("while True:\nx = 1\n").expect_err("must fault");
        assert!(err.message.contains("indented block"));
    }

    #[test]
    fn test_header_at_eof_faults() {
        assert!(parse_blocks("def f():\n").is_err());
    }

    #[test]
    fn test_unbalanced_brackets_fault() {
        assert!(parse_blocks("x = (1 + 2\n").is_err());
        assert!(parse_blocks("x = 1)\n").is_err());
    }

    #[test]
    fn test_unterminated_string_faults() {
        assert!(parse_blocks("x = 'abc\n").is_err());
    }

    #[test]
    fn test_bad_dedent_faults() {
        let source = "if a:\n        x = 1\n    y = 2\n";
        let err = parse_blocks(source).expect_err("must fault");
        assert!(err.message.contains("unindent"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_unexpected_indent_faults() {
        let err = parse_blocks("x = 1\n    y = 2\n").expect_err("must fault");
        assert!(err.message.contains("unexpected indent"));
    }

    #[test]
    fn test_dedent_to_matching_outer_level() {
        let source = "if a:\n    if b:\n        x = 1\n    y = 2\nz = 3\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].children.len(), 2);
    }

    #[test]
    fn test_brace_language_rejected() {
        assert!(parse_blocks("int main() {\n").is_err());
    }

    #[test]
    fn test_control_bytes_rejected() {
        assert!(parse_blocks("x = 1\u{0000}\n").is_err());
    }

    #[test]
    fn test_string_content_is_opaque() {
        // 字符串里的冒号和括号不影响结构
        let source = "x = 'while True:'\ny = \"(((\"\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_continuation_lines_merge() {
        let source = "x = (1 +\n     2 +\n     3)\ny = 4\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_comments_ignored() {
        let source = "# header comment\nx = 1  # trailing\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let source = "s = '''\nwhile True:\n'''\nx = 1\n";
        let tree = parse_blocks(source).expect("parse");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_classify_recursive_def() {
        assert_eq!(
            classify("def fact(n):"),
            NodeKind::FunctionDef("fact".to_string())
        );
    }
}
