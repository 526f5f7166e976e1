pub mod blocks;
pub mod python;

use gridx_domain::AnalysisReport;

/// 代码准入分析器，按语言可插拔
pub trait CodeAnalyzer: Send + Sync {
    fn language(&self) -> &str;

    /// 分析永不失败：任何输入都返回一份带结论的报告
    fn analyze(&self, source: &str) -> AnalysisReport;

    /// 针对已知危险写法给出替代建议
    fn suggest_safe_patterns(&self, source: &str) -> Vec<String>;
}

pub use python::PythonAnalyzer;
