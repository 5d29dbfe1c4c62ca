use std::fmt;

use serde::{Deserialize, Serialize};

/// 单份试卷的渲染方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// 只有题目
    Questions,
    /// 只有答案
    Solutions,
    /// 每道题后紧跟答案
    Mixed,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Questions => "questions",
            RenderMode::Solutions => "solutions",
            RenderMode::Mixed => "mixed",
        }
    }

    /// 该模式下输出文件的主文件名（不含扩展名）
    pub fn output_stem(self, file_name: &str) -> String {
        match self {
            RenderMode::Questions => file_name.to_string(),
            RenderMode::Solutions => format!("{}-solutions", file_name),
            RenderMode::Mixed => format!("{}-mixed", file_name),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一批编译的目标模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    Questions,
    Solutions,
    Mixed,
    /// 题目和答案各完整编译一遍
    Both,
}

impl CompileMode {
    /// 按顺序返回需要执行的渲染遍
    pub fn passes(self) -> &'static [RenderMode] {
        match self {
            CompileMode::Questions => &[RenderMode::Questions],
            CompileMode::Solutions => &[RenderMode::Solutions],
            CompileMode::Mixed => &[RenderMode::Mixed],
            CompileMode::Both => &[RenderMode::Questions, RenderMode::Solutions],
        }
    }
}

impl fmt::Display for CompileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileMode::Both => f.write_str("both"),
            other => f.write_str(other.passes()[0].as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_runs_questions_then_solutions() {
        assert_eq!(
            CompileMode::Both.passes(),
            &[RenderMode::Questions, RenderMode::Solutions]
        );
        assert_eq!(CompileMode::Mixed.passes().len(), 1);
    }

    #[test]
    fn test_output_stems_differ_per_mode() {
        assert_eq!(RenderMode::Questions.output_stem("hw1"), "hw1");
        assert_eq!(RenderMode::Solutions.output_stem("hw1"), "hw1-solutions");
        assert_eq!(RenderMode::Mixed.output_stem("hw1"), "hw1-mixed");
    }
}
