//! 文本替换模板
//!
//! 占位符写作 `$name` 或 `${name}`，`$$` 输出一个 `$`。
//! 大括号在 TeX 中随处可见，因此不用它作为占位符的定界符。

use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;
use crate::models::metadata::Metadata;

/// 保留字段：拼接好的题目文本
pub const PROBLEMS_FIELD: &str = "problems";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

/// 没有指定模板时使用的文档
const DEFAULT_SOURCE: &str = "\\documentclass{article}
\\begin{document}
\\begin{enumerate}
\\item $problems
\\end{enumerate}
\\end{document}
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 用题目文本和元数据替换占位符
    ///
    /// 引用了未定义的字段时报错，不会替换成空文本。
    pub fn substitute(&self, problems: &str, metadata: &Metadata) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len() + problems.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            out.push_str(&self.source[last..whole.start]);
            last = whole.end;

            if caps.name("escaped").is_some() {
                out.push('$');
                continue;
            }

            let field = caps
                .name("named")
                .or_else(|| caps.name("braced"))
                .map(|m| m.as_str());
            match field {
                Some(PROBLEMS_FIELD) => out.push_str(problems),
                Some(name) => match metadata.get(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingField(name.to_string())),
                },
                None => return Err(self.invalid_at(whole.start)),
            }
        }

        out.push_str(&self.source[last..]);
        Ok(out)
    }

    /// 模板中引用的元数据字段（不含保留字段）
    pub fn fields(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.source)
            .filter_map(|caps| caps.name("named").or_else(|| caps.name("braced")))
            .map(|m| m.as_str())
            .filter(|name| *name != PROBLEMS_FIELD)
            .collect()
    }

    fn invalid_at(&self, offset: usize) -> TemplateError {
        let before = &self.source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        TemplateError::InvalidPlaceholder { line, column }
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE)
    }
}
