use std::collections::BTreeMap;

/// 题目分值，`None` 表示不显示分值
pub type Mark = Option<u32>;

/// 分值格式化器的名字
pub const MARK_FORMATTER: &str = "mark";

/// 把分值转换成排版文本的格式化器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formatter {
    /// 总是输出空文本
    Empty,
    /// `mark = \macro` 定义的宏，输出 `\n\macro{N}`
    Macro(String),
    /// 默认格式，`{mark}` 替换为分值，`{s}` 替换为复数后缀
    Pattern(String),
}

impl Formatter {
    pub fn format(&self, mark: Mark) -> String {
        let Some(mark) = mark else {
            return String::new();
        };
        match self {
            Formatter::Empty => String::new(),
            Formatter::Macro(macro_name) => format!("\n{}{{{}}}", macro_name, mark),
            Formatter::Pattern(pattern) => {
                let plural = if mark == 1 { "" } else { "s" };
                let text = pattern
                    .replace("{mark}", &mark.to_string())
                    .replace("{s}", plural);
                format!("\n{}", text)
            }
        }
    }
}

/// 一组按名字索引的格式化器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatters {
    inner: BTreeMap<String, Formatter>,
}

impl Formatters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取格式化器，未设置时返回 `Formatter::Empty`
    pub fn get(&self, name: &str) -> &Formatter {
        self.inner.get(name).unwrap_or(&Formatter::Empty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, formatter: Formatter) {
        self.inner.insert(name.into(), formatter);
    }
}
