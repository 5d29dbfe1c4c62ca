//! 特殊键分派表
//!
//! 说明文件中大多数键都是普通元数据，只有少数几个键有专门的处理逻辑。

use phf::phf_map;

/// 键的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHandler {
    /// 原样存入元数据
    PlainMetadata,
    /// `problems`：以 `;` 分隔的题目列表
    ProblemsList,
    /// `mark`：分值格式化宏
    MarkFormatterSpec,
    /// `template`：模板文件路径
    TemplatePath,
    /// `include`：需要复制到工作目录的文件
    IncludeFile,
}

static SPECIAL_KEYS: phf::Map<&'static str, KeyHandler> = phf_map! {
    "problems" => KeyHandler::ProblemsList,
    "mark" => KeyHandler::MarkFormatterSpec,
    "template" => KeyHandler::TemplatePath,
    "include" => KeyHandler::IncludeFile,
};

/// 查找键对应的处理方式，未登记的键都是普通元数据
pub fn handler_for(key: &str) -> KeyHandler {
    SPECIAL_KEYS
        .get(key)
        .copied()
        .unwrap_or(KeyHandler::PlainMetadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        assert_eq!(handler_for("problems"), KeyHandler::ProblemsList);
        assert_eq!(handler_for("mark"), KeyHandler::MarkFormatterSpec);
        assert_eq!(handler_for("template"), KeyHandler::TemplatePath);
        assert_eq!(handler_for("include"), KeyHandler::IncludeFile);
        assert_eq!(handler_for("course"), KeyHandler::PlainMetadata);
        assert_eq!(handler_for("Problems"), KeyHandler::PlainMetadata);
    }
}
