//! 试卷编译上下文
//!
//! 封装"我正在编译哪份试卷的哪一遍"这一信息

use std::fmt::Display;

use crate::models::RenderMode;

/// 试卷编译上下文
#[derive(Debug, Clone)]
pub struct SheetCtx {
    /// 试卷名
    pub file_name: String,

    /// 渲染模式
    pub mode: RenderMode,

    /// 本单元在整批中的序号（从1开始）
    pub unit_index: usize,

    /// 整批的单元总数
    pub total_units: usize,
}

impl SheetCtx {
    /// 创建新的试卷上下文
    pub fn new(
        file_name: impl Into<String>,
        mode: RenderMode,
        unit_index: usize,
        total_units: usize,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mode,
            unit_index,
            total_units,
        }
    }

    /// 源文件与输出文件的主文件名
    pub fn output_stem(&self) -> String {
        self.mode.output_stem(&self.file_name)
    }

    /// 工作目录中的源文件名
    pub fn source_name(&self) -> String {
        format!("{}.tex", self.output_stem())
    }
}

impl Display for SheetCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[试卷 {} ({}) {}/{}]",
            self.file_name, self.mode, self.unit_index, self.total_units
        )
    }
}
