use crate::error::{AppResult, StoreError};
use crate::models::formatter::{Formatters, Mark, MARK_FORMATTER};
use crate::models::metadata::Metadata;
use crate::models::mode::RenderMode;
use crate::models::problem::Problem;
use crate::models::template::Template;

/// 试卷中的一个题目条目（尚未在题库中解析）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemEntry {
    pub id: String,
    pub mark: Mark,
}

impl ProblemEntry {
    pub fn new(id: impl Into<String>, mark: Mark) -> Self {
        Self {
            id: id.into(),
            mark,
        }
    }
}

/// 一份待编译的试卷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// 输出文件名（不含扩展名）
    pub file_name: String,
    /// 试卷类型，为空时不显示分值
    pub sheet_type: Option<String>,
    pub metadata: Metadata,
    /// 按文档顺序排列，允许重复
    pub problems: Vec<ProblemEntry>,
    pub formatters: Formatters,
    /// 只对这份试卷生效的模板
    pub template: Option<String>,
    /// `template` 来自全局声明，而不是试卷自己声明的
    pub template_inherited: bool,
}

impl Sheet {
    pub fn new(file_name: impl Into<String>, sheet_type: Option<String>) -> Self {
        Self {
            file_name: file_name.into(),
            sheet_type,
            metadata: Metadata::new(),
            problems: Vec::new(),
            formatters: Formatters::new(),
            template: None,
            template_inherited: false,
        }
    }

    /// 是否显示分值
    pub fn shows_marks(&self) -> bool {
        self.sheet_type.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// 把题目 ID 解析为题库中的题目引用
    ///
    /// 任何一个 ID 不存在都会失败，不会跳过。
    pub fn resolve<'a, F>(&'a self, mut lookup: F) -> Result<ResolvedSheet<'a>, StoreError>
    where
        F: FnMut(&str) -> Result<&'a Problem, StoreError>,
    {
        let problems = self
            .problems
            .iter()
            .map(|entry| Ok((lookup(&entry.id)?, entry.mark)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(ResolvedSheet {
            sheet: self,
            problems,
        })
    }
}

/// 排版分隔符
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderLayout {
    /// 题目之间的分隔
    pub item_separator: String,
    /// 混合模式下题目与答案之间的分隔
    pub solution_separator: String,
}

impl From<&crate::config::Config> for RenderLayout {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            item_separator: config.item_separator.clone(),
            solution_separator: config.solution_separator.clone(),
        }
    }
}

/// 题目已解析为题库引用的试卷
#[derive(Debug, Clone)]
pub struct ResolvedSheet<'a> {
    sheet: &'a Sheet,
    problems: Vec<(&'a Problem, Mark)>,
}

impl<'a> ResolvedSheet<'a> {
    pub fn sheet(&self) -> &'a Sheet {
        self.sheet
    }

    pub fn problems(&self) -> &[(&'a Problem, Mark)] {
        &self.problems
    }

    /// 渲染为排版源文件文本
    pub fn render(
        &self,
        template: &Template,
        mode: RenderMode,
        layout: &RenderLayout,
    ) -> AppResult<String> {
        let items = self
            .problems
            .iter()
            .map(|(problem, mark)| self.format_problem(problem, *mark, mode, layout))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let body = items.join(&layout.item_separator);

        Ok(template.substitute(&body, &self.sheet.metadata)?)
    }

    fn format_problem(
        &self,
        problem: &Problem,
        mark: Mark,
        mode: RenderMode,
        layout: &RenderLayout,
    ) -> Result<String, StoreError> {
        let mark_text = if self.sheet.shows_marks() {
            self.sheet.formatters.get(MARK_FORMATTER).format(mark)
        } else {
            String::new()
        };

        let text = match mode {
            RenderMode::Questions => problem.get_question()? + &mark_text,
            RenderMode::Solutions => problem.get_solution()? + &mark_text,
            RenderMode::Mixed => {
                problem.get_question()?
                    + &mark_text
                    + &layout.solution_separator
                    + &problem.get_solution()?
            }
        };
        Ok(text)
    }
}
