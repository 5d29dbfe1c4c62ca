//! 试卷说明文件解析器
//!
//! 逐行扫描说明文件，按顺序产出 [`Sheet`]。
//!
//! 行的分类（按优先级）：
//! 1. `#` 开头：注释，忽略
//! 2. 空行：结束当前试卷；没有打开的试卷时无效果
//! 3. 缩进行，或试卷打开时的非缩进行：`key = value` 在当前作用域赋值，
//!    否则整行追加到最近一个键的值后面
//! 4. 没有打开试卷时不含 `=` 的行：试卷头 `name [type]`
//! 5. 没有打开试卷时的 `key = value`：全局元数据

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Lines};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ParseError;
use crate::models::{Formatter, Formatters, Metadata, ProblemEntry, Sheet, MARK_FORMATTER};
use crate::parser::special_keys::{handler_for, KeyHandler};

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>[A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?P<value>.*)$")
        .expect("assignment pattern is valid")
});

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9_][A-Za-z0-9_.-]*)(?:\s+(?P<type>[A-Za-z0-9_][A-Za-z0-9_.-]*))?$")
        .expect("header pattern is valid")
});

static PROBLEM_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>[A-Za-z0-9_][A-Za-z0-9_.-]*)(?:\s+(?P<mark>\d+))?$")
        .expect("problem entry pattern is valid")
});

/// 完整解析一个说明文件的结果
#[derive(Debug, Clone, Default)]
pub struct SpecFile {
    pub sheets: Vec<Sheet>,
    /// `include` 声明的文件（已相对说明文件所在目录解析）
    pub includes: Vec<PathBuf>,
    /// 全局 `template` 声明读到的模板内容
    pub template: Option<String>,
}

impl SpecFile {
    /// 让继承了全局模板的试卷改用调用方给出的默认模板
    ///
    /// 试卷自己声明的模板保持不变，即使内容与全局模板相同。
    pub fn detach_global_template(&mut self) {
        for sheet in self.sheets.iter_mut().filter(|s| s.template_inherited) {
            sheet.template = None;
            sheet.template_inherited = false;
        }
    }
}

/// 解析 `problems` 列表中的一个条目：`id` 或 `id mark`
pub fn parse_problem_entry(entry: &str, line: usize) -> Result<ProblemEntry, ParseError> {
    let malformed = || ParseError::MalformedProblem {
        line,
        entry: entry.to_string(),
    };
    let caps = PROBLEM_ENTRY.captures(entry.trim()).ok_or_else(malformed)?;
    let mark = match caps.name("mark") {
        Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| malformed())?),
        None => None,
    };
    Ok(ProblemEntry::new(&caps["id"], mark))
}

/// 说明文件解析器
///
/// 是一个只能遍历一次的迭代器；遇到解析错误后产出该错误并停止。
pub struct SpecParser<R> {
    lines: Lines<R>,
    origin: PathBuf,
    base_dir: PathBuf,
    default_mark: Formatter,
    lineno: usize,
    global_metadata: Metadata,
    global_formatters: Formatters,
    global_template: Option<String>,
    includes: Vec<PathBuf>,
    current: Option<Sheet>,
    last_key: Option<String>,
    /// 最近一个键累计的原始值
    pending: String,
    finished: bool,
}

impl SpecParser<BufReader<File>> {
    /// 打开说明文件，`template`/`include` 相对该文件所在目录解析
    pub fn open(path: &Path, config: &Config) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self::from_reader(
            BufReader::new(file),
            path.to_path_buf(),
            base_dir,
            config,
        ))
    }
}

impl SpecParser<Cursor<String>> {
    pub fn from_text(text: impl Into<String>, base_dir: impl Into<PathBuf>, config: &Config) -> Self {
        Self::from_reader(
            Cursor::new(text.into()),
            PathBuf::from("<text>"),
            base_dir.into(),
            config,
        )
    }
}

impl<R: BufRead> SpecParser<R> {
    pub fn from_reader(reader: R, origin: PathBuf, base_dir: PathBuf, config: &Config) -> Self {
        Self {
            lines: reader.lines(),
            origin,
            base_dir,
            default_mark: Formatter::Pattern(config.default_mark_format.clone()),
            lineno: 0,
            global_metadata: Metadata::new(),
            global_formatters: Formatters::new(),
            global_template: None,
            includes: Vec::new(),
            current: None,
            last_key: None,
            pending: String::new(),
            finished: false,
        }
    }

    /// 目前为止读到的 `include` 声明
    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// 目前为止读到的全局模板
    pub fn template(&self) -> Option<&str> {
        self.global_template.as_deref()
    }

    /// 解析整个文件，任何错误都会使整个结果作废
    pub fn parse_all(mut self) -> Result<SpecFile, ParseError> {
        let mut sheets: Vec<Sheet> = Vec::new();
        for sheet in self.by_ref() {
            let sheet = sheet?;
            if sheets.iter().any(|s| s.file_name == sheet.file_name) {
                warn!("⚠️ 试卷名重复: {}，输出文件会被覆盖", sheet.file_name);
            }
            sheets.push(sheet);
        }

        debug!(
            "说明文件 {} 解析完成: {} 份试卷, {} 个附加文件",
            self.origin.display(),
            sheets.len(),
            self.includes.len()
        );

        Ok(SpecFile {
            sheets,
            includes: self.includes,
            template: self.global_template,
        })
    }

    fn process_line(&mut self, raw: &str) -> Result<Option<Sheet>, ParseError> {
        let line = raw.trim_end_matches('\r');
        if line.starts_with('#') {
            return Ok(None);
        }

        let content = line.trim();
        if content.is_empty() {
            return Ok(self.close_sheet());
        }

        let indented = line.starts_with(char::is_whitespace);
        let assignment = ASSIGNMENT
            .captures(content)
            .map(|caps| (caps["key"].to_string(), caps["value"].to_string()));

        match assignment {
            Some((key, value)) => self.assign(&key, &value)?,
            None if indented || self.current.is_some() => self.continue_last(content)?,
            None => self.open_sheet(content)?,
        }
        Ok(None)
    }

    fn close_sheet(&mut self) -> Option<Sheet> {
        let sheet = self.current.take()?;
        self.last_key = None;
        self.pending.clear();
        debug!("试卷 {} 结束 (第 {} 行)", sheet.file_name, self.lineno);
        Some(sheet)
    }

    fn open_sheet(&mut self, content: &str) -> Result<(), ParseError> {
        let caps = HEADER
            .captures(content)
            .ok_or_else(|| ParseError::MalformedHeader {
                line: self.lineno,
                text: content.to_string(),
            })?;

        let mut sheet = Sheet::new(&caps["name"], caps.name("type").map(|m| m.as_str().to_string()));
        sheet.metadata = self.global_metadata.clone();
        sheet.formatters = self.global_formatters.clone();
        sheet.template = self.global_template.clone();
        sheet.template_inherited = sheet.template.is_some();
        if sheet.sheet_type.is_some() && !sheet.formatters.contains(MARK_FORMATTER) {
            sheet
                .formatters
                .set(MARK_FORMATTER, self.default_mark.clone());
        }

        debug!(
            "打开试卷 {} (类型: {:?}, 第 {} 行)",
            sheet.file_name, sheet.sheet_type, self.lineno
        );
        self.current = Some(sheet);
        self.last_key = None;
        self.pending.clear();
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        self.last_key = Some(key.to_string());
        self.pending = value.to_string();
        self.apply(key, value, false)
    }

    fn continue_last(&mut self, text: &str) -> Result<(), ParseError> {
        let Some(key) = self.last_key.clone() else {
            return Err(ParseError::DanglingData {
                line: self.lineno,
                text: text.to_string(),
            });
        };
        self.pending.push_str(text);
        self.apply(&key, text, true)
    }

    /// 按键的处理方式应用一个值或续行片段
    fn apply(&mut self, key: &str, fragment: &str, continued: bool) -> Result<(), ParseError> {
        match handler_for(key) {
            KeyHandler::PlainMetadata => {
                let metadata = self.scope_metadata();
                if continued {
                    metadata.extend_value(key, fragment);
                } else {
                    metadata.insert(key, fragment);
                }
            }
            KeyHandler::ProblemsList => self.push_problems(fragment)?,
            KeyHandler::MarkFormatterSpec => {
                let formatter = if self.pending.is_empty() {
                    Formatter::Empty
                } else {
                    Formatter::Macro(self.pending.clone())
                };
                self.scope_formatters().set(MARK_FORMATTER, formatter);
            }
            KeyHandler::TemplatePath => {
                let text = self.read_template(&self.pending)?;
                match self.current.as_mut() {
                    Some(sheet) => {
                        sheet.template = Some(text);
                        sheet.template_inherited = false;
                    }
                    None => self.global_template = Some(text),
                }
            }
            KeyHandler::IncludeFile => {
                if continued {
                    self.includes.pop();
                }
                self.includes.push(self.base_dir.join(&self.pending));
            }
        }
        Ok(())
    }

    fn push_problems(&mut self, fragment: &str) -> Result<(), ParseError> {
        let line = self.lineno;
        let Some(sheet) = self.current.as_mut() else {
            return Err(ParseError::ProblemsOutsideSheet { line });
        };
        for entry in fragment.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            sheet.problems.push(parse_problem_entry(entry, line)?);
        }
        Ok(())
    }

    fn read_template(&self, value: &str) -> Result<String, ParseError> {
        let path = self.base_dir.join(value.trim());
        debug!("读取模板: {}", path.display());
        std::fs::read_to_string(&path).map_err(|source| ParseError::Template {
            line: self.lineno,
            path,
            source,
        })
    }

    fn scope_metadata(&mut self) -> &mut Metadata {
        match self.current.as_mut() {
            Some(sheet) => &mut sheet.metadata,
            None => &mut self.global_metadata,
        }
    }

    fn scope_formatters(&mut self) -> &mut Formatters {
        match self.current.as_mut() {
            Some(sheet) => &mut sheet.formatters,
            None => &mut self.global_formatters,
        }
    }
}

impl<R: BufRead> Iterator for SpecParser<R> {
    type Item = Result<Sheet, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let raw = match self.lines.next() {
                None => {
                    self.finished = true;
                    return self.close_sheet().map(Ok);
                }
                Some(Err(source)) => {
                    self.finished = true;
                    return Some(Err(ParseError::Read {
                        path: self.origin.clone(),
                        source,
                    }));
                }
                Some(Ok(raw)) => raw,
            };
            self.lineno += 1;

            match self.process_line(&raw) {
                Ok(Some(sheet)) => return Some(Ok(sheet)),
                Ok(None) => continue,
                Err(e) => {
                    self.finished = true;
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<SpecFile, ParseError> {
        SpecParser::from_text(text, ".", &Config::default()).parse_all()
    }

    const EXAMPLE: &str = "course = Algebra I\nhw1 normal\n  mark = \\marks\n  problems = q1 5; q2\n";

    #[test]
    fn test_example_spec() {
        let spec = parse(EXAMPLE).unwrap();
        assert_eq!(spec.sheets.len(), 1);

        let sheet = &spec.sheets[0];
        assert_eq!(sheet.file_name, "hw1");
        assert_eq!(sheet.sheet_type.as_deref(), Some("normal"));
        assert_eq!(sheet.metadata.len(), 1);
        assert_eq!(sheet.metadata.get("course"), Some("Algebra I"));
        assert_eq!(
            sheet.problems,
            vec![ProblemEntry::new("q1", Some(5)), ProblemEntry::new("q2", None)]
        );
        assert_eq!(
            sheet.formatters.get(MARK_FORMATTER),
            &Formatter::Macro(r"\marks".to_string())
        );
    }

    #[test]
    fn test_parsing_is_repeatable() {
        let text = "a = 1\ns1 t\n  problems = x; y 2\n\ns2\n  title = T\n  problems = y; x 3\n";
        let first = parse(text).unwrap();
        let second = parse(text).unwrap();
        assert_eq!(first.sheets, second.sheets);
        let names: Vec<_> = first.sheets.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2"]);
    }

    #[test]
    fn test_continuation_concatenates_left_to_right() {
        let spec = parse("hw1\n  title = a\n  b\n  c\n").unwrap();
        assert_eq!(spec.sheets[0].metadata.get("title"), Some("abc"));

        let spec = parse("title = a\n  b\n  c\nhw1\n").unwrap();
        assert_eq!(spec.sheets[0].metadata.get("title"), Some("abc"));
    }

    #[test]
    fn test_unindented_continuation_inside_sheet() {
        let spec = parse("hw1\n  title = Home\nwork\n").unwrap();
        assert_eq!(spec.sheets[0].metadata.get("title"), Some("Homework"));
    }

    #[test]
    fn test_blank_lines_close_one_sheet_at_a_time() {
        let spec = parse("\n\nhw1\n  problems = a\n\n\n\nhw2\n  problems = b\n\n").unwrap();
        assert_eq!(spec.sheets.len(), 2);
        assert_eq!(spec.sheets[0].problems, vec![ProblemEntry::new("a", None)]);
        assert_eq!(spec.sheets[1].problems, vec![ProblemEntry::new("b", None)]);
    }

    #[test]
    fn test_final_sheet_without_trailing_blank() {
        let spec = parse("hw1\n  problems = a 1").unwrap();
        assert_eq!(spec.sheets.len(), 1);
        assert_eq!(spec.sheets[0].problems, vec![ProblemEntry::new("a", Some(1))]);
    }

    #[test]
    fn test_comments_are_ignored() {
        let spec = parse("# header\nhw1\n# inside\n  problems = a\n").unwrap();
        assert_eq!(spec.sheets[0].problems.len(), 1);
    }

    #[test]
    fn test_problem_entries() {
        assert_eq!(
            parse_problem_entry("p1 10", 1).unwrap(),
            ProblemEntry::new("p1", Some(10))
        );
        assert_eq!(
            parse_problem_entry("p1", 1).unwrap(),
            ProblemEntry::new("p1", None)
        );
        assert!(matches!(
            parse_problem_entry("p1 abc", 7),
            Err(ParseError::MalformedProblem { line: 7, .. })
        ));
    }

    #[test]
    fn test_bad_problem_entry_aborts_whole_file() {
        let err = parse("hw1\n  problems = p1\n\nhw2\n  problems = p1 abc\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedProblem { line: 5, .. }));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut parser =
            SpecParser::from_text("  dangling\nhw1\n  problems = a\n", ".", &Config::default());
        assert!(matches!(
            parser.next(),
            Some(Err(ParseError::DanglingData { line: 1, .. }))
        ));
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_dangling_data_inside_fresh_sheet() {
        let err = parse("hw1\n  no key here\n").unwrap_err();
        assert!(matches!(err, ParseError::DanglingData { line: 2, .. }));
    }

    #[test]
    fn test_malformed_header() {
        let err = parse("hw1 normal extra\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 1, .. }));
    }

    #[test]
    fn test_problems_outside_sheet() {
        let err = parse("problems = a; b\n").unwrap_err();
        assert!(matches!(err, ParseError::ProblemsOutsideSheet { line: 1 }));
    }

    #[test]
    fn test_problems_continuation_appends_entries() {
        let spec = parse("hw1\n  problems = a 1; b\n  c 3;\n  d\n").unwrap();
        let ids: Vec<_> = spec.sheets[0].problems.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_global_changes_only_affect_later_sheets() {
        let spec = parse("course = A\nhw1\n  problems = a\n\ncourse = B\nhw2\n  problems = a\n").unwrap();
        assert_eq!(spec.sheets[0].metadata.get("course"), Some("A"));
        assert_eq!(spec.sheets[1].metadata.get("course"), Some("B"));
    }

    #[test]
    fn test_sheet_metadata_does_not_leak() {
        let spec = parse("hw1\n  title = One\n\nhw2\n").unwrap();
        assert_eq!(spec.sheets[1].metadata.get("title"), None);
    }

    #[test]
    fn test_default_mark_formatter_only_for_typed_sheets() {
        let spec = parse("typed exam\n\nplain\n").unwrap();
        assert!(matches!(
            spec.sheets[0].formatters.get(MARK_FORMATTER),
            Formatter::Pattern(_)
        ));
        assert_eq!(spec.sheets[1].formatters.get(MARK_FORMATTER), &Formatter::Empty);
        assert!(!spec.sheets[1].formatters.contains(MARK_FORMATTER));
    }

    #[test]
    fn test_global_mark_overrides_default() {
        let spec = parse("mark = \\pts\ntyped exam\n").unwrap();
        assert_eq!(
            spec.sheets[0].formatters.get(MARK_FORMATTER),
            &Formatter::Macro(r"\pts".to_string())
        );
    }

    #[test]
    fn test_template_and_include_resolve_against_spec_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tmpl"), "$problems").unwrap();
        fs::write(dir.path().join("special.tmpl"), "special $problems").unwrap();
        let spec_path = dir.path().join("sheets.spec");
        fs::write(
            &spec_path,
            "template = main.tmpl\ninclude = preamble.sty\nhw1\n  problems = a\n\nhw2\n  template = special.tmpl\n  problems = a\n",
        )
        .unwrap();

        let spec = SpecParser::open(&spec_path, &Config::default())
            .unwrap()
            .parse_all()
            .unwrap();

        assert_eq!(spec.template.as_deref(), Some("$problems"));
        assert_eq!(spec.includes, vec![dir.path().join("preamble.sty")]);
        assert_eq!(spec.sheets[0].template.as_deref(), Some("$problems"));
        assert_eq!(spec.sheets[1].template.as_deref(), Some("special $problems"));
        assert!(!spec.sheets[1].metadata.contains_key("template"));
    }

    #[test]
    fn test_detach_keeps_sheet_template_with_same_text() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tmpl"), "$problems").unwrap();
        let spec_path = dir.path().join("sheets.spec");
        fs::write(
            &spec_path,
            "template = main.tmpl
hw1
  problems = a

hw2
  template = main.tmpl
  problems = a
",
        )
        .unwrap();

        let mut spec = SpecParser::open(&spec_path, &Config::default())
            .unwrap()
            .parse_all()
            .unwrap();
        assert!(spec.sheets[0].template_inherited);
        assert!(!spec.sheets[1].template_inherited);

        spec.detach_global_template();
        assert_eq!(spec.sheets[0].template, None);
        assert_eq!(spec.sheets[1].template.as_deref(), Some("$problems"));
    }

    #[test]
    fn test_missing_template_file() {
        let err = parse("template = /nonexistent/none.tmpl\n").unwrap_err();
        assert!(matches!(err, ParseError::Template { line: 1, .. }));
    }
}
