use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
///
/// 所有配置都通过这个值显式传递，没有全局状态。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 题库根目录
    pub problem_root: PathBuf,
    /// 默认输出目录
    pub output_dir: PathBuf,
    /// 排版编译器程序
    pub engine: String,
    /// 编译器参数（源文件名追加在最后）
    pub engine_args: Vec<String>,
    /// 编译产物扩展名
    pub artifact_extension: String,
    /// 单次编译超时（秒）
    pub compile_timeout_secs: u64,
    /// 默认分值格式，`{mark}` 为分值，`{s}` 为复数后缀
    pub default_mark_format: String,
    /// 题目之间的分隔
    pub item_separator: String,
    /// 混合模式下题目与答案之间的分隔
    pub solution_separator: String,
    /// 每批都要复制到工作目录的文件
    pub includes: Vec<PathBuf>,
    /// 预览使用的查看器
    pub viewer: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            problem_root: PathBuf::from("problems"),
            output_dir: PathBuf::from("."),
            engine: "pdflatex".to_string(),
            engine_args: vec![
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
            ],
            artifact_extension: "pdf".to_string(),
            compile_timeout_secs: 120,
            default_mark_format: r"\par\null\hfill\textbf{[{mark} mark{s}]}".to_string(),
            item_separator: "\n\n\\item ".to_string(),
            solution_separator: "\n\n\\textbf{Solution}\n".to_string(),
            includes: Vec::new(),
            viewer: "xdg-open".to_string(),
            verbose_logging: false,
            log_file: None,
        }
    }
}

impl Config {
    /// 默认配置文件位置 `~/.probman.toml`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".probman.toml"))
    }

    /// 按 默认值 → 配置文件 → 环境变量 的顺序加载
    ///
    /// 显式给出的配置文件必须存在；默认位置的配置文件缺失时直接忽略。
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        base.with_env()
    }

    /// 从 TOML 文件读取配置，未写出的字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用 `PROBMAN_*` 环境变量覆盖配置
    pub fn with_env(self) -> Result<Self, ConfigError> {
        Ok(Self {
            problem_root: env_var("PROBMAN_PROBLEM_ROOT")
                .map(PathBuf::from)
                .unwrap_or(self.problem_root),
            output_dir: env_var("PROBMAN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(self.output_dir),
            engine: env_var("PROBMAN_ENGINE").unwrap_or(self.engine),
            compile_timeout_secs: env_parsed("PROBMAN_COMPILE_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.compile_timeout_secs),
            viewer: env_var("PROBMAN_VIEWER").unwrap_or(self.viewer),
            verbose_logging: env_parsed("PROBMAN_VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
            log_file: env_var("PROBMAN_LOG_FILE")
                .map(PathBuf::from)
                .or(self.log_file),
            ..self
        })
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(
    name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}
