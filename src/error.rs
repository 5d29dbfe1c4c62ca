use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 试卷说明文件解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 题库错误
    #[error("题库错误: {0}")]
    Store(#[from] StoreError),
    /// 模板渲染错误
    #[error("模板错误: {0}")]
    Template(#[from] TemplateError),
    /// 暂存附件错误
    #[error("暂存错误: {0}")]
    Stage(#[from] StageError),
    /// 编译失败
    #[error("编译失败: {0}")]
    Compile(#[from] CompileFailure),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他 IO 错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 试卷说明文件解析错误
///
/// 任何一个解析错误都会使整个文件作废，不保留已解析出的部分试卷。
#[derive(Debug, Error)]
pub enum ParseError {
    /// 无法读取说明文件
    #[error("无法读取说明文件 {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 试卷头格式错误（应为 `name [type]`）
    #[error("第 {line} 行: 试卷头格式错误: {text:?}")]
    MalformedHeader { line: usize, text: String },
    /// 题目列表条目格式错误（应为 `id [整数]`）
    #[error("第 {line} 行: 题目条目格式错误: {entry:?}")]
    MalformedProblem { line: usize, entry: String },
    /// 续行之前没有任何键
    #[error("第 {line} 行: 悬空数据（之前没有可续写的键）: {text:?}")]
    DanglingData { line: usize, text: String },
    /// 在试卷之外使用 `problems`
    #[error("第 {line} 行: `problems` 只能出现在试卷内部")]
    ProblemsOutsideSheet { line: usize },
    /// 无法读取 `template` 引用的模板文件
    #[error("第 {line} 行: 无法读取模板 {path}: {source}")]
    Template {
        line: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 题库错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 题目不存在
    #[error("题目不存在: {0}")]
    NotFound(String),
    /// 题目已存在
    #[error("题目已存在: {0}")]
    AlreadyExists(String),
    /// 题目 ID 不能用作目录名
    #[error("无效的题目 ID: {0:?}")]
    InvalidId(String),
    /// 附件名不能用作文件名
    #[error("无效的附件名: {0:?}")]
    InvalidAttachmentName(String),
    /// 题目缺少题干或答案文件
    #[error("题目 {id} 缺少文件: {}", path.display())]
    MissingText { id: String, path: PathBuf },
    /// 题库读写失败
    #[error("题库读写失败 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 模板渲染错误
#[derive(Debug, Error)]
pub enum TemplateError {
    /// 模板引用了试卷未定义的字段
    #[error("模板引用了未定义的字段: {0}")]
    MissingField(String),
    /// 模板中存在无法识别的占位符
    #[error("模板第 {line} 行第 {column} 列: 无效的占位符")]
    InvalidPlaceholder { line: usize, column: usize },
}

/// 暂存附件错误
#[derive(Debug, Error)]
pub enum StageError {
    /// 两个附件在工作目录中重名
    #[error("附件 {name} 冲突: 题目 {first} 与题目 {second} 使用了同名附件")]
    AttachmentCollision {
        name: String,
        first: String,
        second: String,
    },
    /// 复制文件失败
    #[error("暂存文件失败 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 编译失败
#[derive(Debug, Error)]
pub enum CompileFailure {
    /// 无法启动编译器
    #[error("无法启动编译器 {engine}: {source}")]
    Spawn {
        engine: String,
        #[source]
        source: std::io::Error,
    },
    /// 编译超时
    #[error("第 {pass} 遍编译超时 ({secs} 秒)")]
    Timeout { pass: u8, secs: u64 },
    /// 编译完成后没有生成输出文件
    #[error("未生成输出文件 {} (退出码: {exit_code:?}): {output}", artifact.display())]
    MissingArtifact {
        artifact: PathBuf,
        exit_code: Option<i32>,
        /// 编译器最后一遍的输出（已截断）
        output: String,
    },
    /// 无法删除上次留下的输出文件
    #[error("无法删除旧的输出文件 {}: {source}", artifact.display())]
    StaleArtifact {
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 {}: {source}", path.display())]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读写错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl StageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
