use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::CompileMode;

#[derive(Parser)]
#[command(name = "probman", about = "题库管理与试卷编译工具", version)]
pub struct Cli {
    /// 配置文件路径（默认 ~/.probman.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 按试卷描述文件编译试卷
    Compile {
        /// 试卷描述文件
        spec: PathBuf,

        /// 编译模式
        #[arg(long, value_enum, default_value_t = CompileMode::Both)]
        mode: CompileMode,

        /// 输出目录（默认使用配置中的 output_dir）
        #[arg(long)]
        dest: Option<PathBuf>,

        /// 额外复制到工作目录的文件
        #[arg(short, long = "include")]
        includes: Vec<PathBuf>,

        /// 文档模板（覆盖描述文件中的全局模板）
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// 编译单道题目并用查看器打开
    Preview {
        /// 题目 ID
        id: String,

        /// 文档模板
        #[arg(long)]
        template: Option<PathBuf>,

        /// 额外复制到工作目录的文件
        #[arg(short, long = "include")]
        includes: Vec<PathBuf>,
    },

    /// 检查题目引用的附件
    Check {
        /// 题目 ID（为空时检查全部题目）
        ids: Vec<String>,

        /// 以 JSON 输出
        #[arg(long)]
        json: bool,

        /// 自动修复能处理的问题（引用改名、补齐缺失的文件）
        #[arg(long)]
        fix: bool,
    },

    /// 列出题库中的题目
    List,

    /// 新建题目
    New {
        /// 题目 ID
        id: String,

        /// 题干文件
        #[arg(long)]
        question: PathBuf,

        /// 答案文件
        #[arg(long)]
        solution: PathBuf,

        /// 附件
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// 删除题目
    Remove {
        /// 题目 ID
        id: String,
    },
}
