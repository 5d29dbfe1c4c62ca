use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::models::CompileMode;
use crate::orchestrator::{BatchReport, UnitOutcome};

const DEFAULT_LOG_FILTER: &str = "probman=info";
const VERBOSE_LOG_FILTER: &str = "probman=debug";

/// 初始化日志
///
/// # 参数
/// - `verbose`: 是否输出调试日志（`RUST_LOG` 优先）
/// - `log_file`: 额外写入的日志文件
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => {
            init_log_file(path)?;
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .with_context(|| format!("无法打开日志文件: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter()),
        )
        .with(file_layer)
        .try_init()
        .context("初始化日志失败")?;
    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    let log_header = format!(
        "{}\n试卷编译日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path.display()))?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `command`: 当前执行的子命令
/// - `problem_root`: 题库目录
pub fn log_startup(command: &str, problem_root: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", command);
    info!("📚 题库目录: {}", problem_root.display());
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `sheets`: 试卷数量
/// - `mode`: 编译模式
/// - `total_units`: 编译单元总数
pub fn log_batch_start(sheets: usize, mode: CompileMode, total_units: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始编译 {} 份试卷 (模式: {})", sheets, mode);
    info!("📄 共 {} 个编译单元", total_units);
    info!("{}", "=".repeat(60));
}

/// 记录单个编译单元的进度
///
/// 失败的警告已由编排层输出，这里只记录进度。
pub fn log_unit_result(outcome: &UnitOutcome) {
    match &outcome.result {
        Ok(path) => info!(
            "[{}/{}] ✓ {} ({}) -> {}",
            outcome.unit_index,
            outcome.total_units,
            outcome.sheet,
            outcome.mode,
            path.display()
        ),
        Err(e) => info!(
            "[{}/{}] ✗ {} ({}): {}",
            outcome.unit_index, outcome.total_units, outcome.sheet, outcome.mode, e
        ),
    }
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部编译完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded(), report.total_units);
    info!("❌ 失败: {}", report.failed());
    for failure in report.failures() {
        info!("   - {} ({})", failure.sheet, failure.mode);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("probman.log");
        init_log_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("试卷编译日志"));
    }
}
