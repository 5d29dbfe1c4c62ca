use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use probman::cli::{Cli, Commands};
use probman::models::{CompileMode, Metadata, Template};
use probman::orchestrator::{BatchRequest, Orchestrator};
use probman::parser::SpecParser;
use probman::services::{apply_fixes, Checker, ProblemStore};
use probman::utils::logging;
use probman::Config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref()).context("加载配置失败")?;

    // 初始化日志
    logging::init(
        cli.verbose || config.verbose_logging,
        config.log_file.as_deref(),
    )?;

    match cli.command {
        Commands::Compile {
            spec,
            mode,
            dest,
            includes,
            template,
        } => {
            logging::log_startup("编译试卷", &config.problem_root);
            compile(&config, &spec, mode, dest, &includes, template.as_deref()).await
        }
        Commands::Preview {
            id,
            template,
            includes,
        } => {
            logging::log_startup("预览题目", &config.problem_root);
            preview(&config, &id, template.as_deref(), &includes).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { ids, json, fix } => check(&config, &ids, json, fix),
        Commands::List => {
            list(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::New {
            id,
            question,
            solution,
            attachments,
        } => {
            new_problem(&config, &id, &question, &solution, &attachments)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { id } => {
            let mut store = open_store(&config)?;
            store
                .remove_problem(&id)
                .with_context(|| format!("删除题目 {} 失败", id))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_store(config: &Config) -> Result<ProblemStore> {
    ProblemStore::open(&config.problem_root)
        .with_context(|| format!("无法打开题库: {}", config.problem_root.display()))
}

fn read_template(path: &Path) -> Result<Template> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取模板: {}", path.display()))?;
    Ok(Template::new(text))
}

async fn compile(
    config: &Config,
    spec_path: &Path,
    mode: CompileMode,
    dest: Option<PathBuf>,
    extra_includes: &[PathBuf],
    template_path: Option<&Path>,
) -> Result<ExitCode> {
    let mut spec = SpecParser::open(spec_path, config)
        .and_then(SpecParser::parse_all)
        .with_context(|| format!("解析说明文件失败: {}", spec_path.display()))?;
    info!("✓ 读取到 {} 份试卷", spec.sheets.len());

    let template = match template_path {
        Some(path) => {
            spec.detach_global_template();
            read_template(path)?
        }
        None => spec.template.clone().map(Template::new).unwrap_or_default(),
    };

    let mut includes = spec.includes.clone();
    includes.extend_from_slice(extra_includes);
    let dest = dest.unwrap_or_else(|| config.output_dir.clone());

    let store = open_store(config)?;
    let orchestrator = Orchestrator::new(config);
    let report = orchestrator
        .compile_all(
            &store,
            BatchRequest {
                sheets: &spec.sheets,
                template: &template,
                mode,
                includes: &includes,
                dest: &dest,
            },
            logging::log_unit_result,
        )
        .await?;

    if report.failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn preview(
    config: &Config,
    id: &str,
    template_path: Option<&Path>,
    includes: &[PathBuf],
) -> Result<()> {
    let template = match template_path {
        Some(path) => read_template(path)?,
        None => Template::default(),
    };

    // 预览没有试卷元数据，模板引用的字段一律留空
    let mut metadata = Metadata::new();
    for field in template.fields() {
        metadata.insert(field, "");
    }

    let store = open_store(config)?;
    let orchestrator = Orchestrator::new(config);
    let artifact = orchestrator
        .preview(&store, id, &template, metadata, includes)
        .await?;

    let status = tokio::process::Command::new(&config.viewer)
        .arg(artifact.path())
        .status()
        .await
        .with_context(|| format!("无法启动查看器: {}", config.viewer))?;
    if !status.success() {
        warn!("⚠️ 查看器退出码 {:?}", status.code());
    }
    Ok(())
}

fn check(config: &Config, ids: &[String], json: bool, fix: bool) -> Result<ExitCode> {
    let mut store = open_store(config)?;
    let checker = Checker::new(&store);
    let issues = if ids.is_empty() {
        checker.check_all()?
    } else {
        checker.check_ids(ids)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else {
        for issue in &issues {
            println!("{}", issue.description);
        }
        info!("🔍 检查完成，发现 {} 个问题", issues.len());
    }

    let remaining = if fix {
        let unfixed = apply_fixes(&mut store, &issues)?;
        info!(
            "🔧 已修复 {} 个问题，{} 个需要人工处理",
            issues.len() - unfixed.len(),
            unfixed.len()
        );
        unfixed
    } else {
        issues
    };

    if remaining.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    for problem in store.list_problems() {
        let attachments = problem.attachments()?;
        if attachments.is_empty() {
            println!("{}", problem.id());
        } else {
            let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
            println!("{}  [{}]", problem.id(), names.join(", "));
        }
    }
    info!("📚 共 {} 道题目", store.len());
    Ok(())
}

fn new_problem(
    config: &Config,
    id: &str,
    question: &Path,
    solution: &Path,
    attachments: &[PathBuf],
) -> Result<()> {
    let question = std::fs::read_to_string(question)
        .with_context(|| format!("无法读取题干: {}", question.display()))?;
    let solution = std::fs::read_to_string(solution)
        .with_context(|| format!("无法读取答案: {}", solution.display()))?;

    let mut files = Vec::with_capacity(attachments.len());
    for path in attachments {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("附件路径没有文件名: {}", path.display()))?;
        let data =
            std::fs::read(path).with_context(|| format!("无法读取附件: {}", path.display()))?;
        files.push((name, data));
    }

    let mut store = open_store(config)?;
    store
        .new_problem(id, &question, &solution, &files)
        .with_context(|| format!("新建题目 {} 失败", id))?;
    Ok(())
}
