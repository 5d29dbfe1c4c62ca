//! 排版编译器 - 基础设施层
//!
//! 唯一会启动外部编译进程的地方，只暴露"编译一个源文件"的能力。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::error::CompileFailure;
use crate::utils::logging::truncate_text;

/// 单遍编译的输出
#[derive(Debug)]
pub struct PassOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// 失败信息中保留的编译器输出长度
const OUTPUT_SUMMARY_CHARS: usize = 400;

impl PassOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// 用于错误信息的输出摘要，优先取错误输出
    pub fn summary(&self) -> String {
        let text = match self.stderr.trim() {
            "" => self.stdout.trim(),
            stderr => stderr,
        };
        truncate_text(text, OUTPUT_SUMMARY_CHARS)
    }
}

/// 排版编译器
///
/// 职责：
/// - 在工作目录中调用外部编译器
/// - 每个源文件编译两遍，以便解析交叉引用
/// - 以输出文件是否存在判断成败，退出码只用于日志
/// - 不认识 Sheet / Problem
#[derive(Debug, Clone)]
pub struct Compiler {
    engine: String,
    args: Vec<String>,
    timeout: Duration,
    extension: String,
}

impl Compiler {
    pub fn new(config: &Config) -> Self {
        Self {
            engine: config.engine.clone(),
            args: config.engine_args.clone(),
            timeout: config.compile_timeout(),
            extension: config.artifact_extension.clone(),
        }
    }

    /// 源文件对应的输出文件路径
    pub fn artifact_path(&self, workdir: &Path, source_name: &str) -> PathBuf {
        let stem = Path::new(source_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_name.to_string());
        workdir.join(format!("{}.{}", stem, self.extension))
    }

    /// 编译工作目录中的源文件，返回输出文件路径
    ///
    /// 第一遍超时或无法启动时不再执行第二遍。
    pub async fn compile(&self, workdir: &Path, source_name: &str) -> Result<PathBuf, CompileFailure> {
        let artifact = self.artifact_path(workdir, source_name);
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => debug!("删除旧的输出文件 {}", artifact.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(CompileFailure::StaleArtifact { artifact, source }),
        }

        let first = self.run_pass(workdir, source_name, 1).await?;
        if !first.success() {
            debug!(
                "第 1 遍编译 {} 退出码 {:?}，继续第 2 遍",
                source_name, first.exit_code
            );
        }
        let second = self.run_pass(workdir, source_name, 2).await?;

        if artifact.is_file() {
            Ok(artifact)
        } else {
            debug!(
                "编译 {} 未生成输出文件，编译器输出: {}",
                source_name,
                truncate_text(second.stdout.trim(), 400)
            );
            Err(CompileFailure::MissingArtifact {
                artifact,
                exit_code: second.exit_code,
                output: second.summary(),
            })
        }
    }

    async fn run_pass(
        &self,
        workdir: &Path,
        source_name: &str,
        pass: u8,
    ) -> Result<PassOutput, CompileFailure> {
        let start = Instant::now();
        debug!(
            "第 {} 遍: {} {} {} (目录: {})",
            pass,
            self.engine,
            self.args.join(" "),
            source_name,
            workdir.display()
        );

        let child = Command::new(&self.engine)
            .args(&self.args)
            .arg(source_name)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompileFailure::Spawn {
                engine: self.engine.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CompileFailure::Spawn {
                    engine: self.engine.clone(),
                    source,
                })
            }
            Err(_elapsed) => {
                debug!(
                    "第 {} 遍编译 {} 超时 ({:?})",
                    pass, source_name, self.timeout
                );
                return Err(CompileFailure::Timeout {
                    pass,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        debug!(
            "第 {} 遍完成: 退出码 {:?}, 耗时 {}ms",
            pass,
            output.status.code(),
            start.elapsed().as_millis()
        );

        Ok(PassOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sh_compiler(script: &str, timeout_secs: u64) -> Compiler {
        let config = Config {
            engine: "sh".to_string(),
            engine_args: vec!["-c".to_string(), script.to_string()],
            compile_timeout_secs: timeout_secs,
            ..Config::default()
        };
        Compiler::new(&config)
    }

    #[tokio::test]
    async fn test_artifact_presence_decides_success() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();

        // 退出码非零但生成了输出文件，仍然算成功
        let compiler = sh_compiler(r#"cp "$0" "${0%.tex}.pdf"; exit 1"#, 10);
        let artifact = compiler.compile(dir.path(), "doc.tex").await.unwrap();
        assert_eq!(artifact, dir.path().join("doc.pdf"));
        assert!(artifact.is_file());
    }

    #[tokio::test]
    async fn test_runs_two_passes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();

        let compiler = sh_compiler(
            r#"echo pass >> passes.log; if [ -f passes.seen ]; then cp "$0" "${0%.tex}.pdf"; fi; touch passes.seen"#,
            10,
        );
        compiler.compile(dir.path(), "doc.tex").await.unwrap();
        let log = fs::read_to_string(dir.path().join("passes.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();

        let compiler = sh_compiler("exit 0", 10);
        let err = compiler.compile(dir.path(), "doc.tex").await.unwrap_err();
        assert!(matches!(err, CompileFailure::MissingArtifact { exit_code: Some(0), .. }));
    }

    #[tokio::test]
    async fn test_missing_artifact_carries_engine_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();

        let compiler = sh_compiler("echo 'Undefined control sequence' >&2; exit 1", 10);
        let err = compiler.compile(dir.path(), "doc.tex").await.unwrap_err();
        match err {
            CompileFailure::MissingArtifact { output, .. } => {
                assert_eq!(output, "Undefined control sequence")
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stale_artifact_that_cannot_be_removed_is_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();
        // 同名目录无法用 remove_file 删除
        fs::create_dir(dir.path().join("doc.pdf")).unwrap();

        let compiler = sh_compiler("exit 0", 10);
        let err = compiler.compile(dir.path(), "doc.tex").await.unwrap_err();
        assert!(matches!(err, CompileFailure::StaleArtifact { .. }));
    }

    #[tokio::test]
    async fn test_stale_artifact_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();
        fs::write(dir.path().join("doc.pdf"), "old").unwrap();

        let compiler = sh_compiler("exit 1", 10);
        let err = compiler.compile(dir.path(), "doc.tex").await.unwrap_err();
        assert!(matches!(err, CompileFailure::MissingArtifact { .. }));
        assert!(!dir.path().join("doc.pdf").exists());
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.tex"), "x").unwrap();

        let compiler = sh_compiler("sleep 5", 1);
        let err = compiler.compile(dir.path(), "doc.tex").await.unwrap_err();
        assert!(matches!(err, CompileFailure::Timeout { pass: 1, secs: 1 }));
    }

    #[tokio::test]
    async fn test_unknown_engine_is_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            engine: "/nonexistent/engine".to_string(),
            ..Config::default()
        };
        let err = Compiler::new(&config)
            .compile(dir.path(), "doc.tex")
            .await
            .unwrap_err();
        assert!(matches!(err, CompileFailure::Spawn { .. }));
    }
}
