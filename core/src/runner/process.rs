use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

use super::{interp_run_cmd, ExecutionOutcome, ExecutionSpec, Runner, Verdict};
use crate::config::LanguageConfig;

/// Runs programs directly on the host shell with no isolation.
///
/// Only the time limit is enforced; the memory limit is ignored. Meant for
/// trusted local programs and for tests, not for untrusted submissions.
pub struct ProcessRunner {
    langs: Vec<LanguageConfig>,
    shell: PathBuf,
}

impl ProcessRunner {
    const DEFAULT_SHELL: &str = "/bin/sh";

    pub fn new(langs: Vec<LanguageConfig>) -> Self {
        Self {
            langs,
            shell: Self::DEFAULT_SHELL.into(),
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    async fn try_run(&self, spec: &ExecutionSpec) -> anyhow::Result<ExecutionOutcome> {
        let Some(lang) = self.langs.iter().find(|l| l.name == spec.lang) else {
            bail!("unsupported language: {}", spec.lang);
        };
        let cmd = interp_run_cmd(&lang.run, &spec.program_file)
            .with_context(|| format!("Invalid run command for lang '{}'", lang.name))?;

        let mut proc = Command::new(&self.shell)
            .args(["-c", &cmd])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child must not outlive a caller cancelled at an outer
            // deadline.
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn '{} -c {}'",
                    self.shell.to_string_lossy(),
                    &cmd
                )
            })?;
        let mut stdin = proc.stdin.take().context("Failed to open stdin")?;
        let mut stdout = proc.stdout.take().context("Failed to open stdout")?;
        let mut stderr = proc.stderr.take().context("Failed to open stderr")?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let (res, start_at) = {
            // Stdin is fed inside the join; writing a large input up front
            // can deadlock against a full stdout pipe.
            let fut_stdin = async {
                match stdin.write_all(&spec.stdin).await {
                    // The program is free to exit without draining its stdin.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => (),
                    res => res?,
                }
                drop(stdin); // NOTE: this line is essential
                std::io::Result::Ok(())
            };
            let fut_stdout = tokio::io::copy(&mut stdout, &mut stdout_buf);
            let fut_stderr = tokio::io::copy(&mut stderr, &mut stderr_buf);
            let fut_exit_status = proc.wait();

            let start_at = tokio::time::Instant::now();

            let res = tokio::time::timeout(spec.time_limit, async {
                tokio::try_join!(fut_stdin, fut_stdout, fut_stderr, fut_exit_status)
                    .context("Failed to communicate with subprocess")
            })
            .await;
            (res, start_at)
        };

        let duration = tokio::time::Instant::now().duration_since(start_at);

        match res {
            Err(_elapsed) => {
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill TLE process: {:#}", e));
                Ok(ExecutionOutcome {
                    verdict: Verdict::TimeLimitExceeded,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    exit_code: None,
                    // The reported duration is the configured limit.
                    duration: spec.time_limit,
                    peak_memory_bytes: 0,
                    detail: Some("time limit exceeded".to_owned()),
                })
            }

            Ok(Err(e)) => Err(e),

            Ok(Ok((_, _, _, exit_status))) => {
                let (verdict, exit_code, detail) = match exit_status.code() {
                    Some(0) => (Verdict::Accepted, Some(0), None),
                    Some(code) => (
                        Verdict::RuntimeError,
                        Some(i64::from(code)),
                        Some(format!("runtime error: exit code {}", code)),
                    ),
                    None => (
                        Verdict::RuntimeError,
                        None,
                        Some("runtime error: terminated by signal".to_owned()),
                    ),
                };
                Ok(ExecutionOutcome {
                    verdict,
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    exit_code,
                    duration,
                    peak_memory_bytes: 0,
                    detail,
                })
            }
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, spec: &ExecutionSpec) -> ExecutionOutcome {
        match self.try_run(spec).await {
            Ok(outcome) => outcome,
            Err(err) => ExecutionOutcome::system_error(err),
        }
    }

    fn supported_langs(&self) -> Vec<String> {
        self.langs.iter().map(|l| l.name.clone()).collect()
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
