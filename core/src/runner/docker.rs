use std::path::Path;

use anyhow::{anyhow, bail, Context as _};
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    KillContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures_util::StreamExt as _;
use tokio::io::AsyncWriteExt as _;
use tokio::task::JoinHandle;

use super::{interp_run_cmd, ExecutionOutcome, ExecutionSpec, Runner, Verdict};
use crate::config::LanguageConfig;

const SANDBOX_DIR: &str = "/sandbox";
/// Unprivileged user created in each sandbox image.
const SANDBOX_USER: &str = "runner";
const PIDS_LIMIT: i64 = 64;
/// 100ms scheduler period; quota == period pins the container to one CPU.
const CPU_PERIOD_USEC: i64 = 100_000;
/// 128 + SIGKILL. The kernel's way of reporting a forced kill, which under
/// our memory cap means the OOM killer fired.
const EXIT_CODE_OOM_KILLED: i64 = 137;

/// Container-backed execution engine.
///
/// Each `run` creates a fresh container with the program bind-mounted
/// read-only, no network, a hard memory cap and one CPU, drives it to
/// completion (or kills it at the deadline) and force-removes it.
pub struct DockerRunner {
    docker: Docker,
    langs: Vec<LanguageConfig>,
}

impl DockerRunner {
    pub fn connect(langs: Vec<LanguageConfig>) -> anyhow::Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to connect to docker daemon")?;
        Ok(Self { docker, langs })
    }

    async fn try_run(&self, spec: &ExecutionSpec) -> anyhow::Result<ExecutionOutcome> {
        let Some(lang) = self.langs.iter().find(|l| l.name == spec.lang) else {
            bail!("unsupported language: {}", spec.lang);
        };

        // The invocation runs on its own task: the deadline kill and the
        // container removal must complete even when the caller is cancelled
        // mid-run and this future is dropped.
        let invocation =
            tokio::spawn(Self::invoke(self.docker.clone(), lang.clone(), spec.clone()));
        invocation.await.context("Sandbox task failed")?
    }

    async fn invoke(
        docker: Docker,
        lang: LanguageConfig,
        spec: ExecutionSpec,
    ) -> anyhow::Result<ExecutionOutcome> {
        Self::ensure_image_exists(&docker, &lang.image).await?;

        // Bind mounts require an absolute host path.
        let program_file = fsutil::canonicalize_path(&spec.program_file)
            .context("Failed to resolve program file")?;

        let container_id = Self::create_container(&docker, &lang, &program_file, &spec).await?;

        let res = Self::drive_container(&docker, &container_id, &spec).await;
        // Reclaim on every path, including infrastructure failures after
        // create.
        Self::remove_container(&docker, &container_id).await;
        res
    }

    async fn ensure_image_exists(docker: &Docker, image: &str) -> anyhow::Result<()> {
        match docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(anyhow!(
                "sandbox image not found: {} (run 'make docker-build' first)",
                image
            )),
            Err(e) => Err(e).context("Failed to check sandbox image"),
        }
    }

    async fn create_container(
        docker: &Docker,
        lang: &LanguageConfig,
        program_file: &Path,
        spec: &ExecutionSpec,
    ) -> anyhow::Result<String> {
        let sandbox_path = sandbox_program_path(program_file);
        let run_cmd = interp_run_cmd(&lang.run, &sandbox_path)
            .with_context(|| format!("Invalid run command for lang '{}'", lang.name))?;
        let cmd = split_run_cmd(&run_cmd);

        let memory = (spec.memory_limit_bytes > 0).then_some(spec.memory_limit_bytes);

        let config = Config {
            image: Some(lang.image.clone()),
            cmd: Some(cmd),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            stdin_once: Some(true),
            network_disabled: Some(true),
            working_dir: Some(SANDBOX_DIR.to_owned()),
            user: Some(SANDBOX_USER.to_owned()),
            host_config: Some(HostConfig {
                mounts: Some(vec![Mount {
                    typ: Some(MountTypeEnum::BIND),
                    source: Some(program_file.to_string_lossy().into_owned()),
                    target: Some(sandbox_path),
                    read_only: Some(true),
                    ..Default::default()
                }]),
                network_mode: Some("none".to_owned()),
                auto_remove: Some(true),
                memory,
                // memory_swap == memory disables swap entirely.
                memory_swap: memory,
                cpu_period: Some(CPU_PERIOD_USEC),
                cpu_quota: Some(CPU_PERIOD_USEC),
                pids_limit: Some(PIDS_LIMIT),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .context("Failed to create container")?;
        Ok(created.id)
    }

    async fn drive_container(
        docker: &Docker,
        id: &str,
        spec: &ExecutionSpec,
    ) -> anyhow::Result<ExecutionOutcome> {
        let AttachContainerResults { mut output, mut input } = docker
            .attach_container(
                id,
                Some(AttachContainerOptions::<String> {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .context("Failed to attach to container")?;

        // Stdin is streamed concurrently with the output reader: a large
        // input must not deadlock against a full output pipe.
        let stdin = spec.stdin.clone();
        let writer: JoinHandle<()> = tokio::spawn(async move {
            if let Err(e) = input.write_all(&stdin).await {
                log::debug!("Writing stdin to container: {}", e);
            }
            // Half-close so the program sees EOF on stdin.
            if let Err(e) = input.shutdown().await {
                log::debug!("Closing container stdin: {}", e);
            }
        });

        // Demultiplex the attach stream into separate buffers until EOF.
        let reader: JoinHandle<(Vec<u8>, Vec<u8>)> = tokio::spawn(async move {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message }) => stdout.extend_from_slice(&message),
                    Ok(LogOutput::StdErr { message }) => stderr.extend_from_slice(&message),
                    Ok(_) => (),
                    Err(e) => {
                        log::debug!("Reading container output: {}", e);
                        break;
                    }
                }
            }
            (stdout, stderr)
        });

        docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start container")?;

        let started_at = tokio::time::Instant::now();
        let mut wait = docker.wait_container(
            id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );

        let exit_code: i64 = match tokio::time::timeout(spec.time_limit, wait.next()).await {
            Err(_elapsed) => {
                Self::kill_container(docker, id).await;
                writer.abort();
                reader.abort();
                return Ok(ExecutionOutcome {
                    verdict: Verdict::TimeLimitExceeded,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    exit_code: None,
                    // The reported duration is the configured limit.
                    duration: spec.time_limit,
                    peak_memory_bytes: 0,
                    detail: Some("time limit exceeded".to_owned()),
                });
            }
            Ok(Some(Ok(resp))) => resp.status_code,
            // wait_container reports a non-zero exit code as this error.
            Ok(Some(Err(DockerError::DockerContainerWaitError { code, .. }))) => code,
            Ok(Some(Err(e))) => return Err(e).context("Container wait error"),
            Ok(None) => bail!("Container wait stream ended unexpectedly"),
        };
        let duration = started_at.elapsed();

        // The program may have exited right at its last write; wait for the
        // demuxer to reach EOF so no output is truncated.
        writer.abort();
        let (stdout, stderr) = reader.await.unwrap_or_default();

        let (verdict, detail) = verdict_for_exit_code(exit_code);
        Ok(ExecutionOutcome {
            verdict,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            duration,
            peak_memory_bytes: 0,
            detail,
        })
    }

    async fn kill_container(docker: &Docker, id: &str) {
        let opt = KillContainerOptions { signal: "SIGKILL" };
        if let Err(e) = docker.kill_container(id, Some(opt)).await {
            log::warn!("Failed to kill container {}: {}", id, e);
        }
    }

    async fn remove_container(docker: &Docker, id: &str) {
        let opt = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match docker.remove_container(id, Some(opt)).await {
            Ok(()) => (),
            // AutoRemove may have reclaimed it first.
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => (),
            Err(e) => log::warn!("Failed to remove container {}: {}", id, e),
        }
    }
}

#[async_trait]
impl Runner for DockerRunner {
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
        // Containers are removed per run; the client itself holds no
        // server-side state.
        Ok(())
    }
}

/// Turns the interpolated run command into the container's argv.
///
/// The command runs without a shell: words are split on whitespace and
/// quotes are not interpreted. Templates needing shell syntax belong to the
/// subprocess backend.
fn split_run_cmd(run_cmd: &str) -> Vec<String> {
    run_cmd.split_whitespace().map(str::to_owned).collect()
}

/// In-sandbox path the program is mounted at, keeping its extension so the
/// run command sees the file type it expects.
fn sandbox_program_path(program_file: &Path) -> String {
    match program_file.extension() {
        Some(ext) => format!("{}/solution.{}", SANDBOX_DIR, ext.to_string_lossy()),
        None => format!("{}/solution", SANDBOX_DIR),
    }
}

fn verdict_for_exit_code(exit_code: i64) -> (Verdict, Option<String>) {
    if exit_code == 0 {
        (Verdict::Accepted, None)
    } else if exit_code == EXIT_CODE_OOM_KILLED {
        (
            Verdict::MemoryLimitExceeded,
            Some("memory limit exceeded".to_owned()),
        )
    } else {
        (
            Verdict::RuntimeError,
            Some(format!("runtime error: exit code {}", exit_code)),
        )
    }
}
