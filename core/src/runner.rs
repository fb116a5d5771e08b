use std::{
    collections::HashMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use crate::str_interp::{self, InterpError};

pub mod docker;
pub mod process;

pub use docker::*;
pub use process::*;

/// Judgement for a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Verdict {
    #[strum(serialize = "AC")]
    Accepted,
    #[strum(serialize = "WA")]
    WrongAnswer,
    #[strum(serialize = "TLE")]
    TimeLimitExceeded,
    #[strum(serialize = "MLE")]
    MemoryLimitExceeded,
    #[strum(serialize = "RE")]
    RuntimeError,
    #[strum(serialize = "CE")]
    CompilationError,
    #[strum(serialize = "SE")]
    SystemError,
}

/// One sandboxed program invocation.
#[derive(Debug, Clone)]
pub struct ExecutionSpec {
    /// Resolved language name (an entry of the language registry).
    pub lang: String,
    pub program_file: PathBuf,
    pub stdin: Vec<u8>,
    pub time_limit: Duration,
    /// Maximum memory in bytes (0 = unlimited).
    pub memory_limit_bytes: i64,
}

/// What happened when a program was executed once.
///
/// `verdict` here is engine-level only: `Accepted` means "exited zero in
/// time", not "output is correct". Output correctness is decided later by
/// the judge.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub verdict: Verdict,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was killed or never ran.
    pub exit_code: Option<i64>,
    pub duration: Duration,
    /// Peak memory in bytes, 0 when the backend cannot report it.
    pub peak_memory_bytes: i64,
    pub detail: Option<String>,
}

impl ExecutionOutcome {
    pub fn system_error(err: anyhow::Error) -> Self {
        Self {
            verdict: Verdict::SystemError,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
            duration: Duration::ZERO,
            peak_memory_bytes: 0,
            detail: Some(format!("{:#}", err)),
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A code execution backend.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Executes the program described by `spec` and always yields an
    /// outcome: infrastructure failures (daemon unreachable, missing image,
    /// unresolvable program path, ...) surface as `Verdict::SystemError`
    /// outcomes, never as errors.
    async fn run(&self, spec: &ExecutionSpec) -> ExecutionOutcome;

    /// Names of the languages this backend can execute.
    fn supported_langs(&self) -> Vec<String>;

    /// Releases backend resources. The runner must not be used afterwards.
    async fn cleanup(&self) -> anyhow::Result<()>;
}

/// Interpolates a run-command template with the program file's path parts.
///
/// Available variables: `#{program}`, `#{programName}`, `#{programStem}`,
/// `#{programExt}`, `#{programDir}`.
pub fn interp_run_cmd(
    template: &str,
    program: impl AsRef<Path>,
) -> std::result::Result<String, InterpError> {
    let program = program.as_ref();
    let vars = make_cmd_interp_vars(program);
    str_interp::interp(template, &vars)
}

fn make_cmd_interp_vars(program: &Path) -> HashMap<&'static str, &OsStr> {
    let mut m: HashMap<_, &OsStr> = HashMap::new();
    m.insert("program", program.as_os_str());
    m.insert(
        "programName",
        program.file_name().unwrap_or(OsStr::new("UNDEFINED_FILE_NAME")),
    );
    m.insert(
        "programDir",
        program.parent().unwrap_or(Path::new(".")).as_os_str(),
    );
    m.insert(
        "programStem",
        program.file_stem().unwrap_or(OsStr::new("UNDEFINED_FILE_STEM")),
    );
    m.insert(
        "programExt",
        program
            .extension()
            .unwrap_or(OsStr::new("UNDEFINED_FILE_EXTENSION")),
    );
    m
}
