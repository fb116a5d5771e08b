use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use judge_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Hard cap on one whole judge run, sandbox startup included.
const WHOLE_RUN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub problem_id: String,

    #[arg()] // positional argument
    pub program_file_or_dir: Option<PathBuf>,

    /// Judge only the N-th test case (1-origin). 0 means all.
    #[arg(short, long)]
    pub test: Option<usize>,

    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;

    let program_file = {
        let existing_path = match &args.program_file_or_dir {
            Some(path) if path.exists() => path,
            Some(path) => bail!("No such file or dir: {:?}", path),
            None => Path::new("./"),
        };

        if existing_path.is_dir() {
            fsutil::find_most_recently_modified_file(existing_path, &cfg.judge.include)
                .with_context(|| {
                    format!("Cannot find target program file in {:?}", existing_path)
                })?
        } else {
            existing_path.into()
        }
    };

    let testcase_num = args.test.filter(|&n| n > 0);

    let judging = action::run_judge(
        &cfg,
        &args.problem_id,
        &program_file,
        testcase_num,
        args.verbose,
    );
    match tokio::time::timeout(WHOLE_RUN_TIMEOUT, judging).await {
        Ok(res) => res,
        Err(_) => bail!(
            "Judging did not finish within {} seconds",
            WHOLE_RUN_TIMEOUT.as_secs()
        ),
    }
}
