pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use error::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use crate::config::{Backend, Config};
use crate::judge::Judge;
use crate::runner::{DockerRunner, ProcessRunner, Runner, Verdict};
use crate::storage::ProblemStore;
use crate::style;

pub fn init_judge_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if let Ok(config_filepath) = Config::find_file_in_ancestors(dir) {
        let path = if config_filepath.is_relative() && !config_filepath.starts_with("./") {
            Path::new("./").join(config_filepath)
        } else {
            config_filepath
        };
        bail!(
            "Already being a judge dir.\nIf it's intentional, remove {:?} and then try again.",
            path
        );
    }

    let config_filepath = dir.join(Config::FILENAME);
    let toml = Config::example_toml();
    fsutil::write_with_mkdir(config_filepath, &toml)?;
    Ok(())
}

pub fn list_problems(cfg: &Config) -> Result<()> {
    let store = ProblemStore::new(&cfg.judge.problems_dir);
    let problems = store.load_all()?;

    if problems.is_empty() {
        println!("No problems found.");
        println!("Add problems to: {}", store.problems_dir().display());
        return Ok(());
    }

    println!(
        "{:<20} {:<30} {:<10} {}",
        "ID", "TITLE", "DIFFICULTY", "TAGS"
    );
    println!("{}", "-".repeat(80));
    for p in &problems {
        println!(
            "{:<20} {:<30} {:<10} {}",
            p.id,
            truncate(&p.title, 28),
            p.difficulty,
            p.tags.join(", "),
        );
    }
    println!("\n{} problem(s) found", problems.len());
    Ok(())
}

pub fn show_problem(cfg: &Config, problem_id: &str) -> Result<()> {
    let store = ProblemStore::new(&cfg.judge.problems_dir);
    let p = store.load(problem_id)?;

    println!("# {}", p.title);
    println!("Difficulty: {} | Tags: {}", p.difficulty, p.tags.join(", "));
    println!(
        "Time Limit: {}ms | Memory Limit: {}MB",
        p.time_limit_ms, p.memory_limit_mb
    );
    println!();

    println!("## Description");
    println!();
    println!("{}", p.description.trim());
    println!();

    if !p.input_format.is_empty() {
        println!("## Input Format");
        println!();
        println!("{}", p.input_format.trim());
        println!();
    }

    if !p.output_format.is_empty() {
        println!("## Output Format");
        println!();
        println!("{}", p.output_format.trim());
        println!();
    }

    if !p.constraints.is_empty() {
        println!("## Constraints");
        println!();
        for c in &p.constraints {
            println!("- {}", c);
        }
        println!();
    }

    if !p.examples.is_empty() {
        println!("## Examples");
        println!();
        for (i, ex) in p.examples.iter().enumerate() {
            println!("### Example {}", i + 1);
            println!();
            println!("**Input:**");
            println!("```");
            println!("{}", ex.input.trim());
            println!("```");
            println!();
            println!("**Output:**");
            println!("```");
            println!("{}", ex.output.trim());
            println!("```");
            if !ex.explanation.is_empty() {
                println!();
                println!("**Explanation:** {}", ex.explanation);
            }
            println!();
        }
    }
    Ok(())
}

pub async fn run_judge(
    cfg: &Config,
    problem_id: &str,
    program_file: impl AsRef<Path>,
    testcase_num: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let program_file = program_file.as_ref();
    ensure!(
        program_file.is_file(),
        "solution file not found: {}",
        program_file.display()
    );

    let store = ProblemStore::new(&cfg.judge.problems_dir);
    let problem = store
        .load(problem_id)
        .with_context(|| format!("Failed to load problem {}", problem_id))?;
    let testcases = store
        .load_testcases(problem_id)
        .context("Failed to load test cases")?;

    println!("Running {}...", problem.id);

    let judge = Judge::new(self::build_runner(cfg)?, cfg.language.clone());

    let style = ProgressStyle::default_bar()
        .template("{spinner} {msg}")
        .unwrap();
    let progress_bar_container = MultiProgress::new();
    let bar = progress_bar_container
        .add(ProgressBar::new(100))
        .with_style(style)
        .with_message(format!("Judging {} ...", problem.id));
    let bar = Arc::new(Mutex::new(bar));
    {
        // Tick spinner
        let bar = bar.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let bar = bar.lock().await;
                if bar.is_finished() {
                    break;
                }
                bar.tick();
            }
        });
    }

    let res = match testcase_num {
        Some(n) => {
            judge
                .judge_single(&problem, &testcases, n, program_file)
                .await
        }
        None => judge.judge(&problem, &testcases, program_file).await,
    };
    bar.lock().await.finish_and_clear();

    let res = match res {
        Ok(res) => res,
        Err(e) => {
            judge
                .close()
                .await
                .unwrap_or_else(|e| log::warn!("Failed to release runner: {:#}", e));
            return Err(e);
        }
    };

    for case in &res.cases {
        println!(
            "  {}: {} ({}ms)",
            case.testcase.name,
            style::verdict_icon(case.verdict),
            case.duration.as_millis(),
        );
    }

    if verbose {
        res.cases
            .iter()
            .filter(|c| c.verdict != Verdict::Accepted)
            .for_each(style::print_case_result_detail);
    }

    println!();
    println!(
        "Result: {} ({}/{} tests passed)",
        style::verdict_icon(res.verdict),
        res.passed,
        res.total
    );
    println!("Total time: {}ms", res.total_duration.as_millis());

    judge.close().await.context("Failed to release runner")?;
    Ok(())
}

fn build_runner(cfg: &Config) -> Result<Box<dyn Runner>> {
    let runner: Box<dyn Runner> = match cfg.judge.backend {
        Backend::Docker => Box::new(
            DockerRunner::connect(cfg.language.clone()).context("Failed to create docker runner")?,
        ),
        Backend::Process => {
            Box::new(ProcessRunner::new(cfg.language.clone()).shell(cfg.judge.shell.clone()))
        }
    };
    Ok(runner)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_owned();
    }
    let cut: String = s.chars().take(max_len - 3).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_twice_should_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("repo");

        init_judge_dir(&dir).unwrap();
        assert!(dir.join(Config::FILENAME).is_file());

        let err = init_judge_dir(dir.join("problems")).unwrap_err();
        assert!(dbg!(err.to_string()).contains("Already being a judge dir"));
    }

    #[test]
    fn scaffolded_config_is_loadable() {
        let tmp = tempfile::tempdir().unwrap();
        init_judge_dir(tmp.path()).unwrap();

        let cfg = Config::from_file_finding_in_ancestors(tmp.path()).unwrap();
        assert_eq!(
            cfg.source_config_file,
            Some(tmp.path().join(Config::FILENAME))
        );
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 28), "short");
        assert_eq!(
            truncate("a very long problem title indeed", 10),
            "a very ..."
        );
    }
}
