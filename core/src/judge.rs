use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure};

use crate::compare::{self, Comparator, Comparison};
use crate::config::LanguageConfig;
use crate::runner::{ExecutionSpec, Runner, Verdict};
use crate::storage::{Problem, TestCase};

/// Outcome of one test case.
#[derive(Debug)]
pub struct CaseResult<'t> {
    pub testcase: &'t TestCase,
    pub verdict: Verdict,
    pub comparison: Comparison,
    pub stderr: String,
    pub duration: Duration,
    pub detail: Option<String>,
}

/// Overall outcome of judging one program against one problem.
#[derive(Debug)]
pub struct JudgeResult<'t> {
    pub problem_id: String,
    pub verdict: Verdict,
    pub passed: usize,
    pub total: usize,
    pub total_duration: Duration,
    pub cases: Vec<CaseResult<'t>>,
}

/// Runs a program against every test case of a problem and folds the
/// per-case verdicts into one overall verdict.
pub struct Judge {
    runner: Box<dyn Runner>,
    langs: Vec<LanguageConfig>,
}

impl Judge {
    pub fn new(runner: Box<dyn Runner>, langs: Vec<LanguageConfig>) -> Self {
        Self { runner, langs }
    }

    /// Judges every test case in order. A failing case never stops the run;
    /// the verdict of the first non-accepted case becomes the overall one.
    pub async fn judge<'t>(
        &self,
        problem: &Problem,
        testcases: &'t [TestCase],
        program_file: &Path,
    ) -> anyhow::Result<JudgeResult<'t>> {
        ensure!(!testcases.is_empty(), "no test cases to judge");
        let lang = self.find_lang(program_file)?;
        let Some(comparator) = compare::for_mode(problem.comparison) else {
            bail!("unsupported comparison mode: {}", problem.comparison);
        };

        let mut result = JudgeResult {
            problem_id: problem.id.clone(),
            verdict: Verdict::Accepted,
            passed: 0,
            total: testcases.len(),
            total_duration: Duration::ZERO,
            cases: Vec::with_capacity(testcases.len()),
        };

        for tc in testcases {
            let case = self
                .judge_case(problem, tc, program_file, &lang, comparator.as_ref())
                .await;
            result.total_duration += case.duration;
            if case.verdict == Verdict::Accepted {
                result.passed += 1;
            } else if result.verdict == Verdict::Accepted {
                result.verdict = case.verdict;
            }
            result.cases.push(case);
        }
        Ok(result)
    }

    /// Judges only the `case_num`-th test case (1-indexed).
    pub async fn judge_single<'t>(
        &self,
        problem: &Problem,
        testcases: &'t [TestCase],
        case_num: usize,
        program_file: &Path,
    ) -> anyhow::Result<JudgeResult<'t>> {
        ensure!(
            (1..=testcases.len()).contains(&case_num),
            "test {} does not exist (problem has {} tests)",
            case_num,
            testcases.len()
        );
        self.judge(problem, &testcases[case_num - 1..case_num], program_file)
            .await
    }

    /// Releases the execution backend.
    pub async fn close(self) -> anyhow::Result<()> {
        self.runner.cleanup().await
    }

    fn find_lang(&self, program_file: &Path) -> anyhow::Result<String> {
        let file_name = program_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(lang) = self.langs.iter().find(|l| l.pattern.matches(&file_name)) else {
            bail!(
                "no language configured for file: {}",
                program_file.display()
            );
        };
        Ok(lang.name.clone())
    }

    async fn judge_case<'t>(
        &self,
        problem: &Problem,
        tc: &'t TestCase,
        program_file: &Path,
        lang: &str,
        comparator: &dyn Comparator,
    ) -> CaseResult<'t> {
        let spec = ExecutionSpec {
            lang: lang.to_owned(),
            program_file: program_file.to_owned(),
            stdin: tc.input.clone(),
            time_limit: problem.time_limit(),
            memory_limit_bytes: problem.memory_limit_bytes(),
        };
        let outcome = self.runner.run(&spec).await;

        // A crashed or timed-out program's output is never compared.
        if outcome.verdict != Verdict::Accepted {
            return CaseResult {
                testcase: tc,
                verdict: outcome.verdict,
                comparison: Comparison {
                    is_match: false,
                    expected: tc.expected_lossy(),
                    actual: outcome.stdout_lossy(),
                    ..Default::default()
                },
                stderr: outcome.stderr_lossy(),
                duration: outcome.duration,
                detail: outcome.detail,
            };
        }

        let comparison = comparator.compare(&tc.expected_lossy(), &outcome.stdout_lossy());
        let verdict = if comparison.is_match {
            Verdict::Accepted
        } else {
            Verdict::WrongAnswer
        };
        CaseResult {
            testcase: tc,
            verdict,
            comparison,
            stderr: outcome.stderr_lossy(),
            duration: outcome.duration,
            detail: outcome.detail,
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serdable::GlobPattern;

    use super::*;
    use crate::compare::ComparisonMode;
    use crate::runner::ExecutionOutcome;

    /// Replays a scripted sequence of outcomes and counts invocations.
    struct ScriptedRunner {
        outcomes: Mutex<VecDeque<ExecutionOutcome>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Runner for ScriptedRunner {
        async fn run(&self, _spec: &ExecutionSpec) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("runner called more times than scripted")
        }

        fn supported_langs(&self) -> Vec<String> {
            vec!["python".to_owned()]
        }

        async fn cleanup(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn judge_with(outcomes: Vec<ExecutionOutcome>) -> (Judge, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = ScriptedRunner {
            outcomes: Mutex::new(outcomes.into()),
            calls: Arc::clone(&calls),
        };
        let langs = vec![LanguageConfig {
            name: "python".to_owned(),
            pattern: GlobPattern::parse("*.py").unwrap(),
            image: "judge-python".to_owned(),
            run: "python3 #{program}".to_owned(),
        }];
        (Judge::new(Box::new(runner), langs), calls)
    }

    fn ac(stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            verdict: Verdict::Accepted,
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            exit_code: Some(0),
            duration: Duration::from_millis(10),
            peak_memory_bytes: 0,
            detail: None,
        }
    }

    fn failing(verdict: Verdict, detail: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            verdict,
            stdout: Vec::new(),
            stderr: b"trace".to_vec(),
            exit_code: None,
            duration: Duration::from_millis(10),
            peak_memory_bytes: 0,
            detail: Some(detail.to_owned()),
        }
    }

    fn problem() -> Problem {
        let mut p = Problem {
            id: "two-sum".to_owned(),
            title: "Two Sum".to_owned(),
            ..Default::default()
        };
        p.apply_defaults();
        p
    }

    fn testcases(n: usize) -> Vec<TestCase> {
        (1..=n)
            .map(|i| TestCase {
                name: format!("sample/{}", i),
                input: format!("{}\n", i).into_bytes(),
                expected: b"ok\n".to_vec(),
            })
            .collect()
    }

    #[tokio::test]
    async fn all_cases_accepted() {
        let (judge, _) = judge_with(vec![ac("ok\n"), ac("ok\n"), ac("ok\n")]);
        let tcs = testcases(3);

        let res = judge.judge(&problem(), &tcs, Path::new("main.py")).await;
        let res = dbg!(res).unwrap();
        assert_eq!(res.verdict, Verdict::Accepted);
        assert_eq!((res.passed, res.total), (3, 3));
        assert_eq!(res.total_duration, Duration::from_millis(30));
        assert_eq!(res.problem_id, "two-sum");
    }

    #[tokio::test]
    async fn first_failure_wins_and_later_cases_still_run() {
        let (judge, calls) = judge_with(vec![
            ac("ok\n"),
            failing(Verdict::TimeLimitExceeded, "time limit exceeded"),
            ac("ok\n"),
            failing(Verdict::RuntimeError, "runtime error: exit code 3"),
        ]);
        let tcs = testcases(4);

        let res = judge
            .judge(&problem(), &tcs, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(res.verdict, Verdict::TimeLimitExceeded);
        assert_eq!((res.passed, res.total), (2, 4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let verdicts: Vec<Verdict> = res.cases.iter().map(|c| c.verdict).collect();
        assert_eq!(
            verdicts,
            [
                Verdict::Accepted,
                Verdict::TimeLimitExceeded,
                Verdict::Accepted,
                Verdict::RuntimeError,
            ]
        );
    }

    #[tokio::test]
    async fn engine_verdict_is_taken_as_is_without_comparison() {
        let (judge, _) = judge_with(vec![failing(
            Verdict::MemoryLimitExceeded,
            "memory limit exceeded",
        )]);
        let tcs = testcases(1);

        let res = judge
            .judge(&problem(), &tcs, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(res.verdict, Verdict::MemoryLimitExceeded);
        let case = &res.cases[0];
        assert_eq!(case.comparison.expected, "ok\n");
        assert_eq!(case.comparison.actual, "");
        assert_eq!(case.stderr, "trace");
        assert_eq!(case.detail.as_deref(), Some("memory limit exceeded"));
    }

    #[tokio::test]
    async fn mismatching_output_is_wrong_answer() {
        let (judge, _) = judge_with(vec![ac("ok\n"), ac("not ok\n")]);
        let tcs = testcases(2);

        let res = judge
            .judge(&problem(), &tcs, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(res.verdict, Verdict::WrongAnswer);
        assert_eq!((res.passed, res.total), (1, 2));
        assert_eq!(res.cases[1].comparison.diff_line, 1);
    }

    #[tokio::test]
    async fn empty_testcases_is_an_error() {
        let (judge, calls) = judge_with(vec![]);

        let err = judge
            .judge(&problem(), &[], Path::new("main.py"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no test cases"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_language_is_an_error() {
        let (judge, calls) = judge_with(vec![ac("ok\n")]);
        let tcs = testcases(1);

        let err = judge
            .judge(&problem(), &tcs, Path::new("main.rb"))
            .await
            .unwrap_err();
        assert!(dbg!(err.to_string()).contains("no language configured"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_case_out_of_range_never_runs_the_engine() {
        let (judge, calls) = judge_with(vec![]);
        let tcs = testcases(2);

        let err = judge
            .judge_single(&problem(), &tcs, 5, Path::new("main.py"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "test 5 does not exist (problem has 2 tests)"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_case_judges_only_the_selected_one() {
        let (judge, calls) = judge_with(vec![ac("ok\n")]);
        let tcs = testcases(3);

        let res = judge
            .judge_single(&problem(), &tcs, 2, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((res.passed, res.total), (1, 1));
        assert_eq!(res.cases[0].testcase.name, "sample/2");
    }

    #[tokio::test]
    async fn unsupported_comparison_mode_is_an_error() {
        let (judge, calls) = judge_with(vec![ac("ok\n")]);
        let tcs = testcases(1);
        let mut p = problem();
        p.comparison = ComparisonMode::Float;

        let err = judge.judge(&p, &tcs, Path::new("main.py")).await.unwrap_err();
        assert_eq!(err.to_string(), "unsupported comparison mode: float");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_trailing_newline_fails_only_under_strict() {
        let tcs = testcases(1);

        let (judge, _) = judge_with(vec![ac("ok")]);
        let res = judge
            .judge(&problem(), &tcs, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(res.verdict, Verdict::Accepted);

        let (judge, _) = judge_with(vec![ac("ok")]);
        let mut p = problem();
        p.comparison = ComparisonMode::Strict;
        let res = judge.judge(&p, &tcs, Path::new("main.py")).await.unwrap();
        assert_eq!(res.verdict, Verdict::WrongAnswer);
    }

    #[tokio::test]
    async fn judge_with_subprocess_backend_end_to_end() {
        use crate::runner::ProcessRunner;

        let lang = LanguageConfig {
            name: "python".to_owned(),
            pattern: GlobPattern::parse("*.py").unwrap(),
            image: "judge-python".to_owned(),
            run: "python3 -c 'print(int(input()) * 2)'".to_owned(),
        };
        let judge = Judge::new(Box::new(ProcessRunner::new(vec![lang.clone()])), vec![lang]);

        let tcs = vec![
            TestCase {
                name: "sample/1".to_owned(),
                input: b"21\n".to_vec(),
                expected: b"42\n".to_vec(),
            },
            TestCase {
                name: "sample/2".to_owned(),
                input: b"5\n".to_vec(),
                expected: b"11\n".to_vec(),
            },
        ];
        let res = judge
            .judge(&problem(), &tcs, Path::new("main.py"))
            .await
            .unwrap();
        assert_eq!(res.verdict, Verdict::WrongAnswer);
        assert_eq!((res.passed, res.total), (1, 2));
        assert_eq!(res.cases[1].comparison.actual, "10\n");
        judge.close().await.unwrap();
    }
}
