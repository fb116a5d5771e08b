use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};

use super::problem::{Problem, TestCase};

/// Read access to a directory of problems.
///
/// Layout per problem:
///
/// ```text
/// <problems_dir>/<id>/problem.toml
/// <problems_dir>/<id>/tests/sample/<stem>.{in,out}
/// <problems_dir>/<id>/tests/hidden/<stem>.{in,out}
/// ```
#[derive(Debug, Clone)]
pub struct ProblemStore {
    problems_dir: PathBuf,
}

impl ProblemStore {
    pub const MANIFEST_FILENAME: &str = "problem.toml";
    pub const TESTS_DIRNAME: &str = "tests";
    pub const TEST_GROUPS: [&str; 2] = ["sample", "hidden"];

    pub fn new(problems_dir: impl Into<PathBuf>) -> Self {
        Self {
            problems_dir: problems_dir.into(),
        }
    }

    pub fn problems_dir(&self) -> &Path {
        &self.problems_dir
    }

    pub fn problem_dir(&self, id: &str) -> PathBuf {
        self.problems_dir.join(id)
    }

    pub fn load(&self, id: &str) -> anyhow::Result<Problem> {
        let dir = self.problem_dir(id);
        if !dir.is_dir() {
            bail!("problem not found: {}", id);
        }
        let manifest_path = dir.join(Self::MANIFEST_FILENAME);
        let toml = fsutil::read_to_string(&manifest_path)?;
        let mut problem: Problem = toml::from_str(&toml)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;
        problem.apply_defaults();
        if problem.id.is_empty() {
            problem.id = id.to_owned();
        }
        Ok(problem)
    }

    /// Loads every test case of a problem, sample group first, each group
    /// sorted by filename.
    pub fn load_testcases(&self, id: &str) -> anyhow::Result<Vec<TestCase>> {
        let tests_dir = self.problem_dir(id).join(Self::TESTS_DIRNAME);

        let mut testcases = Vec::new();
        for group in Self::TEST_GROUPS {
            testcases.extend(load_test_group(&tests_dir.join(group), group)?);
        }
        if testcases.is_empty() {
            bail!("no test cases found for problem: {}", id);
        }
        Ok(testcases)
    }

    /// IDs of every directory carrying a manifest, sorted.
    pub fn list_ids(&self) -> anyhow::Result<Vec<String>> {
        if !self.problems_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fsutil::read_dir(&self.problems_dir)?.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() && path.join(Self::MANIFEST_FILENAME).is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Loads every listed problem, skipping (with a warning) the ones whose
    /// manifest fails to parse.
    pub fn load_all(&self) -> anyhow::Result<Vec<Problem>> {
        let mut problems = Vec::new();
        for id in self.list_ids()? {
            match self.load(&id) {
                Ok(p) => problems.push(p),
                Err(e) => log::warn!("Failed to load problem {}: {:#}", id, e),
            }
        }
        Ok(problems)
    }
}

fn load_test_group(dir: &Path, group: &str) -> anyhow::Result<Vec<TestCase>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut stems: Vec<String> = Vec::new();
    for entry in fsutil::read_dir(dir)?.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_file() && path.extension() == Some(OsStr::new("in")) {
            if let Some(stem) = path.file_stem() {
                stems.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    stems.sort();

    let mut testcases = Vec::with_capacity(stems.len());
    for stem in &stems {
        let input = fsutil::read(dir.join(format!("{}.in", stem)))?;
        let expected = fsutil::read(dir.join(format!("{}.out", stem)))?;
        testcases.push(TestCase {
            name: format!("{}/{}", group, stem),
            input,
            expected,
        });
    }
    Ok(testcases)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compare::ComparisonMode;

    fn fixture_store(root: &Path) -> ProblemStore {
        let dir = root.join("problems");
        let manifest = r#"
title = "Two Sum"
difficulty = "easy"
tags = ["array"]
time_limit_ms = 2000
"#;
        fsutil::write_with_mkdir(dir.join("two-sum/problem.toml"), manifest).unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/sample/1.in"), "4 9\n2 7 11 15\n")
            .unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/sample/1.out"), "0 1\n").unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/sample/2.in"), "2 6\n3 3\n").unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/sample/2.out"), "0 1\n").unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/hidden/big.in"), "big input\n").unwrap();
        fsutil::write_with_mkdir(dir.join("two-sum/tests/hidden/big.out"), "big output\n")
            .unwrap();
        ProblemStore::new(dir)
    }

    #[test]
    fn load_fills_id_from_dirname_and_applies_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());

        let p = store.load("two-sum").unwrap();
        assert_eq!(p.id, "two-sum");
        assert_eq!(p.title, "Two Sum");
        assert_eq!(p.time_limit_ms, 2000);
        assert_eq!(p.memory_limit_mb, 256);
        assert_eq!(p.comparison, ComparisonMode::Default);
    }

    #[test]
    fn load_unknown_problem_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());

        let err = store.load("three-sum").unwrap_err();
        assert!(err.to_string().contains("problem not found: three-sum"));
    }

    #[test]
    fn testcases_are_grouped_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());

        let tcs = store.load_testcases("two-sum").unwrap();
        let names: Vec<&str> = tcs.iter().map(|tc| tc.name.as_str()).collect();
        assert_eq!(names, ["sample/1", "sample/2", "hidden/big"]);
        assert_eq!(tcs[0].input, b"4 9\n2 7 11 15\n");
        assert_eq!(tcs[0].expected, b"0 1\n");
    }

    #[test]
    fn testcase_without_expected_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());
        fsutil::write(
            store.problem_dir("two-sum").join("tests/sample/3.in"),
            "1 2\n",
        )
        .unwrap();

        let err = store.load_testcases("two-sum").unwrap_err();
        assert!(dbg!(err.to_string()).contains("3.out"));
    }

    #[test]
    fn problem_without_testcases_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());
        fsutil::write_with_mkdir(
            store.problems_dir().join("empty-problem/problem.toml"),
            r#"title = "Empty""#,
        )
        .unwrap();

        let err = store.load_testcases("empty-problem").unwrap_err();
        assert!(err
            .to_string()
            .contains("no test cases found for problem: empty-problem"));
    }

    #[test]
    fn list_ids_skips_entries_without_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());
        fsutil::mkdir_all(store.problems_dir().join("not-a-problem")).unwrap();
        fsutil::write(store.problems_dir().join("stray.txt"), "x").unwrap();

        assert_eq!(store.list_ids().unwrap(), ["two-sum"]);
    }

    #[test]
    fn list_ids_of_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProblemStore::new(tmp.path().join("nope"));
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn load_all_skips_broken_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        let store = fixture_store(tmp.path());
        fsutil::write_with_mkdir(
            store.problems_dir().join("broken/problem.toml"),
            "title = [not toml",
        )
        .unwrap();

        let problems = store.load_all().unwrap();
        let ids: Vec<&str> = problems.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["two-sum"]);
    }
}
