use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use serdable::GlobPattern;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub judge: JudgeConfig,
    pub language: Vec<LanguageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JudgeConfig {
    pub problems_dir: PathBuf,
    pub backend: Backend,
    pub shell: PathBuf,
    pub include: GlobPattern,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    #[default]
    Docker,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    /// Filename pattern mapping a program file to this language.
    pub pattern: GlobPattern,
    /// Sandbox image used by the docker backend.
    pub image: String,
    /// Command template; `#{program}` expands to the program path.
    ///
    /// The docker backend executes it as plain argv (whitespace split, no
    /// shell, no quoting); the process backend passes it to `shell -c`.
    pub run: String,
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "judge.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).unwrap();
        std::str::from_utf8(file.data.as_ref()).unwrap().to_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file in ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| format!("Not in a judge dir: Cannot find '{}'", Self::FILENAME))
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    /// Loads the nearest config file, falling back to the built-in default
    /// when no ancestor dir carries one.
    pub fn load_or_default(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        match Self::find_file_in_ancestors(cur_dir) {
            Ok(path) => Self::from_toml_file(path),
            Err(_) => Self::from_toml(&Self::example_toml()).context("Invalid built-in config"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn example_toml_should_be_parsable() {
        let toml = Config::example_toml();
        let cfg = dbg!(Config::from_toml(&toml)).unwrap();

        let Config {
            source_config_file,
            judge,
            language,
        } = cfg;

        assert_eq!(source_config_file, None);
        assert_eq!(judge.problems_dir, Path::new("./problems"));
        assert_eq!(judge.backend, Backend::Docker);
        assert_eq!(judge.shell, Path::new("/bin/sh"));
        assert_eq!(judge.include, GlobPattern::parse("[mM]ain.*").unwrap());

        assert_eq!(language.len(), 1);
        assert_eq!(
            language[0],
            LanguageConfig {
                name: "python".to_owned(),
                pattern: GlobPattern::parse("*.py").unwrap(),
                image: "sandbox-judge-python:latest".to_owned(),
                run: "python3 #{program}".to_owned(),
            }
        );
    }

    #[test]
    fn find_config_in_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fsutil::write(root.join(Config::FILENAME), Config::example_toml()).unwrap();
        fsutil::mkdir_all(root.join("problems/two-sum")).unwrap();

        let found = Config::find_file_in_ancestors(root.join("problems/two-sum")).unwrap();
        assert_eq!(found, root.join(Config::FILENAME));

        let cfg = Config::from_toml_file(found.clone()).unwrap();
        assert_eq!(cfg.source_config_file, Some(found));
    }

    #[test]
    fn find_config_fails_outside_a_judge_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::find_file_in_ancestors(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Not in a judge dir"));
    }

    #[test]
    fn load_or_default_falls_back_to_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(tmp.path()).unwrap();
        assert_eq!(cfg.source_config_file, None);
        assert_eq!(cfg.judge.backend, Backend::Docker);
    }
}
