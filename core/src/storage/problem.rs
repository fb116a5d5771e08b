use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::ComparisonMode;

/// Problem manifest, stored as `problem.toml` in each problem directory.
///
/// Everything except the limits is display metadata; `time_limit_ms` and
/// `memory_limit_mb` feed straight into the execution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Problem {
    /// Falls back to the directory name when omitted.
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub description: String,
    pub input_format: String,
    pub output_format: String,
    pub constraints: Vec<String>,
    /// Zero means "use the default".
    pub time_limit_ms: u64,
    /// Zero means "use the default".
    pub memory_limit_mb: i64,
    pub comparison: ComparisonMode,
    pub float_tolerance: f64,
    /// Identifier of a custom comparator script, for `comparison = "custom"`.
    pub comparator: String,
    pub examples: Vec<Example>,
}

impl Problem {
    pub const DEFAULT_TIME_LIMIT_MS: u64 = 1000;
    pub const DEFAULT_MEMORY_LIMIT_MB: i64 = 256;

    /// Replaces zero limits with the standard ones.
    pub fn apply_defaults(&mut self) {
        if self.time_limit_ms == 0 {
            self.time_limit_ms = Self::DEFAULT_TIME_LIMIT_MS;
        }
        if self.memory_limit_mb == 0 {
            self.memory_limit_mb = Self::DEFAULT_MEMORY_LIMIT_MB;
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn memory_limit_bytes(&self) -> i64 {
        self.memory_limit_mb * 1024 * 1024
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

/// Sample I/O pair shown in the problem description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Example {
    pub input: String,
    pub output: String,
    pub explanation: String,
}

/// One test case, read from `tests/<group>/<stem>.{in,out}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// e.g. "sample/1" or "hidden/edge_case"
    pub name: String,
    pub input: Vec<u8>,
    pub expected: Vec<u8>,
}

impl TestCase {
    pub fn expected_lossy(&self) -> String {
        String::from_utf8_lossy(&self.expected).into_owned()
    }
}
