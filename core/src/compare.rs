use serde::{Deserialize, Serialize};

/// How a problem wants its output compared.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ComparisonMode {
    #[default]
    Default,
    Strict,
    Float,
    Unordered,
    Custom,
}

/// Outcome of comparing expected output against actual output.
///
/// `diff_line` is 1-indexed and 0 when the outputs match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub is_match: bool,
    pub expected: String,
    pub actual: String,
    pub diff_line: usize,
    pub diff_expected: String,
    pub diff_actual: String,
}

pub trait Comparator {
    fn compare(&self, expected: &str, actual: &str) -> Comparison;

    fn name(&self) -> &'static str;
}

/// Selects the comparator for a comparison mode.
/// Returns `None` for modes without a built-in comparator.
pub fn for_mode(mode: ComparisonMode) -> Option<Box<dyn Comparator>> {
    use ComparisonMode::*;
    match mode {
        Default => Some(Box::new(DefaultComparator)),
        Strict => Some(Box::new(StrictComparator)),
        Float | Unordered | Custom => None,
    }
}

/// Whitespace-tolerant comparison:
/// - normalizes line endings (CRLF/CR -> LF)
/// - trims leading/trailing whitespace of each line
/// - ignores trailing blank lines
///
/// Whitespace inside a line stays significant.
#[derive(Debug, Clone, Copy)]
pub struct DefaultComparator;

impl Comparator for DefaultComparator {
    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        let exp_lines = normalize_lines(expected);
        let act_lines = normalize_lines(actual);

        let max_lines = exp_lines.len().max(act_lines.len());
        for i in 0..max_lines {
            // Absent lines compare as empty
            let exp = exp_lines.get(i).map_or("", String::as_str);
            let act = act_lines.get(i).map_or("", String::as_str);

            if exp != act {
                return Comparison {
                    is_match: false,
                    expected: exp_lines.join("\n"),
                    actual: act_lines.join("\n"),
                    diff_line: i + 1,
                    diff_expected: exp.to_owned(),
                    diff_actual: act.to_owned(),
                };
            }
        }

        Comparison {
            is_match: true,
            expected: exp_lines.join("\n"),
            actual: act_lines.join("\n"),
            ..Comparison::default()
        }
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

fn normalize_lines(s: &str) -> Vec<String> {
    let s = s.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = s.split('\n').map(|line| line.trim().to_owned()).collect();

    while lines.last().map_or(false, |line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Exact whole-string comparison.
/// The line-based diff location is computed only for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct StrictComparator;

impl Comparator for StrictComparator {
    fn compare(&self, expected: &str, actual: &str) -> Comparison {
        if expected == actual {
            return Comparison {
                is_match: true,
                expected: expected.to_owned(),
                actual: actual.to_owned(),
                ..Comparison::default()
            };
        }

        let exp_lines: Vec<&str> = expected.split('\n').collect();
        let act_lines: Vec<&str> = actual.split('\n').collect();

        let max_lines = exp_lines.len().max(act_lines.len());
        for i in 0..max_lines {
            let exp = exp_lines.get(i).copied().unwrap_or("");
            let act = act_lines.get(i).copied().unwrap_or("");

            if exp != act {
                return Comparison {
                    is_match: false,
                    expected: expected.to_owned(),
                    actual: actual.to_owned(),
                    diff_line: i + 1,
                    diff_expected: exp.to_owned(),
                    diff_actual: act.to_owned(),
                };
            }
        }

        Comparison {
            is_match: false,
            expected: expected.to_owned(),
            actual: actual.to_owned(),
            ..Comparison::default()
        }
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}
