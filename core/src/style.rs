use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::judge::CaseResult;
use crate::runner::Verdict;

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    match v.as_str() {
        "truecolor" | "24bit" => true,
        _ => false,
    }
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for Verdict {
    fn color(&self) -> Color {
        use Verdict::*;
        if !self::is_truecolor_supported() {
            return match self {
                Accepted => Color::Green,
                WrongAnswer => Color::Yellow,
                TimeLimitExceeded => Color::Red,
                MemoryLimitExceeded => Color::BrightRed,
                RuntimeError => Color::Magenta,
                CompilationError => Color::Blue,
                SystemError => Color::BrightBlack,
            };
        }

        match self {
            Accepted => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            WrongAnswer => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            TimeLimitExceeded => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            MemoryLimitExceeded => Color::TrueColor {
                r: 230,
                g: 90,
                b: 20,
            },
            RuntimeError => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
            CompilationError => Color::TrueColor {
                r: 80,
                g: 100,
                b: 220,
            },
            SystemError => Color::TrueColor {
                r: 130,
                g: 130,
                b: 130,
            },
        }
    }
}

pub fn verdict_icon(verdict: Verdict) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", verdict)
        .on_color(verdict.color())
        .bold()
        .color(fg)
}

fn print_sub_title(s: &str, cols: usize) {
    const THIN_LINE: &str = "─";
    println!(
        "{}{}",
        s.cyan().bold(),
        // The terminal may be narrower than the label.
        THIN_LINE
            .repeat(cols.saturating_sub(s.len() + 1))
            .bright_black(),
    )
}

/// Full per-case block with expected/actual/stderr sections, shown in
/// verbose mode for non-accepted cases.
pub fn print_case_result_detail(res: &CaseResult) {
    let expected_lines: Vec<_> = res.comparison.expected.lines().collect();
    let actual_lines: Vec<_> = res.comparison.actual.lines().collect();

    let (cols, _) = terminal::size().unwrap_or((40, 40));

    const BOLD_LINE: &str = "━";

    let bold_bar = BOLD_LINE.repeat(cols as usize).blue().bold();

    let title_color = Color::BrightYellow;
    println!(
        "\n{}: {} [{}ms]\n{}",
        res.testcase.name.color(title_color).bold(),
        self::verdict_icon(res.verdict),
        res.duration.as_millis(),
        bold_bar,
    );

    fn print_lines(lines: &[&str], entire_str: &str) {
        if lines.is_empty() {
            println!("{}", "<EMPTY>".magenta().dimmed());
            return;
        }
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_end();
            print!("{}", trimmed);

            let num_trailing_whitespace = line.len() - trimmed.len();
            if num_trailing_whitespace > 0 {
                print!(
                    "{}{}",
                    " ".repeat(num_trailing_whitespace).on_red(),
                    "(Trailing whitespace)".bright_red().bold()
                );
            }

            let is_last_line = i + 1 == lines.len();
            if is_last_line && !entire_str.ends_with('\n') {
                print!("{}", " Missing new line ".on_yellow().black().bold());
            }

            println!();
        }
    }

    print_sub_title("[expected]", cols as usize);
    print_lines(&expected_lines, &res.comparison.expected);

    print_sub_title("[stdout]", cols as usize);
    print_lines(&actual_lines, &res.comparison.actual);

    if !res.stderr.is_empty() {
        print_sub_title("[stderr]", cols as usize);
        print!("{}", res.stderr);
        if !res.stderr.ends_with('\n') {
            println!();
        }
    }

    if let Some(detail) = &res.detail {
        println!("{}", detail.bright_red());
    }

    println!("{}", bold_bar);
}
