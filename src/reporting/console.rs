//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints test results to the console as they are collected: one
//! colored status line per test, optional detail (test contents, expected and
//! generated output, command history) gated by verbosity, and the pass counts
//! and summaries printed at package, toolchain and executable boundaries.
//!
//! 此模块在收集测试结果时将其打印到控制台：每个测试一行彩色状态，
//! 可选的详细信息（测试内容、期望与生成的输出、命令历史）由详细级别控制，
//! 以及在包、工具链和可执行文件边界打印的通过计数和摘要。

use colored::*;
use std::fmt::Display;
use std::path::Path;

use crate::core::config::RunnerConfig;
use crate::core::models::{CommandResult, Outcome, TestResult};
use crate::infra::fs::{file_to_display_string, truncated_bytes};

/// Bytes of stdout/stderr kept when a command history is printed.
const HISTORY_BYTES: usize = 512;

/// Widest border drawn around test contents.
const MAX_BOX_WIDTH: usize = 100;

/// How much detail to print for each result.
/// 每个结果打印的详细程度。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    /// `-v` count. Failures show outputs from 1 and command history from 2;
    /// passes need one level more for each.
    pub verbosity: u8,
    pub show_time: bool,
    pub show_testcase: bool,
}

/// Prints `message` indented by `indent` spaces.
pub fn log(indent: usize, message: impl Display) {
    println!("{:indent$}{message}", "");
}

/// Prints every line of `text` indented by `indent` spaces.
pub fn log_multiline(indent: usize, text: &str) {
    for line in text.lines() {
        log(indent, line);
    }
}

/// Prints the status line of one result and whatever detail the options ask for.
///
/// # Output Format / 输出格式
/// ```text
///     [PASS] 001_hello.in                                        0.0132 (s)
///     [E-FAIL] 002_bad_index.in
///     [TIMEOUT] 003_loop.in
/// ```
pub fn print_result(result: &TestResult, options: &DisplayOptions) {
    let name = format!("{:<50}", result.test_name());
    match result.outcome {
        Outcome::TimedOut => log(4, format!("{}{}", "[TIMEOUT] ".yellow(), name.trim_end())),
        Outcome::Passed => {
            let label = if result.error_test { "[E-PASS] " } else { "[PASS] " };
            let time = match result.time {
                Some(t) if options.show_time => format!("{:>10} (s)", format!("{:.4}", t.as_secs_f64())),
                _ => String::new(),
            };
            log(4, format!("{}{name}{time}", label.green()));
        }
        Outcome::Failed(_) => {
            let label = if result.error_test { "[E-FAIL] " } else { "[FAIL] " };
            log(4, format!("{}{name}", label.red()));
        }
    }

    let passed = result.did_pass();
    if options.show_testcase && options.verbosity >= u8::from(passed) {
        log_multiline(6, &boxed_contents(result.test_path()));
    }

    let history_level = if passed { 3 } else { 2 };
    if options.verbosity >= history_level {
        log(6, "==> Command History");
        for command in &result.command_history {
            print_command(command, 8);
        }
    }

    if options.verbosity >= history_level - 1 {
        let expected = result.test.expected_output();
        let generated = result.gen_output.as_deref().unwrap_or_default();
        log(6, format!("==> Expected Out ({} bytes):", expected.len()));
        log_multiline(7, &String::from_utf8_lossy(expected));
        log(6, format!("==> Generated Out ({} bytes):", generated.len()));
        log_multiline(7, &String::from_utf8_lossy(generated));
        if let Some(diff) = &result.diff {
            log(6, "==> Difference:");
            log_multiline(7, diff);
        }
    }
}

/// Prints one executed command with truncated stdout and stderr.
pub fn print_command(command: &CommandResult, indent: usize) {
    log(
        indent,
        format!("==> {} (exit {})", command.command_line(), command.exit_status),
    );
    if let Some(reason) = &command.spawn_error {
        log(indent + 2, format!("could not start: {reason}").red());
    }
    for (label, data) in [("stdout", &command.stdout), ("stderr", &command.stderr)] {
        log(indent + 2, format!("{label} ({} bytes):", data.len()));
        log_multiline(
            indent + 4,
            &String::from_utf8_lossy(&truncated_bytes(data, HISTORY_BYTES)),
        );
    }
}

/// The contents of a test file inside a box border.
///
/// ```text
/// ┌──────────────┐
/// │ int main() { │
/// └──────────────┘
/// ```
pub fn boxed_contents(path: &Path) -> String {
    let Some(content) = file_to_display_string(path, usize::MAX) else {
        return format!("Error reading file {}:", path.display());
    };

    let width = MAX_BOX_WIDTH;
    let inner = width - 4;
    let mut lines = Vec::new();
    lines.push(format!("┌{}┐", "─".repeat(width - 2)));
    for line in content.lines() {
        let shown: String = if line.chars().count() > inner {
            line.chars().take(inner - 3).chain("...".chars()).collect()
        } else {
            line.to_string()
        };
        lines.push(format!("│ {shown:<inner$} │"));
    }
    lines.push(format!("└{}┘", "─".repeat(width - 2)));
    lines.join("\n")
}

/// Prints a `label pass / total` counter line.
pub fn print_counts(indent: usize, label: &str, passed: usize, total: usize) {
    let counts = format!("{passed} / {total}");
    let counts = if passed == total { counts.green() } else { counts.red() };
    log(indent, format!("{label} {counts}"));
}

pub fn print_failure_summary(failures: &[TestResult]) {
    if failures.is_empty() {
        return;
    }
    log(0, format!("Failure Summary: ({} tests)", failures.len()).bold());
    for result in failures {
        print_result(result, &DisplayOptions::default());
    }
}

pub fn print_leak_summary(leaks: &[TestResult]) {
    log(0, format!("Leak Summary: ({} tests)", leaks.len()).bold());
    for result in leaks {
        log(4, format!("{}{}", "[LEAK] ".yellow(), result.test_name()));
    }
}

/// Prints the package tree that is about to run. Deeper levels need more `-v`.
pub fn print_test_info(config: &RunnerConfig, verbosity: u8) {
    if verbosity < 1 {
        return;
    }
    log(0, "\nPackages:");
    for package in &config.packages {
        log(0, format!("-- ({})", package.name));
        if verbosity < 2 {
            continue;
        }
        for subpackage in &package.subpackages {
            log(2, format!("-- ({})", subpackage.name));
            if verbosity < 3 {
                continue;
            }
            for test in &subpackage.tests {
                log(4, format!("-- ({})", test.file));
            }
        }
    }
}

/// Prints every configuration error together with the parsed configuration.
pub fn print_config_errors(config: &RunnerConfig) {
    log(0, format!("Found Config {} error(s):", config.errors.len()).red().bold());
    log(0, format!("Parsed {} below:", config.config_path.display()));
    let summary = serde_json::to_string_pretty(&config.to_summary()).unwrap_or_default();
    log_multiline(2, &summary);
    for error in &config.errors {
        log(0, error.to_string().red());
    }
}

/// Tournament progress: one colored dot per finished test.
pub fn print_dot(passed: bool) {
    use std::io::Write;
    let dot = if passed { ".".green() } else { ".".red() };
    print!("{dot}");
    let _ = std::io::stdout().flush();
}

/// Tournament progress: starts the line of one attacker/defender pairing.
pub fn print_matchup(attacker: &str, defender: &str) {
    print!("\n  {attacker:<12} --> {defender:<12}");
}
