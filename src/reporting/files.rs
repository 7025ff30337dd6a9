//! # File Reporting Module / 文件报告模块
//!
//! Writes the artifacts of tournament and performance runs: CSV tables,
//! per-defender feedback files, and the pass/fail logs of the solution executable.
//!
//! 写入锦标赛和性能运行的产物：CSV 表格、每个防守方的反馈文件，
//! 以及参考解可执行文件的通过/失败日志。

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::core::models::TestResult;
use crate::infra::fs::file_to_display_string;

/// Bytes of expected/generated output kept in a feedback entry.
const FEEDBACK_BYTES: usize = 512;

/// Quotes a CSV field when it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders rows as CSV with `\r\n` line endings.
pub fn to_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Writes `rows` to the CSV file at `path`, replacing any previous content.
pub fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    fs::write(path, to_csv(rows)).with_context(|| format!("Failed to write CSV file: {}", path.display()))
}

/// Turns columns into rows, padding short columns with empty fields.
pub fn transpose(columns: &[Vec<String>]) -> Vec<Vec<String>> {
    let height = columns.iter().map(Vec::len).max().unwrap_or(0);
    (0..height)
        .map(|row| {
            columns
                .iter()
                .map(|col| col.get(row).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Appends `line` plus a newline to `path`, creating the file if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    append(path, &format!("{line}\n"))
}

fn append(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for appending", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))
}

/// Keeps the first `max_bytes` of `data`, noting when something was cut.
fn trim_bytes(data: &[u8], max_bytes: usize) -> String {
    let mut text = String::from_utf8_lossy(&data[..data.len().min(max_bytes)]).into_owned();
    if data.len() > max_bytes {
        text.push_str(&format!("\n... (output trimmed to {max_bytes} bytes)"));
    }
    text
}

/// The feedback a defender receives for one failed test.
pub fn feedback_entry(result: &TestResult) -> String {
    let contents = file_to_display_string(result.test_path(), usize::MAX).unwrap_or_default();
    let expected = trim_bytes(result.test.expected_output(), FEEDBACK_BYTES);
    let generated = trim_bytes(result.gen_output.as_deref().unwrap_or_default(), FEEDBACK_BYTES);
    format!(
        "{}\nTest: {}\nTest Contents: {}\nExpected Output: {}\nGenerated Output: {}\n",
        "=".repeat(40),
        result.test_name(),
        contents.trim(),
        expected.trim(),
        generated.trim(),
    )
}

/// Appends feedback for `result` to `path`. Passing results are ignored.
pub fn append_feedback(path: &Path, result: &TestResult) -> Result<()> {
    if result.did_pass() {
        return Ok(());
    }
    append(path, &feedback_entry(result))
}
