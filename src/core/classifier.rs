//! # Result Classifier Module / 结果分类模块
//!
//! Decides pass/fail for a finished run. Normal tests use an exact byte
//! comparison. Error tests (a step with `allowError` exited non-zero) use a
//! lenient comparison of the error message:
//!
//! - when the produced text names a known runtime error, the expected text must
//!   name the same error, and line numbers must agree when both sides give one;
//! - otherwise both sides must carry an `...Error` token and a `Line N` token,
//!   and the line numbers must be equal.
//!
//! 判定运行结果是否通过。普通测试使用精确字节比较；
//! 错误测试使用宽松的错误消息比较。

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

/// Runtime errors recognised by default.
pub const DEFAULT_RUNTIME_ERRORS: [&str; 4] = ["SizeError", "IndexError", "MathError", "StrideError"];

static ERROR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\w+Error").expect("valid regex"));
static LINE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)line\s+(\d+)").expect("valid regex"));

/// Outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Carries a human-readable explanation of the difference.
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn diff(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(diff) => Some(diff),
        }
    }
}

/// The closed set of runtime-error names that switch lenient comparison into
/// name-matching mode.
/// 将宽松比较切换到名称匹配模式的运行时错误名称集合。
#[derive(Debug, Clone)]
pub struct ErrorVocabulary {
    names: Vec<String>,
}

impl Default for ErrorVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_ERRORS)
    }
}

impl ErrorVocabulary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).filter(|n: &String| !n.is_empty()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The vocabulary member that occurs earliest in `text`, if any.
    pub fn find_in(&self, text: &str) -> Option<&str> {
        self.names
            .iter()
            .filter_map(|name| text.find(name.as_str()).map(|pos| (pos, name.as_str())))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, name)| name)
    }
}

/// Byte-for-byte comparison. No normalisation of any kind.
pub fn exact(produced: &[u8], expected: &[u8]) -> Verdict {
    if produced == expected {
        Verdict::Pass
    } else {
        Verdict::Fail(diff_bytes(produced, expected))
    }
}

/// Lenient comparison of an error message against the expected error.
pub fn lenient(produced: &[u8], expected: &[u8], vocabulary: &ErrorVocabulary) -> Verdict {
    if produced.is_empty() || expected.is_empty() {
        return Verdict::Fail("test failed to generate error bytes to compare".to_string());
    }
    let (Ok(produced_str), Ok(expected_str)) =
        (std::str::from_utf8(produced), std::str::from_utf8(expected))
    else {
        return Verdict::Fail("failed to decode error bytes as UTF-8".to_string());
    };
    let (produced_str, expected_str) = (produced_str.trim(), expected_str.trim());

    match vocabulary.find_in(produced_str) {
        Some(name) => compare_runtime_error(name, produced_str, expected_str),
        None => compare_compile_time_error(produced_str, expected_str),
    }
}

fn compare_runtime_error(name: &str, produced: &str, expected: &str) -> Verdict {
    if !expected.contains(name) {
        return Verdict::Fail(format!(
            "produced runtime error {name} but expected {expected:?}"
        ));
    }

    let pattern = format!(r"{}(?i:\s+on\s+line\s+(\d+))?(?::.*)?", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return Verdict::Fail(format!("invalid runtime error name {name:?}"));
    };
    let line_of = |text: &str| -> Option<u64> {
        re.captures(text)?.get(1)?.as_str().parse().ok()
    };

    match (line_of(produced), line_of(expected)) {
        (Some(p), Some(e)) if p != e => Verdict::Fail(format!(
            "{name} raised on line {p} but expected on line {e}"
        )),
        _ => Verdict::Pass,
    }
}

fn compare_compile_time_error(produced: &str, expected: &str) -> Verdict {
    let extract = |text: &str| -> Option<(String, u64)> {
        let name = ERROR_NAME.find(text)?.as_str().to_string();
        let line = LINE_NUMBER.captures(text)?.get(1)?.as_str().parse().ok()?;
        Some((name, line))
    };

    match (extract(produced), extract(expected)) {
        (Some((_, p)), Some((_, e))) if p == e => Verdict::Pass,
        (Some((p_name, p)), Some((e_name, e))) => Verdict::Fail(format!(
            "{p_name} reported on line {p} but expected {e_name} on line {e}"
        )),
        (None, _) => Verdict::Fail(format!(
            "could not find an error name and line number in produced output {produced:?}"
        )),
        (_, None) => Verdict::Fail(format!(
            "could not find an error name and line number in expected output {expected:?}"
        )),
    }
}

/// Describes the first difference between two byte strings.
pub fn diff_bytes(produced: &[u8], expected: &[u8]) -> String {
    let first_difference = produced
        .iter()
        .zip(expected)
        .position(|(p, e)| p != e)
        .unwrap_or_else(|| produced.len().min(expected.len()));

    let mut diff = String::new();
    let _ = write!(
        diff,
        "outputs differ at byte {first_difference} (produced {} bytes, expected {} bytes)",
        produced.len(),
        expected.len()
    );
    let _ = write!(
        diff,
        "\n  produced: \"{}\"\n  expected: \"{}\"",
        context_window(produced, first_difference),
        context_window(expected, first_difference)
    );
    diff
}

/// Escaped bytes around `at`, at most 16 before and 32 after.
fn context_window(data: &[u8], at: usize) -> String {
    let start = at.saturating_sub(16).min(data.len());
    let end = (at + 32).min(data.len());
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(data[start..end].escape_ascii().map(char::from));
    if end < data.len() {
        out.push_str("...");
    }
    out
}
