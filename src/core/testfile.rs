//! # Test File Module / 测试文件模块
//!
//! A test case is a source file whose expected output and input stream are given
//! by directives written inside comments:
//!
//! ```text
//! // INPUT:5
//! // CHECK:25
//! // CHECK_FILE:expected/square.out
//! ```
//!
//! A directive counts only on a line where the comment marker appears at or
//! before it. Repeated inline directives are joined with `\n`. Building a
//! `TestFile` never fails; extraction problems are kept and reported by
//! [`TestFile::verify`].
//!
//! 测试用例是一个源文件，其期望输出和输入流由注释中的指令给出。
//! 构建 `TestFile` 永远不会失败；提取问题会被保存并由 `verify` 报告。

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::TestFileError;

pub const CHECK: &str = "CHECK:";
pub const CHECK_FILE: &str = "CHECK_FILE:";
pub const INPUT: &str = "INPUT:";
pub const INPUT_FILE: &str = "INPUT_FILE:";

/// Default comment marker (C99 style).
pub const DEFAULT_COMMENT_SYNTAX: &str = "//";

/// A single test case with its extracted expected output and input stream.
/// 单个测试用例，包含提取出的期望输出和输入流。
#[derive(Debug, Clone)]
pub struct TestFile {
    /// Path of the test source file.
    pub path: PathBuf,
    /// File name including extension, used for display and sorting.
    pub file: String,
    /// File name without extension.
    pub stem: String,
    expected_out: Result<Vec<u8>, TestFileError>,
    input_stream: Result<Vec<u8>, TestFileError>,
}

impl TestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_comment_syntax(path, DEFAULT_COMMENT_SYNTAX)
    }

    pub fn with_comment_syntax(path: impl Into<PathBuf>, comment_syntax: &str) -> Self {
        let path = path.into();
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (expected_out, input_stream) = match read_source(&path) {
            Ok(source) => (
                extract_content(&path, &source, comment_syntax, CHECK, CHECK_FILE),
                extract_content(&path, &source, comment_syntax, INPUT, INPUT_FILE),
            ),
            Err(e) => (Err(e.clone()), Err(e)),
        };

        Self {
            path,
            file,
            stem,
            expected_out,
            input_stream,
        }
    }

    /// Expected output bytes; empty when extraction failed.
    pub fn expected_output(&self) -> &[u8] {
        self.expected_out.as_deref().unwrap_or_default()
    }

    /// Input stream bytes; empty when extraction failed.
    pub fn input_stream(&self) -> &[u8] {
        self.input_stream.as_deref().unwrap_or_default()
    }

    /// Returns every extraction problem recorded while building this test.
    /// A file that could not be read at all is reported once.
    pub fn verify(&self) -> Vec<TestFileError> {
        let mut errors = Vec::new();
        if let Err(e) = &self.expected_out {
            errors.push(e.clone());
        }
        if let Err(e) = &self.input_stream {
            if !errors.contains(e) {
                errors.push(e.clone());
            }
        }
        errors
    }
}

fn read_source(path: &Path) -> Result<String, TestFileError> {
    let bytes = fs::read(path).map_err(|e| TestFileError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|_| TestFileError::NotUtf8(path.to_path_buf()))
}

/// Resolves one kind of content (expected output or input stream) from either
/// its inline directive or its file directive. Supplying both is an error.
fn extract_content(
    test_path: &Path,
    source: &str,
    comment_syntax: &str,
    inline_directive: &'static str,
    file_directive: &'static str,
) -> Result<Vec<u8>, TestFileError> {
    let inline = directive_contents(source, comment_syntax, inline_directive);
    let file_ref = directive_contents(source, comment_syntax, file_directive);

    match (inline.is_empty(), file_ref.is_empty()) {
        (false, false) => Err(TestFileError::DirectiveConflict {
            path: test_path.to_path_buf(),
            inline: inline_directive,
            file: file_directive,
        }),
        (false, true) => Ok(inline.into_bytes()),
        (true, false) => {
            let base = test_path.parent().unwrap_or_else(|| Path::new(""));
            let target = base.join(file_ref.trim());
            if !target.exists() {
                return Err(TestFileError::MissingReferencedFile {
                    directive: file_directive,
                    test: test_path.to_path_buf(),
                    target,
                });
            }
            fs::read(&target).map_err(|e| TestFileError::Unreadable {
                path: target,
                reason: e.to_string(),
            })
        }
        (true, true) => Ok(Vec::new()),
    }
}

/// Collects the right-hand side of every occurrence of `directive` that sits
/// inside a comment, joined with `\n`.
fn directive_contents(source: &str, comment_syntax: &str, directive: &str) -> String {
    let mut contents = String::new();
    let mut first_match = true;

    for line in source.split_inclusive('\n') {
        let (Some(comment_index), Some(directive_index)) =
            (line.find(comment_syntax), line.find(directive))
        else {
            continue;
        };
        if comment_index > directive_index {
            continue;
        }

        let rhs = &line[directive_index + directive.len()..];
        let rhs = rhs.strip_suffix('\n').unwrap_or(rhs);
        if !first_match {
            contents.push('\n');
        }
        contents.push_str(rhs);
        first_match = false;
    }

    contents
}
