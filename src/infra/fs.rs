//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations, such as creating
//! per-run scratch directories and the temporary files that carry one step's
//! stdout into the next step.
//!
//! 此模块提供文件系统操作的实用功能，
//! 例如创建每次运行的临时目录，以及将一个步骤的 stdout 传递给下一个步骤的临时文件。

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};

const TEMP_PREFIX: &str = "toolchain_runner_";

/// Creates a unique, temporary working directory for one test run.
///
/// Concurrent runs of the same toolchain each get their own directory, so
/// declared output files never collide. The directory is deleted when the
/// returned guard is dropped.
///
/// # Arguments
/// * `case_name` - Name of the test, used to make the directory recognisable
pub fn create_run_dir(case_name: &str) -> std::io::Result<TempDir> {
    let sanitized_name = case_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();

    tempfile::Builder::new()
        .prefix(&format!("{TEMP_PREFIX}{sanitized_name}_"))
        .tempdir()
}

/// Writes `content` to a uniquely named temporary file and closes it.
///
/// The file is left executable by its owner (a step may emit a program on
/// stdout that the next step runs) and is removed when the `TempPath` is dropped.
pub fn write_bridge_file(content: &[u8]) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile()?;
    file.write_all(content)?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o700))?;
    }

    // Closing the handle lets the next step exec the file without ETXTBSY.
    Ok(file.into_temp_path())
}

/// Resolves `relative` against the directory of `anchor` (or `anchor` itself
/// when it is a directory). Absolute paths are returned unchanged.
pub fn resolve_relative(relative: &str, anchor: &Path) -> PathBuf {
    let base = if anchor.is_file() {
        anchor.parent().unwrap_or_else(|| Path::new(""))
    } else {
        anchor
    };
    base.join(relative)
}

/// Reads a file for display, keeping at most `max_bytes` (the middle is elided).
pub fn file_to_display_string(path: &Path, max_bytes: usize) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    Some(String::from_utf8_lossy(&truncated_bytes(&bytes, max_bytes)).into_owned())
}

/// Returns `data` unchanged when it fits in `max_bytes`; otherwise keeps the
/// head and tail and replaces the middle with an omission marker.
pub fn truncated_bytes(data: &[u8], max_bytes: usize) -> Vec<u8> {
    const OMISSION: &[u8] = b"\n{{ omitted for brevity }}\n";
    if data.len() <= max_bytes {
        return data.to_vec();
    }
    let half = max_bytes.saturating_sub(OMISSION.len()) / 2;
    let mut truncated = Vec::with_capacity(half * 2 + OMISSION.len());
    truncated.extend_from_slice(&data[..half]);
    truncated.extend_from_slice(OMISSION);
    truncated.extend_from_slice(&data[data.len() - half..]);
    truncated
}
