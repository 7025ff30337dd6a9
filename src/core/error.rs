//! # Error Types Module / 错误类型模块
//!
//! Error taxonomy of the runner. Configuration and test-file problems are
//! collected before anything runs; `RunnerError` covers the few conditions that
//! abort a whole batch once it has started. Timeouts, spawn failures, failing
//! steps and verdict mismatches are not errors: they are recorded on the
//! `TestResult` itself.
//!
//! 运行器的错误分类。配置和测试文件问题在运行前收集；
//! `RunnerError` 仅覆盖会中止整个批次的情况。
//! 超时、进程启动失败、步骤失败和结果不匹配不是错误，而是记录在 `TestResult` 中。

use std::path::PathBuf;

/// A problem found while loading or verifying the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Config Error: cannot find test directory: {}", .0.display())]
    MissingTestDir(PathBuf),

    #[error("Config Error: cannot find binary file: {} in Executable: {id}", .path.display())]
    MissingBinary { id: String, path: PathBuf },

    #[error("Config Error: cannot find runtime file: {} in Executable: {id}", .path.display())]
    MissingRuntime { id: String, path: PathBuf },

    #[error("Config Error: toolchain '{0}' has no steps")]
    EmptyToolChain(String),

    #[error("Config Error: missing required field '{field}' in step {step:?} of toolchain '{toolchain}'")]
    MissingStepField {
        toolchain: String,
        step: String,
        field: &'static str,
    },

    #[error("Config Error: cannot find executablePath '{path}' in step '{step}' of toolchain '{toolchain}'")]
    MissingStepExecutable {
        toolchain: String,
        step: String,
        path: String,
    },

    #[error("Config Error: solution executable '{0}' is not a tested executable")]
    UnknownSolution(String),

    #[error("{0}")]
    TestFile(#[from] TestFileError),
}

/// A problem found while extracting directives from a test file.
/// 从测试文件中提取指令时发现的问题。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestFileError {
    #[error("Testfile Error: failed to read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Testfile Error: {} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),

    #[error("Testfile Error: directive conflict in {}: supplied both {inline} and {file}", .path.display())]
    DirectiveConflict {
        path: PathBuf,
        inline: &'static str,
        file: &'static str,
    },

    #[error("Testfile Error: failed to locate path supplied to {directive}\n\tTest: {}\n\tPath: {}", .test.display(), .target.display())]
    MissingReferencedFile {
        directive: &'static str,
        test: PathBuf,
        target: PathBuf,
    },
}

/// Conditions that abort a batch instead of failing a single test.
/// 中止整个批次（而不是单个测试失败）的情况。
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step exited successfully but never wrote the output file it declares.
    #[error("step '{step}' did not create its declared output file {}", .path.display())]
    MissingOutputFile { step: String, path: PathBuf },

    #[error("toolchain '{0}' has no steps")]
    EmptyToolChain(String),

    #[error("failed to create a temporary file for the output of step '{step}'")]
    TempFile {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create a scratch directory for test '{test}'")]
    ScratchDir {
        test: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
