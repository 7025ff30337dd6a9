//! # Data Models Module / 数据模型模块
//!
//! This module defines the run-scoped data produced by the toolchain runner:
//! one `CommandResult` per executed step and one `TestResult` per
//! (test, toolchain, executable) run. Both are created once and never mutated
//! after the run that produced them returns.
//!
//! 此模块定义工具链运行器产生的运行期数据：
//! 每个执行步骤一个 `CommandResult`，每次（测试、工具链、可执行文件）运行一个 `TestResult`。

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::testfile::TestFile;

/// Exit status reported for a step that exceeded its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 255;

/// Exit status reported when the OS could not start the command.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

/// Exit status a memory checker uses to flag a leak in an otherwise successful run.
pub const VALGRIND_EXIT_CODE: i32 = 111;

/// The captured outcome of executing one resolved command.
/// 执行一条已解析命令的捕获结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Program that was executed (the resolved first token).
    pub program: String,
    /// Remaining arguments.
    pub args: Vec<String>,
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Wall-clock time; exactly the timeout bound when `timed_out` is set.
    pub elapsed: Duration,
    pub timed_out: bool,
    /// Set when the process could not be started at all.
    pub spawn_error: Option<String>,
}

impl CommandResult {
    pub fn spawned(&self) -> bool {
        self.spawn_error.is_none()
    }

    /// Renders the command line the way a shell user would type it.
    pub fn command_line(&self) -> String {
        let parts = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(parts).unwrap_or_else(|_| {
            std::iter::once(self.program.clone())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

/// Why a run that did not time out was judged a failure.
/// 未超时的运行被判定为失败的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FailureReason {
    /// The OS could not start one of the steps.
    /// 操作系统无法启动某个步骤。
    SpawnFailed,
    /// A step without `allowError` exited non-zero.
    /// 未设置 `allowError` 的步骤以非零状态退出。
    StepFailed,
    /// The last step succeeded but its output differs from the expected bytes.
    /// 最后一步成功，但输出与期望字节不同。
    OutputMismatch,
    /// An allowed error was raised but it does not match the expected error.
    /// 产生了允许的错误，但与期望的错误不匹配。
    ErrorMismatch,
}

/// Terminal state of a toolchain run.
/// 工具链运行的终止状态。
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    Passed,
    Failed(FailureReason),
    TimedOut,
}

/// The end product of running one toolchain against one test with one executable.
/// 使用一个可执行文件、针对一个测试运行一个工具链的最终产物。
#[derive(Debug, Clone)]
pub struct TestResult {
    pub test: Arc<TestFile>,
    pub outcome: Outcome,
    /// The test ended with an expected, non-zero exit.
    pub error_test: bool,
    /// Some step exited with a reserved leak code.
    pub memory_leak: bool,
    /// Stdout of the last step, or stderr of the failing step.
    pub gen_output: Option<Vec<u8>>,
    pub failing_step: Option<String>,
    /// Duration of the final step, or the timeout bound for timed-out runs.
    pub time: Option<Duration>,
    /// Classifier explanation when the verdict was a mismatch.
    pub diff: Option<String>,
    pub command_history: Vec<CommandResult>,
}

impl TestResult {
    /// An empty, failing result for `test`; the runner fills it in as steps execute.
    pub fn new(test: Arc<TestFile>) -> Self {
        Self {
            test,
            outcome: Outcome::Failed(FailureReason::StepFailed),
            error_test: false,
            memory_leak: false,
            gen_output: None,
            failing_step: None,
            time: None,
            diff: None,
            command_history: Vec::new(),
        }
    }

    pub fn did_pass(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn did_timeout(&self) -> bool {
        self.outcome == Outcome::TimedOut
    }

    pub fn is_failure(&self) -> bool {
        !self.did_pass()
    }

    /// File name of the test, for display.
    pub fn test_name(&self) -> &str {
        &self.test.file
    }

    pub fn test_path(&self) -> &PathBuf {
        &self.test.path
    }

    /// Exit status of the last executed step, if any step ran.
    pub fn last_exit_status(&self) -> Option<i32> {
        self.command_history.last().map(|cr| cr.exit_status)
    }

    /// Short status label used by the console and HTML reports.
    /// 控制台和 HTML 报告使用的简短状态标签。
    pub fn status_label(&self) -> &'static str {
        match (self.outcome, self.error_test) {
            (Outcome::TimedOut, _) => "TIMEOUT",
            (Outcome::Passed, true) => "E-PASS",
            (Outcome::Passed, false) => "PASS",
            (Outcome::Failed(_), true) => "E-FAIL",
            (Outcome::Failed(_), false) => "FAIL",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status_label(), self.test.file)
    }
}
