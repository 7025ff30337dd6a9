//! # Process Executor Module / 进程执行模块
//!
//! Runs one resolved command with a byte buffer on stdin and a wall-clock
//! timeout, capturing stdout and stderr fully in memory. Nothing here raises:
//! every way a command can go wrong is encoded in the returned `CommandResult`.
//!
//! 使用标准输入字节缓冲区和超时运行一条已解析的命令，
//! 并在内存中完整捕获 stdout 和 stderr。此处不会抛出错误：
//! 所有失败情况都编码在返回的 `CommandResult` 中。

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::core::models::{CommandResult, SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::core::resolver::{Command, Environment};

/// Spawns `command`, feeds `stdin`, and waits at most `timeout` for it to exit.
///
/// # Arguments
/// * `command` - The resolved argument vector
/// * `stdin` - Bytes written to the child's standard input, which is then closed
/// * `timeout` - Wall-clock bound; the child is killed when it is exceeded
/// * `env` - The complete environment of the child
///
/// # Returns
/// A `CommandResult`. On timeout `timed_out` is set, the exit status is
/// `TIMEOUT_EXIT_CODE` and `elapsed` equals `timeout`. When the process cannot be
/// started the exit status is `SPAWN_FAILURE_EXIT_CODE` with empty output.
pub async fn run_command(
    command: &Command,
    stdin: &[u8],
    timeout: Duration,
    env: &Environment,
) -> CommandResult {
    let mut result = CommandResult {
        program: command.program().to_string(),
        args: command.arguments().to_vec(),
        ..CommandResult::default()
    };

    let mut cmd = tokio::process::Command::new(command.program());
    cmd.args(command.arguments())
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start_time = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = %result.program, error = %e, "failed to spawn command");
            result.exit_status = SPAWN_FAILURE_EXIT_CODE;
            result.spawn_error = Some(e.to_string());
            return result;
        }
    };

    // Feed stdin from its own task so a child that fills its stdout pipe before
    // reading all of its input cannot deadlock us.
    if let Some(mut child_stdin) = child.stdin.take() {
        let input = stdin.to_vec();
        tokio::spawn(async move {
            if let Err(e) = child_stdin.write_all(&input).await {
                debug!(error = %e, "child closed stdin before reading all input");
            }
        });
    }

    // Dropping the `wait_with_output` future on timeout drops the child, and
    // `kill_on_drop` terminates it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            result.elapsed = start_time.elapsed();
            result.exit_status = exit_code(output.status);
            result.stdout = output.stdout;
            result.stderr = output.stderr;
            debug!(
                program = %result.program,
                exit_status = result.exit_status,
                stdout_bytes = result.stdout.len(),
                stderr_bytes = result.stderr.len(),
                elapsed = ?result.elapsed,
                "command completed"
            );
        }
        Ok(Err(e)) => {
            warn!(program = %result.program, error = %e, "failed to collect command output");
            result.elapsed = start_time.elapsed();
            result.exit_status = SPAWN_FAILURE_EXIT_CODE;
            result.spawn_error = Some(e.to_string());
        }
        Err(_) => {
            warn!(program = %result.program, timeout = ?timeout, "command timed out");
            result.elapsed = timeout;
            result.timed_out = true;
            result.exit_status = TIMEOUT_EXIT_CODE;
        }
    }

    result
}

/// Maps an exit status to an integer. A child killed by a signal reports the
/// negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    SPAWN_FAILURE_EXIT_CODE
}
