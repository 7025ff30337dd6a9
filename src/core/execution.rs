//! # Toolchain Execution Engine Module / 工具链执行引擎模块
//!
//! This module drives a toolchain for one (test, executable) pair: it resolves
//! each step, runs it, threads its output into the next step's input, applies
//! the step's error policy, and hands the final output to the classifier.
//!
//! 此模块为一个（测试，可执行文件）对驱动工具链：解析每个步骤并运行，
//! 将其输出传递给下一步骤作为输入，应用步骤的错误策略，
//! 并将最终输出交给分类器。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, trace};

use crate::{
    core::{
        classifier::{self, ErrorVocabulary},
        config::Executable,
        error::RunnerError,
        models::{FailureReason, Outcome, TestResult, VALGRIND_EXIT_CODE},
        resolver::{self, Environment, MagicParams},
        testfile::TestFile,
        toolchain::{Step, ToolChain},
    },
    infra::{command, fs},
};

/// Policy shared by every run of a batch.
/// 批次中所有运行共享的策略。
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Per-step wall-clock timeout.
    pub timeout: Duration,
    /// Exit codes that mean "leak detected, otherwise fine".
    pub leak_exit_codes: Vec<i32>,
    /// Runtime errors recognised by lenient comparison.
    pub error_vocabulary: ErrorVocabulary,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            leak_exit_codes: vec![VALGRIND_EXIT_CODE],
            error_vocabulary: ErrorVocabulary::default(),
        }
    }
}

/// Runs one toolchain. Cheap to build; the harness creates one per job so that
/// no run-scoped state is ever shared between concurrent runs.
/// 运行一个工具链。构建开销很小；调度器为每个任务创建一个实例。
#[derive(Debug, Clone)]
pub struct ToolChainRunner {
    toolchain: Arc<ToolChain>,
    settings: Arc<RunSettings>,
    env: Arc<Environment>,
    output_dir: Option<PathBuf>,
}

impl ToolChainRunner {
    pub fn new(toolchain: Arc<ToolChain>, settings: Arc<RunSettings>, env: Arc<Environment>) -> Self {
        Self {
            toolchain,
            settings,
            env,
            output_dir: None,
        }
    }

    /// Resolves declared output files against `dir` instead of the current
    /// directory. Children still start in the current directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Makes the step's declared output file absolute.
    fn resolve_output_file(&self, step: &Step) -> Result<Option<PathBuf>, RunnerError> {
        let Some(output) = step.output.as_deref().filter(|o| !o.is_empty()) else {
            return Ok(None);
        };
        let base = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| RunnerError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };
        Ok(Some(base.join(output)))
    }

    /// Runs the toolchain for `test` against `exe`.
    ///
    /// # Returns
    /// A `TestResult` for every ordinary outcome, including timeouts, spawn
    /// failures, failing steps and mismatches.
    ///
    /// # Errors
    /// Only conditions that invalidate the whole batch: a step that claims
    /// success without writing its declared output file, a bridge file that
    /// cannot be created, an unreadable current directory, or an empty toolchain.
    pub async fn run(&self, test: Arc<TestFile>, exe: &Executable) -> Result<TestResult, RunnerError> {
        let steps = &self.toolchain.steps;
        if steps.is_empty() {
            return Err(RunnerError::EmptyToolChain(self.toolchain.name.clone()));
        }

        let expected = test.expected_output().to_vec();
        let mut result = TestResult::new(Arc::clone(&test));
        let mut input_file = test.path.clone();
        // Bridge files must outlive the step that reads them; they are removed
        // when this vector drops at the end of the run.
        let mut bridges: Vec<TempPath> = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            let last_step = index == steps.len() - 1;
            let input_stream: &[u8] = if step.uses_in_stream { test.input_stream() } else { &[] };
            let output_file = self.resolve_output_file(step)?;

            let params = MagicParams {
                exe_path: exe.binary_path.to_string_lossy().into_owned(),
                input_file: input_file.to_string_lossy().into_owned(),
                output_file: output_file
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let command = resolver::resolve_command(step, &params, &self.env);
            trace!(step = %step.name, args = ?command.args, "resolved step");

            let command_result = command::run_command(
                &command,
                input_stream,
                self.settings.timeout,
                &self.env,
            )
            .await;
            let timed_out = command_result.timed_out;
            let spawned = command_result.spawned();
            let step_time = command_result.elapsed;
            let mut exit_status = command_result.exit_status;
            let step_stdout = command_result.stdout.clone();
            let step_stderr = command_result.stderr.clone();
            result.command_history.push(command_result);

            if timed_out {
                result.outcome = Outcome::TimedOut;
                result.failing_step = Some(step.name.clone());
                result.time = Some(self.settings.timeout);
                return Ok(result);
            }

            if !spawned {
                result.outcome = Outcome::Failed(FailureReason::SpawnFailed);
                result.failing_step = Some(step.name.clone());
                return Ok(result);
            }

            if self.settings.leak_exit_codes.contains(&exit_status) {
                debug!(step = %step.name, exit_status, test = %test.file, "leak exit code observed");
                result.memory_leak = true;
                exit_status = 0;
            }

            if exit_status != 0 {
                result.error_test = true;
                result.failing_step = Some(step.name.clone());
                result.time = Some(step_time);

                if step.allow_error {
                    let verdict =
                        classifier::lenient(&step_stderr, &expected, &self.settings.error_vocabulary);
                    result.outcome = if verdict.is_pass() {
                        Outcome::Passed
                    } else {
                        Outcome::Failed(FailureReason::ErrorMismatch)
                    };
                    result.diff = verdict.diff().map(str::to_string);
                } else {
                    result.outcome = Outcome::Failed(FailureReason::StepFailed);
                }
                result.gen_output = Some(step_stderr);
                return Ok(result);
            }

            if last_step {
                let produced = match &output_file {
                    Some(path) => read_declared_output(step, path).await?,
                    None => step_stdout,
                };
                let verdict = classifier::exact(&produced, &expected);
                result.outcome = if verdict.is_pass() {
                    Outcome::Passed
                } else {
                    Outcome::Failed(FailureReason::OutputMismatch)
                };
                result.diff = verdict.diff().map(str::to_string);
                result.time = Some(step_time);
                result.gen_output = Some(produced);
                return Ok(result);
            }

            input_file = match output_file {
                Some(path) => path,
                None => {
                    let bridge = fs::write_bridge_file(&step_stdout).map_err(|source| {
                        RunnerError::TempFile {
                            step: step.name.clone(),
                            source,
                        }
                    })?;
                    let path = bridge.to_path_buf();
                    bridges.push(bridge);
                    path
                }
            };
        }

        unreachable!("the last step always returns")
    }
}

async fn read_declared_output(step: &Step, path: &Path) -> Result<Vec<u8>, RunnerError> {
    if !path.exists() {
        return Err(RunnerError::MissingOutputFile {
            step: step.name.clone(),
            path: path.to_path_buf(),
        });
    }
    tokio::fs::read(path).await.map_err(|source| RunnerError::Io {
        path: path.to_path_buf(),
        source,
    })
}
