//! # Toolchain Declarations / 工具链声明
//!
//! A toolchain is a named, ordered list of steps. Both are immutable once loaded
//! and are shared read-only across every concurrent run.
//!
//! 工具链是一个具名的、有序的步骤列表。加载后二者均不可变，
//! 并在所有并发运行之间只读共享。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::ConfigError;

/// One command invocation inside a toolchain.
/// 工具链中的一次命令调用。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Display name, used to report the failing step.
    /// 显示名称，用于报告失败的步骤。
    #[serde(rename = "stepName", default)]
    pub name: String,
    /// Either a literal path or a placeholder such as `$EXE`.
    /// 字面路径或诸如 `$EXE` 的占位符。
    #[serde(default)]
    pub executable_path: String,
    /// Arguments, which may contain `$EXE`, `$INPUT`, `$OUTPUT`, `$VAR` and `${VAR}`.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Output file written by this step, relative to the run's base directory.
    /// When absent, stdout is piped to the next step through a temporary file.
    #[serde(default)]
    pub output: Option<String>,
    /// Non-zero exits are matched leniently against the expected error instead of failing.
    #[serde(default)]
    pub allow_error: bool,
    /// Feed the test's input stream on stdin.
    #[serde(rename = "usesInStr", default)]
    pub uses_in_stream: bool,
    #[serde(default)]
    pub uses_runtime: bool,
}

impl Step {
    /// Validates the declaration itself. `toolchain` is only used for messages.
    pub fn verify(&self, toolchain: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push(ConfigError::MissingStepField {
                toolchain: toolchain.to_string(),
                step: self.name.clone(),
                field: "stepName",
            });
        }
        if self.executable_path.is_empty() {
            errors.push(ConfigError::MissingStepField {
                toolchain: toolchain.to_string(),
                step: self.name.clone(),
                field: "executablePath",
            });
        } else if !self.executable_path.starts_with('$')
            && !Path::new(&self.executable_path).exists()
        {
            errors.push(ConfigError::MissingStepExecutable {
                toolchain: toolchain.to_string(),
                step: self.name.clone(),
                path: self.executable_path.clone(),
            });
        }
        errors
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolChain {
    pub name: String,
    pub steps: Vec<Step>,
}

impl ToolChain {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn verify(&self) -> Vec<ConfigError> {
        if self.steps.is_empty() {
            return vec![ConfigError::EmptyToolChain(self.name.clone())];
        }
        self.steps
            .iter()
            .flat_map(|step| step.verify(&self.name))
            .collect()
    }
}
