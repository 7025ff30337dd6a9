//! # Parameter Resolver Module / 参数解析模块
//!
//! Turns a step declaration into a ready-to-execute argument vector by
//! substituting the magic parameters (`$EXE`, `$INPUT`, `$OUTPUT`) and then
//! environment references (`$NAME`, `${NAME}`).
//!
//! 通过替换魔法参数（`$EXE`、`$INPUT`、`$OUTPUT`）以及环境变量引用
//! （`$NAME`、`${NAME}`），将步骤声明转换为可直接执行的参数向量。

use std::collections::BTreeMap;
use std::path::{self, Path};

use crate::core::toolchain::Step;

pub const MAGIC_EXE: &str = "$EXE";
pub const MAGIC_INPUT: &str = "$INPUT";
pub const MAGIC_OUTPUT: &str = "$OUTPUT";

/// Values for the magic parameters of one step of one run.
/// 单次运行中某一步骤的魔法参数值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagicParams {
    /// `$EXE`: binary of the executable under test.
    pub exe_path: String,
    /// `$INPUT`: the test file for the first step, then the previous step's output.
    pub input_file: String,
    /// `$OUTPUT`: this step's declared output file, absolute. Empty when none.
    pub output_file: String,
}

/// A snapshot of environment variables.
///
/// The same snapshot is used to expand `$VAR` references and as the complete
/// environment of every child process of a batch, so a run never observes the
/// process environment changing underneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Captures the current process environment. Variables whose name or value
    /// is not valid Unicode are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Returns a copy with `overlay` set on top of the captured variables.
    pub fn with_overlay<I, K, V>(mut self, overlay: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in overlay {
            self.vars.insert(key.into(), value.into());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fully resolved argument vector. The first element is the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
}

impl Command {
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }
}

/// Builds the command for `step`: `[executablePath] ++ arguments`, with magic
/// parameters and environment references substituted. A relative program path
/// is made absolute against the current working directory.
pub fn resolve_command(step: &Step, params: &MagicParams, env: &Environment) -> Command {
    let mut args: Vec<String> = std::iter::once(&step.executable_path)
        .chain(step.arguments.iter())
        .map(|arg| replace_env_vars(&replace_magic_params(arg, params), env))
        .collect();

    if let Some(program) = args.first_mut() {
        if !Path::new(program.as_str()).is_absolute() {
            if let Ok(abs) = path::absolute(program.as_str()) {
                *program = abs.to_string_lossy().into_owned();
            }
        }
    }

    Command { args }
}

/// Substitutes each magic parameter whose value is non-empty.
pub fn replace_magic_params(arg: &str, params: &MagicParams) -> String {
    let mut resolved = arg.to_string();
    for (token, value) in [
        (MAGIC_EXE, &params.exe_path),
        (MAGIC_INPUT, &params.input_file),
        (MAGIC_OUTPUT, &params.output_file),
    ] {
        if !value.is_empty() && resolved.contains(token) {
            resolved = resolved.replace(token, value);
        }
    }
    resolved
}

/// Expands `$NAME` and `${NAME}` from `env`. References to unset variables are
/// left exactly as written.
pub fn replace_env_vars(arg: &str, env: &Environment) -> String {
    shellexpand::env_with_context_no_errors(arg, |name: &str| env.get(name)).into_owned()
}
