//! # Configuration Module / 配置模块
//!
//! Loads the runner configuration (JSON, or TOML when the file ends in
//! `.toml`), resolves its paths relative to the configuration file, discovers
//! the test packages under the test directory, and verifies everything before a
//! single test runs.
//!
//! 加载运行器配置（JSON，或扩展名为 `.toml` 时使用 TOML），
//! 相对于配置文件解析路径，发现测试目录下的测试包，并在运行任何测试之前验证所有内容。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::classifier::{DEFAULT_RUNTIME_ERRORS, ErrorVocabulary};
use crate::core::error::ConfigError;
use crate::core::models::VALGRIND_EXIT_CODE;
use crate::core::testfile::TestFile;
use crate::core::toolchain::{Step, ToolChain};
use crate::infra::fs::resolve_relative;

/// The configuration file as written on disk.
/// 磁盘上的配置文件结构。
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    /// Directory holding one sub-directory per test package.
    pub test_dir: String,
    /// Executable id -> binary path.
    pub tested_executable_paths: Map<String, Value>,
    /// Executable id -> runtime shared library, for executables that need one.
    #[serde(default)]
    pub runtimes: Map<String, Value>,
    #[serde(default)]
    pub solution_executable: Option<String>,
    /// Toolchain name -> ordered steps.
    pub toolchains: Map<String, Value>,
    /// Exit codes reported by a memory checker when it finds a leak.
    #[serde(default = "default_reserved_exit_codes")]
    pub reserved_exit_codes: Vec<i32>,
    #[serde(default = "default_runtime_errors")]
    pub runtime_errors: Vec<String>,
}

fn default_reserved_exit_codes() -> Vec<i32> {
    vec![VALGRIND_EXIT_CODE]
}

fn default_runtime_errors() -> Vec<String> {
    DEFAULT_RUNTIME_ERRORS.iter().map(|s| s.to_string()).collect()
}

/// A tested executable with an optional runtime library to preload.
/// 被测试的可执行文件，以及可选的预加载运行时库。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    pub id: String,
    pub binary_path: PathBuf,
    pub runtime: Option<PathBuf>,
}

impl Executable {
    pub fn new(id: impl Into<String>, binary_path: impl Into<PathBuf>, runtime: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            binary_path: binary_path.into(),
            runtime,
        }
    }

    pub fn verify(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !self.binary_path.exists() {
            errors.push(ConfigError::MissingBinary {
                id: self.id.clone(),
                path: self.binary_path.clone(),
            });
        }
        if let Some(runtime) = &self.runtime {
            if !runtime.exists() {
                errors.push(ConfigError::MissingRuntime {
                    id: self.id.clone(),
                    path: runtime.clone(),
                });
            }
        }
        errors
    }

    /// Environment variables that make the dynamic loader pick up the runtime,
    /// plus `RT_PATH` (its directory) and `RT_LIB` (its name without the `lib`
    /// prefix) for use in step arguments. Empty when there is no runtime.
    pub fn source_env(&self) -> Vec<(String, String)> {
        let Some(runtime) = &self.runtime else {
            return Vec::new();
        };
        let runtime_dir = runtime
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let runtime_path = runtime.to_string_lossy().into_owned();
        let stem = runtime
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rt_lib = stem.strip_prefix("lib").unwrap_or(&stem).to_string();

        let (library_path_var, preload_var) = if cfg!(target_os = "macos") {
            ("DYLD_LIBRARY_PATH", "DYLD_INSERT_LIBRARIES")
        } else {
            ("LD_LIBRARY_PATH", "LD_PRELOAD")
        };

        vec![
            (library_path_var.to_string(), runtime_dir.clone()),
            (preload_var.to_string(), runtime_path),
            ("RT_PATH".to_string(), runtime_dir),
            ("RT_LIB".to_string(), rt_lib),
        ]
    }
}

/// The tests found directly inside one directory.
#[derive(Debug, Clone)]
pub struct SubPackage {
    pub path: PathBuf,
    pub name: String,
    pub tests: Vec<Arc<TestFile>>,
}

impl SubPackage {
    /// Gathers the tests in `path`; a plain file becomes a single-test subpackage.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        let tests = if path.is_dir() {
            gather_tests(&path)
        } else {
            vec![Arc::new(TestFile::new(&path))]
        };
        Self { path, name, tests }
    }

    /// Ignores hidden files and the reserved `.out` / `.ins` extensions.
    pub fn is_test(path: &Path) -> bool {
        let name = file_name_of(path);
        path.is_file() && !name.starts_with('.') && !name.ends_with(".out") && !name.ends_with(".ins")
    }

    pub fn verify(&self) -> Vec<ConfigError> {
        self.tests
            .iter()
            .flat_map(|t| t.verify())
            .map(ConfigError::from)
            .collect()
    }
}

fn gather_tests(dir: &Path) -> Vec<Arc<TestFile>> {
    let mut tests: Vec<TestFile> = sorted_entries(dir)
        .into_iter()
        .filter(|p| SubPackage::is_test(p))
        .map(TestFile::new)
        .collect();
    tests.sort_by(|a, b| a.file.cmp(&b.file));
    tests.into_iter().map(Arc::new).collect()
}

/// A test package: usually one team's submitted tests.
/// 测试包：通常是一个团队提交的测试。
#[derive(Debug, Clone)]
pub struct Package {
    pub path: PathBuf,
    pub name: String,
    pub subpackages: Vec<SubPackage>,
}

impl Package {
    /// Collects the package directory itself and every nested directory that
    /// holds tests. A plain file becomes a package with one subpackage.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        let mut subpackages = Vec::new();

        if path.is_dir() {
            let top_level = SubPackage::new(&path);
            if !top_level.tests.is_empty() {
                subpackages.push(top_level);
            }
            for dir in nested_dirs(&path) {
                let spkg = SubPackage::new(dir);
                if !spkg.tests.is_empty() {
                    subpackages.push(spkg);
                }
            }
        } else {
            subpackages.push(SubPackage::new(&path));
        }

        Self {
            path,
            name,
            subpackages,
        }
    }

    pub fn n_tests(&self) -> usize {
        self.subpackages.iter().map(|s| s.tests.len()).sum()
    }

    pub fn verify(&self) -> Vec<ConfigError> {
        self.subpackages.iter().flat_map(SubPackage::verify).collect()
    }
}

/// All directories below `root`, depth first, each level sorted by name.
fn nested_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in sorted_entries(root) {
        if entry.is_dir() {
            dirs.push(entry.clone());
            dirs.extend(nested_dirs(&entry));
        }
    }
    dirs
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The in-memory configuration that directs a run.
/// 指导一次运行的内存中配置。
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub config_path: PathBuf,
    pub test_dir: PathBuf,
    pub executables: Vec<Arc<Executable>>,
    pub solution_exe: Option<String>,
    pub toolchains: Vec<Arc<ToolChain>>,
    pub packages: Vec<Package>,
    pub leak_exit_codes: Vec<i32>,
    pub error_vocabulary: ErrorVocabulary,
    /// Every problem found by verification. A run must not start unless empty.
    pub errors: Vec<ConfigError>,
}

impl RunnerConfig {
    /// Builds the configuration from its raw form. `config_path` anchors every
    /// relative path; `debug_package` restricts the run to a single package.
    pub fn from_raw(config_path: &Path, raw: RawConfig, debug_package: Option<&Path>) -> Result<Self> {
        let config_path = std::path::absolute(config_path)
            .with_context(|| format!("Failed to resolve path: {}", config_path.display()))?;
        let test_dir = resolve_relative(&raw.test_dir, &config_path);

        let executables = raw
            .tested_executable_paths
            .iter()
            .map(|(id, path)| -> Result<Arc<Executable>> {
                let path = json_string(path).with_context(|| format!("executable '{id}' must be a path string"))?;
                let runtime = match raw.runtimes.get(id) {
                    Some(rt) => {
                        let rt = json_string(rt).with_context(|| format!("runtime '{id}' must be a path string"))?;
                        Some(resolve_relative(rt, &config_path))
                    }
                    None => None,
                };
                Ok(Arc::new(Executable::new(
                    id.clone(),
                    resolve_relative(path, &config_path),
                    runtime,
                )))
            })
            .collect::<Result<Vec<_>>>()?;

        let toolchains = raw
            .toolchains
            .iter()
            .map(|(name, steps)| -> Result<Arc<ToolChain>> {
                let steps: Vec<Step> = serde_json::from_value(steps.clone())
                    .with_context(|| format!("Failed to parse the steps of toolchain '{name}'"))?;
                Ok(Arc::new(ToolChain::new(name.clone(), steps)))
            })
            .collect::<Result<Vec<_>>>()?;

        let packages = match debug_package {
            Some(pkg) => vec![Package::new(pkg)],
            None => sorted_entries(&test_dir)
                .into_iter()
                .filter(|p| p.is_dir())
                .map(Package::new)
                .collect(),
        };

        let mut config = Self {
            config_path,
            test_dir,
            executables,
            solution_exe: raw.solution_executable,
            toolchains,
            packages,
            leak_exit_codes: raw.reserved_exit_codes,
            error_vocabulary: ErrorVocabulary::new(raw.runtime_errors),
            errors: Vec::new(),
        };
        config.errors = config.verify();
        Ok(config)
    }

    /// Collects every error of the test directory, executables, toolchains and tests.
    pub fn verify(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !self.test_dir.exists() {
            errors.push(ConfigError::MissingTestDir(self.test_dir.clone()));
        }
        for exe in &self.executables {
            errors.extend(exe.verify());
        }
        if let Some(solution) = &self.solution_exe {
            if !self.executables.iter().any(|e| &e.id == solution) {
                errors.push(ConfigError::UnknownSolution(solution.clone()));
            }
        }
        for tc in &self.toolchains {
            errors.extend(tc.verify());
        }
        for pkg in &self.packages {
            errors.extend(pkg.verify());
        }
        errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn n_tests(&self) -> usize {
        self.packages.iter().map(Package::n_tests).sum()
    }

    /// Serializable summary, printed when the configuration is rejected.
    pub fn to_summary(&self) -> Value {
        serde_json::json!({
            "testDir": self.test_dir,
            "executables": self.executables.iter().map(|e| serde_json::json!({
                "id": e.id,
                "exe_path": e.binary_path,
            })).collect::<Vec<_>>(),
            "toolchains": self.toolchains.iter().map(|tc| (tc.name.clone(), serde_json::to_value(&tc.steps).unwrap_or_default())).collect::<Map<_, _>>(),
            "packages": self.packages.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
        })
    }
}

fn json_string(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("expected a string, found {value}"))
}

/// Parses a configuration document. TOML is used when `path` ends in `.toml`.
pub fn parse_raw_config(path: &Path, content: &str) -> Result<RawConfig> {
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    if is_toml {
        toml::from_str(content).context("Failed to parse config TOML")
    } else {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }
}

/// Loads, resolves and verifies the configuration at `path`.
/// Verification problems are returned inside `RunnerConfig::errors`; only
/// unreadable or malformed files are reported through `Err`.
pub fn load_config(path: &Path, debug_package: Option<&Path>) -> Result<RunnerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not open config file: {}", path.display()))?;
    let raw = parse_raw_config(path, &content)?;
    RunnerConfig::from_raw(path, raw, debug_package)
}
