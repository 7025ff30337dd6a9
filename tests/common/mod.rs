// Shared test helpers for integration tests
#![allow(dead_code)]

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// A throwaway directory holding test files, scripts and a config.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempdir().expect("Failed to create temporary directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    /// Writes an executable `/bin/sh` script.
    pub fn script(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.write(relative, &format!("#!/bin/sh\n{body}\n"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("Failed to chmod script");
        }
        path
    }

    /// Writes `config` as `config.json` and returns its path.
    pub fn config(&self, config: &Value) -> PathBuf {
        self.write("config.json", &serde_json::to_string_pretty(config).expect("valid json"))
    }
}

/// A step running `/bin/sh -c <script>` with the given extra arguments.
pub fn sh_step(name: &str, script: &str, args: &[&str]) -> Value {
    let mut arguments = vec![json!("-c"), json!(script), json!(name)];
    arguments.extend(args.iter().map(|a| json!(a)));
    json!({
        "stepName": name,
        "executablePath": "/bin/sh",
        "arguments": arguments,
    })
}

/// A one-step toolchain that prints the test file through `cat`-like logic:
/// the step runs `$EXE $INPUT` and the result is compared with the test's CHECK.
pub fn run_exe_step() -> Value {
    json!({
        "stepName": "run",
        "executablePath": "$EXE",
        "arguments": ["$INPUT"],
        "usesInStr": true,
        "allowError": true,
    })
}

/// Creates a test tree: `tests/<package>/<file>` for every entry.
pub fn write_tests(fixture: &Fixture, tests: &[(&str, &str, &str)]) {
    for (package, file, content) in tests {
        fixture.write(&format!("tests/{package}/{file}"), content);
    }
}

/// A config with one executable (`exe`), `toolchains` and the `tests` directory.
pub fn basic_config(fixture: &Fixture, exe: &Path, toolchains: Value) -> PathBuf {
    fixture.config(&json!({
        "testDir": "tests",
        "testedExecutablePaths": { "exe": exe },
        "toolchains": toolchains,
    }))
}
