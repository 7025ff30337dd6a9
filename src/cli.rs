//! # Command Line Interface Module / 命令行接口模块
//!
//! Builds the `toolchain-runner` command line with the clap builder API and
//! turns the matches into `RunArgs`. Every mode subcommand shares the same
//! set of options.
//!
//! 使用 clap 构建器 API 构建 `toolchain-runner` 命令行，并将匹配结果转换为 `RunArgs`。
//! 每个模式子命令共享同一组选项。

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::harness::Strategy;
use crate::core::planner::Granularity;

pub mod commands;

/// Parsed arguments of a run.
/// 一次运行的已解析参数。
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub strategy: Strategy,
    pub config: PathBuf,
    pub timeout: Duration,
    /// Worker ceiling; 0 means one per CPU.
    pub jobs: usize,
    pub parallel: Granularity,
    pub fast_fail: bool,
    pub verbosity: u8,
    pub time: bool,
    pub show_testcase: bool,
    pub debug_package: Option<PathBuf>,
    pub fail_log: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub verify: bool,
    pub html: Option<PathBuf>,
}

/// Options shared by every mode.
fn run_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .help("Path to the JSON (or .toml) configuration file")
            .value_name("CONFIG")
            .required(true)
            .value_parser(clap::value_parser!(PathBuf))
            .action(ArgAction::Set),
        Arg::new("timeout")
            .long("timeout")
            .help("Per-step timeout in seconds")
            .value_name("SECS")
            .default_value("2.0")
            .value_parser(clap::value_parser!(f64))
            .action(ArgAction::Set),
        Arg::new("jobs")
            .short('j')
            .long("jobs")
            .help("Maximum number of tests running at once (0 = one per CPU)")
            .value_name("JOBS")
            .default_value("1")
            .value_parser(clap::value_parser!(usize))
            .action(ArgAction::Set),
        Arg::new("parallel")
            .long("parallel")
            .help("Which level runs in parallel")
            .value_name("LEVEL")
            .default_value("tests")
            .value_parser(["tests", "packages", "both"])
            .action(ArgAction::Set),
        Arg::new("fast-fail")
            .short('f')
            .long("fast-fail")
            .help("Stop at the first failing test")
            .action(ArgAction::SetTrue),
        Arg::new("verbosity")
            .short('v')
            .long("verbosity")
            .help("Increase output detail (repeatable)")
            .action(ArgAction::Count),
        Arg::new("time")
            .short('t')
            .long("time")
            .help("Show the time of each passing test")
            .action(ArgAction::SetTrue),
        Arg::new("show-testcase")
            .short('s')
            .long("show-testcase")
            .help("Print the contents of each test file")
            .action(ArgAction::SetTrue),
        Arg::new("debug-package")
            .long("debug-package")
            .help("Run a single package instead of every package in the test directory")
            .value_name("PATH")
            .value_parser(clap::value_parser!(PathBuf))
            .action(ArgAction::Set),
        Arg::new("fail-log")
            .long("fail-log")
            .help("Tournament: log failing tests of the solution executable to this file")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .action(ArgAction::Set),
        Arg::new("output")
            .short('o')
            .long("output")
            .help("Directory for CSV and feedback files")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .action(ArgAction::Set),
        Arg::new("verify")
            .long("verify")
            .help("Ask for a CCID and check that a package with that name exists")
            .action(ArgAction::SetTrue),
        Arg::new("html")
            .long("html")
            .help("Write an HTML summary of a regular or memcheck run")
            .value_name("HTML")
            .value_parser(clap::value_parser!(PathBuf))
            .action(ArgAction::Set),
    ]
}

pub fn build_cli() -> Command {
    let mode = |name: &'static str, about: &'static str| Command::new(name).about(about).args(run_args());

    Command::new("toolchain-runner")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs compiler test suites through configurable toolchains and grades the output")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(mode("regular", "Run every test and report passes and failures"))
        .subcommand(mode("tournament", "Run every package against every executable and write score tables"))
        .subcommand(mode("memcheck", "Run every test and report tests that leak memory"))
        .subcommand(mode("perf", "Run every test and record timings in perf.csv"))
}

fn strategy_of(subcommand: &str) -> Result<Strategy> {
    Ok(match subcommand {
        "regular" => Strategy::Regular,
        "tournament" => Strategy::Tournament,
        "memcheck" => Strategy::MemoryCheck,
        "perf" => Strategy::Performance,
        other => bail!("Unknown mode '{other}'"),
    })
}

impl RunArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let Some((subcommand, sub)) = matches.subcommand() else {
            bail!("A mode is required: regular, tournament, memcheck or perf");
        };
        let strategy = strategy_of(subcommand)?;

        let seconds = sub.get_one::<f64>("timeout").copied().unwrap_or(2.0);
        let timeout = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid timeout: {seconds}"))?;
        let parallel = sub
            .get_one::<String>("parallel")
            .map(|s| s.parse::<Granularity>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            strategy,
            config: sub
                .get_one::<PathBuf>("config")
                .cloned()
                .context("CONFIG is required")?,
            timeout,
            jobs: sub.get_one::<usize>("jobs").copied().unwrap_or(1),
            parallel,
            fast_fail: sub.get_flag("fast-fail"),
            verbosity: sub.get_count("verbosity"),
            time: sub.get_flag("time"),
            show_testcase: sub.get_flag("show-testcase"),
            debug_package: sub.get_one::<PathBuf>("debug-package").cloned(),
            fail_log: sub.get_one::<PathBuf>("fail-log").cloned(),
            output: sub.get_one::<PathBuf>("output").cloned(),
            verify: sub.get_flag("verify"),
            html: sub.get_one::<PathBuf>("html").cloned(),
        })
    }
}

/// Parses the process arguments, exiting with clap's message on a usage error.
pub fn parse_args() -> Result<RunArgs> {
    RunArgs::from_matches(&build_cli().get_matches())
}

/// Parses an explicit argument list (the first item is the binary name).
pub fn parse_from<I, T>(args: I) -> Result<RunArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    RunArgs::from_matches(&matches)
}

/// Runs the parsed command. `Ok(true)` when the run passed.
pub async fn process_command(args: RunArgs) -> Result<bool> {
    commands::run::execute(args).await
}
