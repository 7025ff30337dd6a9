//! # Run Command Module / 运行命令模块
//!
//! This module implements the mode commands of the Toolchain Runner CLI:
//! it loads and verifies the configuration, plans the worker budget, runs the
//! harness, and writes the optional HTML report.
//!
//! 此模块实现 Toolchain Runner CLI 的模式命令：
//! 加载并验证配置，规划工作线程预算，运行测试编排，并写入可选的 HTML 报告。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use std::fs;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cli::RunArgs,
    core::{
        config::{self, RunnerConfig},
        harness::{Harness, HarnessOptions, HarnessReport, Strategy},
        planner,
    },
    reporting::{
        console::{self, DisplayOptions},
        html::generate_html_report,
    },
};

/// Executes one run.
///
/// # Returns
/// `Ok(true)` when the run passed, `Ok(false)` when tests failed, the
/// configuration was rejected, or `--verify` found no matching package.
///
/// # Errors
/// An unreadable or malformed configuration file, a batch-aborting runner
/// error, or a report file that could not be written.
pub async fn execute(args: RunArgs) -> Result<bool> {
    let config = config::load_config(&args.config, args.debug_package.as_deref())
        .with_context(|| format!("Could not open config file: {}", args.config.display()))?;

    if config.has_errors() {
        console::print_config_errors(&config);
        return Ok(false);
    }

    if args.verify && !verify_package(&config)? {
        return Ok(false);
    }

    console::print_test_info(&config, args.verbosity);

    let ceiling = if args.jobs == 0 { num_cpus::get() } else { args.jobs };
    let budget = planner::plan_workers(ceiling, args.parallel, config.packages.len());
    info!(
        jobs = ceiling,
        package_workers = budget.package_workers,
        test_workers = budget.test_workers,
        "planned workers"
    );

    let output_dir = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let options = HarnessOptions {
        strategy: args.strategy,
        timeout: args.timeout,
        budget,
        fast_fail: args.fast_fail,
        output_dir,
        fail_log: args.fail_log.clone(),
        display: DisplayOptions {
            verbosity: args.verbosity,
            show_time: args.time,
            show_testcase: args.show_testcase,
        },
    };

    let shutdown = setup_signal_handler();
    let harness = Harness::new(&config, options, shutdown);
    let report = harness.run().await?;

    if let Some(path) = &args.html {
        write_html(&report, path, args.strategy);
    }
    print_outcome(&report);
    Ok(report.passed)
}

/// Asks for a CCID and checks that a package with that exact name exists.
fn verify_package(config: &RunnerConfig) -> Result<bool> {
    let ccid: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter your CCID/Github Team Name")
        .interact_text()
        .context("Failed to read CCID")?;

    let mut found = false;
    for package in &config.packages {
        console::log(2, format!("Searching.. {}", package.name));
        if package.name == ccid {
            found = true;
        }
    }
    if !found {
        println!("{}", format!("Could not find package named after CCID: {ccid}").red());
    }
    Ok(found)
}

fn write_html(report: &HarnessReport, path: &std::path::Path, strategy: Strategy) {
    if !matches!(strategy, Strategy::Regular | Strategy::MemoryCheck) {
        warn!(mode = strategy.name(), "HTML reports are only written for regular and memcheck runs");
        return;
    }
    println!("\nGenerating HTML report at: {}", path.display());
    if let Err(e) = generate_html_report(report, path) {
        eprintln!("{} {:#}", "Failed to generate HTML report:".red(), e);
    }
}

fn print_outcome(report: &HarnessReport) {
    if report.interrupted {
        println!("\n{}", "Run interrupted; remaining tests were not started.".yellow());
    } else if report.stopped_early {
        println!("\n{}", "Fast fail: stopped after the first failing test.".yellow());
    }
    if report.passed {
        println!("\n{}", "Run passed.".green().bold());
    } else {
        println!("\n{}", "Run failed.".red().bold());
    }
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        println!("\n{}", "Shutdown requested; waiting for running tests to finish...".yellow());
        token_clone.cancel();
    });

    token
}
