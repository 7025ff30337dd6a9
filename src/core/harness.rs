//! # Test Harness Module / 测试编排模块
//!
//! This module walks executables, toolchains, packages, subpackages and tests,
//! runs every combination through the schedulers, and applies the reporting
//! strategy of the selected mode to the results as they arrive in order.
//!
//! Executables are processed strictly one after another, each with its own
//! environment snapshot. Within an executable, packages and tests fan out
//! according to the worker budget.
//!
//! 此模块遍历可执行文件、工具链、包、子包和测试，通过调度器运行每种组合，
//! 并在结果按顺序到达时应用所选模式的报告策略。

use anyhow::Result;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    core::{
        config::{Executable, Package, RunnerConfig},
        error::RunnerError,
        execution::{RunSettings, ToolChainRunner},
        models::TestResult,
        planner::{PositionCounter, WorkerBudget},
        resolver::Environment,
        scheduler::{Completion, Gate, Scheduler},
        testfile::TestFile,
        toolchain::ToolChain,
    },
    infra::fs,
    reporting::{
        console::{self, DisplayOptions},
        files,
    },
};

/// How results are counted and reported. Chosen once per run.
/// 结果的统计和报告方式，每次运行选择一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Pass/fail per test; the run fails if any test fails.
    #[default]
    Regular,
    /// Regular reporting plus a summary of tests that hit a leak exit code.
    MemoryCheck,
    /// Collects final-step times into `perf.csv`.
    Performance,
    /// Every executable defends against every package; writes one CSV per toolchain.
    Tournament,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Regular => "regular",
            Strategy::MemoryCheck => "memcheck",
            Strategy::Performance => "perf",
            Strategy::Tournament => "tournament",
        }
    }

    /// Whether a failing test makes the whole run fail.
    fn fails_run(self) -> bool {
        matches!(self, Strategy::Regular | Strategy::MemoryCheck)
    }

    fn pre_executable(self, exe_id: &str, ledger: &mut Ledger) {
        if self == Strategy::Performance {
            ledger.perf.start_column(exe_id);
        }
    }

    fn process_result(self, result: &TestResult, ledger: &mut Ledger, display: &DisplayOptions) {
        console::print_result(result, display);

        if self == Strategy::MemoryCheck && result.memory_leak {
            ledger.leaks.push(result.clone());
        }
        if self == Strategy::Performance {
            let seconds = match result.time {
                Some(time) if result.did_pass() => time,
                _ => ledger.timeout,
            };
            ledger.perf.record(result.test_name(), seconds);
        }
        if result.is_failure() {
            if self.fails_run() {
                ledger.passed = false;
            }
            ledger.failures.push(result.clone());
        }
    }

    fn post_executable(self, ledger: &mut Ledger) {
        if self == Strategy::MemoryCheck {
            console::print_leak_summary(&ledger.leaks);
            ledger.leaks.clear();
        }
        if self == Strategy::Performance {
            ledger.perf.finish_column();
        }
        console::print_failure_summary(&ledger.failures);
        ledger.failures.clear();
    }

    fn post_run(self, ledger: &Ledger, output_dir: &Path) -> Result<()> {
        if self == Strategy::Performance {
            files::write_csv(&output_dir.join("perf.csv"), &files::transpose(&ledger.perf.columns))?;
        }
        Ok(())
    }
}

/// Options that shape one harness run.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub strategy: Strategy,
    pub timeout: Duration,
    pub budget: WorkerBudget,
    pub fast_fail: bool,
    /// Where CSV and feedback files are written.
    pub output_dir: PathBuf,
    /// Tournament: file receiving the failed tests of the solution executable.
    pub fail_log: Option<PathBuf>,
    pub display: DisplayOptions,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Regular,
            timeout: RunSettings::default().timeout,
            budget: WorkerBudget::SEQUENTIAL,
            fast_fail: false,
            output_dir: PathBuf::from("."),
            fail_log: None,
            display: DisplayOptions::default(),
        }
    }
}

/// Results of one subpackage, in test order.
#[derive(Debug, Clone)]
pub struct SubPackageRun {
    pub name: String,
    pub results: Vec<TestResult>,
}

/// Results of one package against one executable and toolchain.
#[derive(Debug, Clone)]
pub struct PackageRun {
    pub name: String,
    pub subpackages: Vec<SubPackageRun>,
}

impl PackageRun {
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.subpackages.iter().flat_map(|s| s.results.iter())
    }

    /// `(passed, total)`
    pub fn counts(&self) -> (usize, usize) {
        count(self.results())
    }
}

impl Completion for PackageRun {
    fn is_failure(&self) -> bool {
        self.results().any(TestResult::is_failure)
    }
}

#[derive(Debug, Clone)]
pub struct ToolChainRun {
    pub name: String,
    pub packages: Vec<PackageRun>,
}

impl ToolChainRun {
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.packages.iter().flat_map(PackageRun::results)
    }

    pub fn counts(&self) -> (usize, usize) {
        count(self.results())
    }
}

#[derive(Debug, Clone)]
pub struct ExecutableRun {
    pub id: String,
    pub toolchains: Vec<ToolChainRun>,
}

impl ExecutableRun {
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.toolchains.iter().flat_map(ToolChainRun::results)
    }

    pub fn counts(&self) -> (usize, usize) {
        count(self.results())
    }
}

/// The `pass/total` matrix of one toolchain in tournament mode.
/// 锦标赛模式下一个工具链的 `通过/总数` 矩阵。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentTable {
    pub toolchain: String,
    /// Attacking package names, in column order.
    pub attackers: Vec<String>,
    /// One row per defending executable: its id and one cell per attacker.
    pub rows: Vec<(String, Vec<String>)>,
}

impl TournamentTable {
    /// CSV rows: a header naming the toolchain and attackers, then one row per defender.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let header = std::iter::once(self.toolchain.clone()).chain(self.attackers.iter().cloned());
        let mut rows = vec![header.collect()];
        for (defender, cells) in &self.rows {
            rows.push(std::iter::once(defender.clone()).chain(cells.iter().cloned()).collect());
        }
        rows
    }

    /// The cell for `defender` against `attacker`, if it was filled in.
    pub fn cell(&self, defender: &str, attacker: &str) -> Option<&str> {
        let column = self.attackers.iter().position(|a| a == attacker)?;
        let (_, cells) = self.rows.iter().find(|(d, _)| d == defender)?;
        cells.get(column).map(String::as_str).filter(|c| !c.is_empty())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct HarnessReport {
    /// Whether the run counts as a success for the selected strategy.
    pub passed: bool,
    /// Set when a shutdown request cut the run short.
    pub interrupted: bool,
    /// Set when fast fail stopped the run early.
    pub stopped_early: bool,
    pub executables: Vec<ExecutableRun>,
    pub tournament: Vec<TournamentTable>,
}

impl HarnessReport {
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.executables.iter().flat_map(ExecutableRun::results)
    }

    pub fn counts(&self) -> (usize, usize) {
        count(self.results())
    }
}

fn count<'a>(results: impl Iterator<Item = &'a TestResult>) -> (usize, usize) {
    results.fold((0, 0), |(passed, total), r| (passed + usize::from(r.did_pass()), total + 1))
}

/// Per-executable bookkeeping of the reporting strategy.
#[derive(Debug)]
struct Ledger {
    passed: bool,
    timeout: Duration,
    failures: Vec<TestResult>,
    leaks: Vec<TestResult>,
    perf: PerfTable,
}

impl Ledger {
    fn new(timeout: Duration) -> Self {
        Self {
            passed: true,
            timeout,
            failures: Vec::new(),
            leaks: Vec::new(),
            perf: PerfTable::default(),
        }
    }
}

/// Columns of `perf.csv`: test names first, then one column of seconds per executable.
#[derive(Debug, Default)]
struct PerfTable {
    columns: Vec<Vec<String>>,
    names: Vec<String>,
    current: Vec<String>,
    names_done: bool,
}

impl PerfTable {
    fn start_column(&mut self, exe_id: &str) {
        self.current = vec![exe_id.to_string()];
    }

    fn record(&mut self, test_name: &str, time: Duration) {
        if !self.names_done {
            self.names.push(test_name.to_string());
        }
        self.current.push(format!("{:.4}", time.as_secs_f64()));
    }

    fn finish_column(&mut self) {
        if !self.names_done {
            let mut names = vec!["Test".to_string()];
            names.append(&mut self.names);
            self.columns.push(names);
            self.names_done = true;
        }
        self.columns.push(std::mem::take(&mut self.current));
    }
}

/// Everything one (executable, toolchain) batch shares between its runs.
#[derive(Debug)]
struct Batch {
    toolchain: Arc<ToolChain>,
    exe: Arc<Executable>,
    settings: Arc<RunSettings>,
    env: Arc<Environment>,
    /// Give every run its own scratch directory for declared output files.
    isolate: bool,
}

impl Batch {
    async fn run_test(self: Arc<Self>, test: Arc<TestFile>) -> Result<TestResult, RunnerError> {
        let runner = ToolChainRunner::new(
            Arc::clone(&self.toolchain),
            Arc::clone(&self.settings),
            Arc::clone(&self.env),
        );
        if !self.isolate {
            return runner.run(test, &self.exe).await;
        }
        let scratch = fs::create_run_dir(&test.stem).map_err(|source| RunnerError::ScratchDir {
            test: test.file.clone(),
            source,
        })?;
        runner.with_output_dir(scratch.path()).run(test, &self.exe).await
    }
}

/// Runs one package: subpackages in order, the tests of each through `tests`.
/// Test positions start at `base` and follow test order across subpackages.
async fn run_package(
    batch: Arc<Batch>,
    tests: Scheduler,
    base: usize,
    package: Package,
) -> Result<PackageRun, RunnerError> {
    let mut run = PackageRun {
        name: package.name,
        subpackages: Vec::new(),
    };
    let mut next_position = base;

    for subpackage in package.subpackages {
        let jobs: Vec<(usize, Arc<TestFile>)> = subpackage
            .tests
            .into_iter()
            .map(|test| {
                next_position += 1;
                (next_position - 1, test)
            })
            .collect();
        let expected = jobs.len();
        let mut results = Vec::with_capacity(expected);
        let mut error = None;

        tests
            .run_with(
                jobs,
                |_, test| Arc::clone(&batch).run_test(test),
                |outcome| match outcome {
                    Ok(result) => {
                        results.push(result);
                        ControlFlow::Continue(())
                    }
                    Err(e) => {
                        error = Some(e);
                        ControlFlow::Break(())
                    }
                },
            )
            .await;

        if let Some(e) = error {
            return Err(e);
        }
        let complete = results.len() == expected;
        run.subpackages.push(SubPackageRun {
            name: subpackage.name,
            results,
        });
        if !complete {
            break;
        }
    }
    Ok(run)
}

/// Drives a whole run for one configuration.
/// 为一个配置驱动整个运行。
pub struct Harness<'a> {
    config: &'a RunnerConfig,
    options: HarnessOptions,
    settings: Arc<RunSettings>,
    gate: Gate,
}

impl<'a> Harness<'a> {
    /// # Arguments
    /// * `config` - A verified configuration
    /// * `options` - Mode, worker budget and display options
    /// * `shutdown` - Cancelled on Ctrl-C; no new run starts afterwards
    pub fn new(config: &'a RunnerConfig, options: HarnessOptions, shutdown: CancellationToken) -> Self {
        let settings = Arc::new(RunSettings {
            timeout: options.timeout,
            leak_exit_codes: config.leak_exit_codes.clone(),
            error_vocabulary: config.error_vocabulary.clone(),
        });
        let gate = Gate::new(options.fast_fail, shutdown);
        Self {
            config,
            options,
            settings,
            gate,
        }
    }

    /// Runs every test of the configuration under the selected strategy.
    ///
    /// # Errors
    /// The first `RunnerError` in program order, or a failure to write one of
    /// the report files.
    pub async fn run(&self) -> Result<HarnessReport> {
        info!(
            mode = self.options.strategy.name(),
            package_workers = self.options.budget.package_workers,
            test_workers = self.options.budget.test_workers,
            tests = self.config.n_tests(),
            "starting run"
        );
        let mut report = match self.options.strategy {
            Strategy::Tournament => self.tournament().await?,
            _ => self.iterate().await?,
        };
        report.interrupted = self.gate.is_shut_down();
        report.stopped_early = self.gate.fast_fail() && self.gate.tripped();
        if report.interrupted {
            warn!("run interrupted before all tests were started");
            report.passed = false;
        }
        Ok(report)
    }

    fn halted(&self) -> bool {
        self.gate.is_shut_down() || (self.gate.fast_fail() && self.gate.tripped())
    }

    fn schedulers(&self) -> (Scheduler, Scheduler) {
        let budget = self.options.budget;
        (
            Scheduler::new(budget.package_workers, self.gate.clone()),
            Scheduler::new(budget.test_workers, self.gate.clone()),
        )
    }

    fn batch(&self, exe: &Arc<Executable>, toolchain: &Arc<ToolChain>, env: &Arc<Environment>) -> Arc<Batch> {
        Arc::new(Batch {
            toolchain: Arc::clone(toolchain),
            exe: Arc::clone(exe),
            settings: Arc::clone(&self.settings),
            env: Arc::clone(env),
            isolate: self.options.budget.is_parallel(),
        })
    }

    /// The executable's environment, applied once for its whole batch.
    fn environment_for(exe: &Executable) -> Arc<Environment> {
        Arc::new(Environment::capture().with_overlay(exe.source_env()))
    }

    fn record_package(&self, run: &PackageRun, ledger: &mut Ledger) {
        let strategy = self.options.strategy;
        console::log(2, format!("Entering package {}", run.name));
        for subpackage in &run.subpackages {
            console::log(3, format!("Entering subpackage {}", subpackage.name));
            for result in &subpackage.results {
                strategy.process_result(result, ledger, &self.options.display);
            }
            let (passed, total) = count(subpackage.results.iter());
            console::print_counts(3, "Subpackage Passed:", passed, total);
        }
        let (passed, total) = run.counts();
        console::print_counts(2, "Package Passed:", passed, total);
    }

    /// Regular, memcheck and perf modes.
    async fn iterate(&self) -> Result<HarnessReport> {
        let strategy = self.options.strategy;
        let (packages, tests) = self.schedulers();
        let mut positions = PositionCounter::new();
        let mut ledger = Ledger::new(self.options.timeout);
        let mut report = HarnessReport::default();

        for exe in &self.config.executables {
            if self.halted() {
                break;
            }
            console::log(0, format!("Running executable: {}", exe.id));
            info!(executable = %exe.id, "running executable");
            strategy.pre_executable(&exe.id, &mut ledger);
            let env = Self::environment_for(exe);
            let mut exe_run = ExecutableRun {
                id: exe.id.clone(),
                toolchains: Vec::new(),
            };

            for toolchain in &self.config.toolchains {
                if self.halted() {
                    break;
                }
                console::log(1, format!("Running Toolchain: {}", toolchain.name));
                let batch = self.batch(exe, toolchain, &env);
                let jobs: Vec<(usize, Package)> = self
                    .config
                    .packages
                    .iter()
                    .map(|p| (positions.reserve(p.n_tests()), p.clone()))
                    .collect();
                let mut tc_run = ToolChainRun {
                    name: toolchain.name.clone(),
                    packages: Vec::new(),
                };
                let mut error = None;

                packages
                    .run_with(
                        jobs,
                        |base, package| run_package(Arc::clone(&batch), tests.clone(), base, package),
                        |outcome| match outcome {
                            Ok(package_run) => {
                                self.record_package(&package_run, &mut ledger);
                                tc_run.packages.push(package_run);
                                ControlFlow::Continue(())
                            }
                            Err(e) => {
                                error = Some(e);
                                ControlFlow::Break(())
                            }
                        },
                    )
                    .await;

                if let Some(e) = error {
                    return Err(e.into());
                }
                let (passed, total) = tc_run.counts();
                console::print_counts(1, "Toolchain Passed:", passed, total);
                exe_run.toolchains.push(tc_run);
            }

            let (passed, total) = exe_run.counts();
            console::print_counts(0, "Executable Passed:", passed, total);
            strategy.post_executable(&mut ledger);
            report.executables.push(exe_run);
        }

        strategy.post_run(&ledger, &self.options.output_dir)?;
        report.passed = ledger.passed;
        Ok(report)
    }

    /// Tournament mode: every defender against every attacking package, per toolchain.
    async fn tournament(&self) -> Result<HarnessReport> {
        let (packages, tests) = self.schedulers();
        let mut positions = PositionCounter::new();
        let mut report = HarnessReport {
            passed: true,
            ..HarnessReport::default()
        };

        let mut attackers: Vec<&Package> = self.config.packages.iter().collect();
        attackers.sort_by_key(|p| p.name.to_lowercase());
        let mut defenders: Vec<&Arc<Executable>> = self.config.executables.iter().collect();
        defenders.sort_by_key(|e| e.id.to_lowercase());
        let output_dir = &self.options.output_dir;

        for toolchain in &self.config.toolchains {
            if self.halted() {
                break;
            }
            println!("\nToolchain: {}", toolchain.name);
            let mut table = TournamentTable {
                toolchain: toolchain.name.clone(),
                attackers: attackers.iter().map(|p| p.name.clone()).collect(),
                rows: Vec::new(),
            };

            for defender in &defenders {
                if self.halted() {
                    break;
                }
                let env = Self::environment_for(defender);
                let batch = self.batch(defender, toolchain, &env);
                let feedback = output_dir.join(format!("{}-{}feedback.txt", defender.id, toolchain.name));
                let solution_log = match (&self.config.solution_exe, &self.options.fail_log) {
                    (Some(solution), Some(fail_log)) if *solution == defender.id => Some(fail_log),
                    _ => None,
                };
                let jobs: Vec<(usize, Package)> = attackers
                    .iter()
                    .map(|p| (positions.reserve(p.n_tests()), (*p).clone()))
                    .collect();
                let mut cells = Vec::with_capacity(attackers.len());
                let mut error: Option<anyhow::Error> = None;

                packages
                    .run_with(
                        jobs,
                        |base, package| run_package(Arc::clone(&batch), tests.clone(), base, package),
                        |outcome| {
                            let run = match outcome {
                                Ok(run) => run,
                                Err(e) => {
                                    error = Some(e.into());
                                    return ControlFlow::Break(());
                                }
                            };
                            console::print_matchup(&run.name, &defender.id);
                            for result in run.results() {
                                console::print_dot(result.did_pass());
                                let logged = record_tournament_result(
                                    result,
                                    &toolchain.name,
                                    &run.name,
                                    &feedback,
                                    solution_log.map(|log| (output_dir.as_path(), log.as_path())),
                                );
                                if let Err(e) = logged {
                                    error = Some(e);
                                    return ControlFlow::Break(());
                                }
                            }
                            let (passed, total) = run.counts();
                            cells.push(format!("{passed}/{total}"));
                            ControlFlow::Continue(())
                        },
                    )
                    .await;

                if let Some(e) = error {
                    return Err(e);
                }
                cells.resize(attackers.len(), String::new());
                table.rows.push((defender.id.clone(), cells));
            }

            println!();
            files::write_csv(
                &output_dir.join(format!("toolchain_{}.csv", toolchain.name)),
                &table.to_rows(),
            )?;
            report.tournament.push(table);
        }
        Ok(report)
    }
}

/// Writes the feedback and solution logs for one tournament result.
///
/// `solution_logs` is `(output_dir, fail_log)` when the defender is the
/// solution executable and a fail log was requested.
fn record_tournament_result(
    result: &TestResult,
    toolchain: &str,
    attacker: &str,
    feedback: &Path,
    solution_logs: Option<(&Path, &Path)>,
) -> Result<()> {
    let line = format!("{toolchain} {attacker} {}", result.test_path().display());
    if result.did_pass() {
        if let Some((output_dir, _)) = solution_logs {
            files::append_line(&output_dir.join("pass_log.txt"), &line)?;
        }
    } else {
        files::append_feedback(feedback, result)?;
        if let Some((_, fail_log)) = solution_logs {
            files::append_line(fail_log, &line)?;
        }
    }
    Ok(())
}
