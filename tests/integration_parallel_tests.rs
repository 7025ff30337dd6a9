//! # Parallel Execution Integration Tests / 并行执行集成测试
//!
//! Order preservation, concurrency limits and fast fail of the scheduler, and
//! whole harness runs whose results must not depend on the worker count.
//!
//! 调度器的顺序保持、并发限制与快速失败，
//! 以及结果不得依赖工作线程数量的完整编排运行。

mod common;

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolchain_runner::core::scheduler::{Completion, Gate, Scheduler};

/// A scheduled job that only knows whether it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Job {
    id: usize,
    failed: bool,
}

impl Completion for Job {
    fn is_failure(&self) -> bool {
        self.failed
    }
}

fn scheduler(workers: usize, fast_fail: bool) -> Scheduler {
    Scheduler::new(workers, Gate::new(fast_fail, CancellationToken::new()))
}

/// Jobs positioned 0..count; later jobs finish sooner to scramble completion order.
fn jobs(count: usize) -> Vec<(usize, usize)> {
    (0..count).map(|i| (i, i)).collect()
}

async fn finish(id: usize, count: usize, fail_at: Option<usize>) -> Job {
    tokio::time::sleep(Duration::from_millis(((count - id) * 5) as u64)).await;
    Job {
        id,
        failed: Some(id) == fail_at,
    }
}

#[cfg(test)]
mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn test_results_in_submission_order() {
        for workers in [1, 3, 8] {
            let results = scheduler(workers, false)
                .run(jobs(10), |_, id| finish(id, 10, None))
                .await;
            let ids: Vec<usize> = results.iter().map(|j| j.id).collect();
            assert_eq!(ids, (0..10).collect::<Vec<_>>(), "workers = {workers}");
        }
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_workers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = scheduler(3, false)
            .run(jobs(12), |_, id| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Job { id, failed: false }
                }
            })
            .await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failure_without_fast_fail_keeps_going() {
        let results = scheduler(4, false)
            .run(jobs(6), |_, id| finish(id, 6, Some(2)))
            .await;
        assert_eq!(results.len(), 6);
        assert!(results[2].failed);
    }

    #[tokio::test]
    async fn test_fast_fail_truncates_at_first_failure() {
        for workers in [1, 4] {
            let results = scheduler(workers, true)
                .run(jobs(10), |_, id| finish(id, 10, Some(3)))
                .await;
            let ids: Vec<usize> = results.iter().map(|j| j.id).collect();
            assert_eq!(ids, [0, 1, 2, 3], "workers = {workers}");
        }
    }

    #[tokio::test]
    async fn test_fast_fail_sequential_never_starts_later_jobs() {
        let started = Arc::new(AtomicUsize::new(0));
        let results = scheduler(1, true)
            .run(jobs(10), |_, id| {
                let started = Arc::clone(&started);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    Job { id, failed: id == 3 }
                }
            })
            .await;
        assert_eq!(results.len(), 4);
        assert_eq!(started.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shared_gate_stops_other_schedulers() {
        let gate = Gate::new(true, CancellationToken::new());
        gate.record_failure(5);
        assert!(gate.tripped());

        let results = Scheduler::new(2, gate.clone())
            .run(jobs(10), |_, id| async move { Job { id, failed: false } })
            .await;
        assert_eq!(results.len(), 5);
        assert!(!gate.admits(5));
        assert!(gate.keeps(5));
        assert!(!gate.keeps(6));
    }

    #[tokio::test]
    async fn test_record_failure_ignored_without_fast_fail() {
        let gate = Gate::new(false, CancellationToken::new());
        gate.record_failure(0);
        assert!(!gate.tripped());
        assert!(gate.admits(100));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_jobs() {
        let token = CancellationToken::new();
        token.cancel();
        let results = Scheduler::new(2, Gate::new(false, token))
            .run(jobs(5), |_, id| async move { Job { id, failed: false } })
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_sink_break_stops_collection() {
        let mut seen = Vec::new();
        scheduler(2, false)
            .run_with(
                jobs(10),
                |_, id| async move { Job { id, failed: false } },
                |job| {
                    seen.push(job.id);
                    if job.id == 4 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
                },
            )
            .await;
        assert_eq!(seen, [0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_errors_count_as_failures() {
        let results: Vec<Result<Job, String>> = scheduler(2, true)
            .run(jobs(5), |_, id| async move {
                if id == 1 { Err("boom".to_string()) } else { Ok(Job { id, failed: false }) }
            })
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
}

#[cfg(all(test, unix))]
mod harness_tests {
    use super::common::{self, Fixture};
    use serde_json::json;
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;
    use toolchain_runner::core::config::load_config;
    use toolchain_runner::core::harness::{Harness, HarnessOptions, HarnessReport, Strategy};
    use toolchain_runner::core::models::Outcome;
    use toolchain_runner::core::planner::{Granularity, plan_workers};

    /// Two packages of passing tests, plus one failing test when `with_failure`.
    fn fixture(with_failure: bool) -> (Fixture, PathBuf) {
        let fixture = Fixture::new();
        let exe = fixture.script("bin/compiler", "printf ok");
        for package in ["alpha", "beta"] {
            for i in 0..4 {
                fixture.write(&format!("tests/{package}/{i:02}.in"), "// CHECK:ok\n");
            }
        }
        if with_failure {
            fixture.write("tests/alpha/02.in", "// CHECK:not-ok\n");
        }
        let config = common::basic_config(&fixture, &exe, json!({ "run": [common::run_exe_step()] }));
        (fixture, config)
    }

    async fn run(config_path: &PathBuf, options: HarnessOptions) -> HarnessReport {
        let config = load_config(config_path, None).unwrap();
        assert!(!config.has_errors(), "{:?}", config.errors);
        Harness::new(&config, options, CancellationToken::new()).run().await.unwrap()
    }

    /// Sequential runs write declared outputs into the current directory.
    const RELATIVE_OUTPUT: &str = "relative-toolchain-test.out";

    /// Tests whose toolchain reads a path relative to the current directory
    /// and writes every test's result to the same declared output name.
    /// `alpha/03.in` breaks the first step.
    fn relative_fixture() -> (Fixture, PathBuf) {
        let fixture = Fixture::new();
        let exe = fixture.script("bin/compiler", "true");
        for package in ["alpha", "beta"] {
            for i in 0..4 {
                fixture.write(&format!("tests/{package}/{i:02}.in"), &format!("// CHECK:{package}-{i}\n"));
            }
        }
        fixture.write("tests/alpha/03.in", "// BREAK\n// CHECK:alpha-3\n");

        let mut compile = common::sh_step(
            "compile",
            "grep -q BREAK \"$2\" && exit 3; grep '^// CHECK:' \"$2\" | cut -c10- | tr -d '\\n' > \"$1\"",
            &["$OUTPUT", "$INPUT"],
        );
        compile["output"] = json!(RELATIVE_OUTPUT);
        let execute = common::sh_step(
            "run",
            "test -f \"$2\" || { echo \"no $2 in $(pwd)\" >&2; exit 1; }; cat \"$1\"",
            &["$INPUT", "Cargo.toml"],
        );
        let config = common::basic_config(&fixture, &exe, json!({ "relative": [compile, execute] }));
        (fixture, config)
    }

    type Verdict = (String, Outcome, Option<Vec<u8>>, Option<String>);

    fn verdicts(report: &HarnessReport) -> Vec<Verdict> {
        report
            .results()
            .map(|r| {
                (
                    r.test_path().display().to_string(),
                    r.outcome,
                    r.gen_output.clone(),
                    r.failing_step.clone(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parallel_run_matches_sequential_run() {
        let (_fixture, config) = fixture(true);
        let sequential = run(&config, HarnessOptions::default()).await;
        assert_eq!(sequential.counts(), (7, 8));

        for granularity in [Granularity::Tests, Granularity::Packages, Granularity::Both] {
            let options = HarnessOptions {
                budget: plan_workers(4, granularity, 2),
                ..HarnessOptions::default()
            };
            let parallel = run(&config, options).await;
            assert_eq!(verdicts(&parallel), verdicts(&sequential), "{granularity:?}");
            assert!(!parallel.passed);
        }
    }

    #[tokio::test]
    async fn test_parallel_children_share_the_current_directory() {
        let (_fixture, config) = relative_fixture();
        let sequential = run(&config, HarnessOptions::default()).await;
        let _ = std::fs::remove_file(RELATIVE_OUTPUT);
        assert_eq!(sequential.counts(), (7, 8));
        let broken: Vec<_> = sequential.results().filter(|r| r.is_failure()).collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].failing_step.as_deref(), Some("compile"));

        for granularity in [Granularity::Tests, Granularity::Packages, Granularity::Both] {
            let options = HarnessOptions {
                budget: plan_workers(4, granularity, 2),
                ..HarnessOptions::default()
            };
            let parallel = run(&config, options).await;
            assert_eq!(verdicts(&parallel), verdicts(&sequential), "{granularity:?}");
        }
    }

    #[tokio::test]
    async fn test_regular_run_passes_when_all_tests_pass() {
        let (_fixture, config) = fixture(false);
        let report = run(&config, HarnessOptions::default()).await;
        assert!(report.passed);
        assert!(!report.interrupted);
        assert_eq!(report.counts(), (8, 8));
        assert_eq!(report.executables[0].toolchains[0].packages.len(), 2);
    }

    #[tokio::test]
    async fn test_fast_fail_stops_at_first_failure() {
        let (_fixture, config) = fixture(true);
        for workers in [1, 4] {
            let options = HarnessOptions {
                fast_fail: true,
                budget: plan_workers(workers, Granularity::Both, 2),
                ..HarnessOptions::default()
            };
            let report = run(&config, options).await;
            assert!(report.stopped_early);
            assert!(!report.passed);
            let results: Vec<_> = report.results().collect();
            assert_eq!(results.len(), 3, "workers = {workers}");
            assert!(results[2].is_failure());
        }
    }

    #[tokio::test]
    async fn test_perf_mode_writes_csv_and_passes() {
        let (fixture, config) = fixture(true);
        let output_dir = fixture.path().join("out");
        std::fs::create_dir_all(&output_dir).unwrap();
        let options = HarnessOptions {
            strategy: Strategy::Performance,
            output_dir: output_dir.clone(),
            ..HarnessOptions::default()
        };
        let report = run(&config, options).await;
        assert!(report.passed);

        let csv = std::fs::read_to_string(output_dir.join("perf.csv")).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], "Test,exe");
        assert_eq!(lines.len(), 9);
        assert!(lines[1].starts_with("00.in,"));
        for line in &lines[1..] {
            let (_, seconds) = line.split_once(',').unwrap();
            let (whole, fraction) = seconds.split_once('.').unwrap();
            assert!(whole.parse::<u64>().is_ok(), "{line}");
            assert_eq!(fraction.len(), 4, "{line}");
        }
    }

    #[tokio::test]
    async fn test_memcheck_mode_fails_on_failure() {
        let (_fixture, config) = fixture(true);
        let options = HarnessOptions {
            strategy: Strategy::MemoryCheck,
            ..HarnessOptions::default()
        };
        assert!(!run(&config, options).await.passed);
    }

    #[tokio::test]
    async fn test_interrupted_run_is_not_a_pass() {
        let (_fixture, config) = fixture(false);
        let config = load_config(&config, None).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let report = Harness::new(&config, HarnessOptions::default(), token).run().await.unwrap();
        assert!(report.interrupted);
        assert!(!report.passed);
        assert_eq!(report.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_tournament_writes_table_feedback_and_logs() {
        let fixture = Fixture::new();
        let good = fixture.script("bin/good", "printf ok");
        let bad = fixture.script("bin/bad", "printf wrong");
        fixture.write("tests/Zeta/a.in", "// CHECK:ok\n");
        fixture.write("tests/zeta_b/b.in", "// CHECK:ok\n");
        fixture.write("tests/alpha/c.in", "// CHECK:ok\n");
        let config_path = fixture.config(&json!({
            "testDir": "tests",
            "testedExecutablePaths": { "solution": good, "Broken": bad },
            "solutionExecutable": "solution",
            "toolchains": { "run": [common::run_exe_step()] }
        }));
        let output_dir = fixture.path().join("out");
        std::fs::create_dir_all(&output_dir).unwrap();
        let fail_log = output_dir.join("fail_log.txt");

        let options = HarnessOptions {
            strategy: Strategy::Tournament,
            output_dir: output_dir.clone(),
            fail_log: Some(fail_log.clone()),
            budget: plan_workers(3, Granularity::Packages, 3),
            ..HarnessOptions::default()
        };
        let report = run(&config_path, options).await;
        assert!(report.passed);

        let table = &report.tournament[0];
        assert_eq!(table.attackers, ["alpha", "Zeta", "zeta_b"]);
        assert_eq!(table.rows[0].0, "Broken");
        assert_eq!(table.cell("solution", "Zeta"), Some("1/1"));
        assert_eq!(table.cell("Broken", "alpha"), Some("0/1"));

        let csv = std::fs::read_to_string(output_dir.join("toolchain_run.csv")).unwrap();
        assert!(csv.starts_with("run,alpha,Zeta,zeta_b\r\nBroken,0/1,0/1,0/1\r\nsolution,1/1,1/1,1/1\r\n"));

        let feedback = std::fs::read_to_string(output_dir.join("Broken-runfeedback.txt")).unwrap();
        assert_eq!(feedback.matches("Generated Output: wrong").count(), 3);
        assert!(!output_dir.join("solution-runfeedback.txt").exists());

        let pass_log = std::fs::read_to_string(output_dir.join("pass_log.txt")).unwrap();
        assert_eq!(pass_log.lines().count(), 3);
        assert!(pass_log.lines().all(|l| l.starts_with("run ")));
        assert!(!fail_log.exists());
    }
}
