//! # Parallel Scheduler Module / 并行调度模块
//!
//! Runs independent jobs on a bounded pool of tokio tasks and hands the results
//! back in submission order, so a run with many workers reports exactly what a
//! sequential run would.
//!
//! Every job carries a global position (its index in a purely sequential run).
//! All schedulers of a run share one [`Gate`]: the gate refuses jobs after a
//! shutdown request, and in fast-fail mode it also refuses every job positioned
//! after the earliest failure seen so far.
//!
//! 在有界的 tokio 任务池上运行独立任务，并按提交顺序返回结果，
//! 因此多工作线程运行报告的内容与顺序运行完全一致。

use futures::{StreamExt, stream};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::models::TestResult;

/// Anything a scheduled job can produce.
pub trait Completion {
    /// Whether this result should trip fast fail.
    fn is_failure(&self) -> bool;
}

impl Completion for TestResult {
    fn is_failure(&self) -> bool {
        TestResult::is_failure(self)
    }
}

impl<T: Completion, E> Completion for Result<T, E> {
    fn is_failure(&self) -> bool {
        match self {
            Ok(value) => value.is_failure(),
            Err(_) => true,
        }
    }
}

/// Shared admission control for every scheduler of one run.
/// 一次运行中所有调度器共享的准入控制。
#[derive(Debug, Clone)]
pub struct Gate {
    fast_fail: bool,
    /// Lowest position that failed, `usize::MAX` while nothing has.
    fence: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl Gate {
    pub fn new(fast_fail: bool, shutdown: CancellationToken) -> Self {
        Self {
            fast_fail,
            fence: Arc::new(AtomicUsize::new(usize::MAX)),
            shutdown,
        }
    }

    pub fn fast_fail(&self) -> bool {
        self.fast_fail
    }

    /// Whether a job at `position` may still start.
    pub fn admits(&self, position: usize) -> bool {
        !self.shutdown.is_cancelled() && position < self.fence.load(Ordering::Acquire)
    }

    /// Lowers the fence to `position`. No effect unless fast fail is on.
    pub fn record_failure(&self, position: usize) {
        if self.fast_fail {
            self.fence.fetch_min(position, Ordering::AcqRel);
        }
    }

    /// Whether a finished job at `position` still belongs to the reported run.
    pub fn keeps(&self, position: usize) -> bool {
        position <= self.fence.load(Ordering::Acquire)
    }

    /// True once any failure has lowered the fence.
    pub fn tripped(&self) -> bool {
        self.fence.load(Ordering::Acquire) != usize::MAX
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// A bounded, order-preserving job pool.
/// 有界且保持顺序的任务池。
#[derive(Debug, Clone)]
pub struct Scheduler {
    workers: usize,
    gate: Gate,
}

impl Scheduler {
    pub fn new(workers: usize, gate: Gate) -> Self {
        Self {
            workers: workers.max(1),
            gate,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Runs `work` over `jobs` with at most `workers` jobs in flight and
    /// collects the results in the order of `jobs`.
    ///
    /// Collection stops at the first job the gate refused to start, at the
    /// first result positioned after the fence, and (in fast-fail mode) right
    /// after the first failure. Jobs still in flight at that point finish on
    /// their own tasks and are discarded.
    ///
    /// # Panics
    /// Re-raises a panic from any job whose result is collected.
    pub async fn run<J, T, F, Fut>(&self, jobs: Vec<(usize, J)>, work: F) -> Vec<T>
    where
        J: Send + 'static,
        T: Completion + Send + 'static,
        F: Fn(usize, J) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut results = Vec::with_capacity(jobs.len());
        self.run_with(jobs, work, |output| {
            results.push(output);
            ControlFlow::Continue(())
        })
        .await;
        results
    }

    /// Like [`Scheduler::run`], but hands each result to `sink` as soon as it
    /// is next in order. Returning `ControlFlow::Break` from the sink stops
    /// collection just like a fast-fail stop does.
    pub async fn run_with<J, T, F, Fut, S>(&self, jobs: Vec<(usize, J)>, work: F, mut sink: S)
    where
        J: Send + 'static,
        T: Completion + Send + 'static,
        F: Fn(usize, J) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        S: FnMut(T) -> ControlFlow<()>,
    {
        let work = &work;
        let mut pending = stream::iter(jobs)
            .map(|(position, job)| {
                let gate = self.gate.clone();
                async move {
                    if !gate.admits(position) {
                        return None;
                    }
                    let output = match tokio::spawn(work(position, job)).await {
                        Ok(output) => output,
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(_) => return None,
                    };
                    if output.is_failure() {
                        gate.record_failure(position);
                    }
                    Some((position, output))
                }
            })
            .buffered(self.workers);

        while let Some(next) = pending.next().await {
            let Some((position, output)) = next else {
                debug!("scheduler stopped: job not admitted");
                break;
            };
            if !self.gate.keeps(position) {
                break;
            }
            let failed = output.is_failure();
            if sink(output).is_break() || (failed && self.gate.fast_fail) {
                break;
            }
        }
    }
}
