//! # Execution Planner Module / 执行计划模块
//!
//! This module decides how the worker ceiling is split between the package-level
//! and the test-level pools, and numbers jobs in program order so fast fail can
//! compare positions across pools.
//!
//! 此模块决定如何在包级和测试级工作池之间分配工作线程上限，
//! 并按程序顺序为任务编号，以便快速失败可以跨池比较位置。

use anyhow::{Result, bail};
use std::str::FromStr;

/// Which level of the test tree fans out across workers.
/// 测试树的哪一层在工作线程间展开。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// Tests of one subpackage run concurrently.
    #[default]
    Tests,
    /// Whole packages run concurrently; tests inside a package run one by one.
    Packages,
    /// Both levels fan out; the ceiling is split between them.
    Both,
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tests" => Ok(Granularity::Tests),
            "packages" => Ok(Granularity::Packages),
            "both" => Ok(Granularity::Both),
            other => bail!("Unknown parallel granularity '{other}', expected tests, packages or both."),
        }
    }
}

/// Worker counts for the two scheduler levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerBudget {
    pub package_workers: usize,
    pub test_workers: usize,
}

impl WorkerBudget {
    pub const SEQUENTIAL: WorkerBudget = WorkerBudget {
        package_workers: 1,
        test_workers: 1,
    };

    /// Whether more than one run can be in flight at a time.
    pub fn is_parallel(&self) -> bool {
        self.package_workers * self.test_workers > 1
    }
}

/// Splits `ceiling` workers according to `granularity`.
///
/// The product of the two pools never exceeds `ceiling` (a ceiling of zero is
/// treated as one), and the package pool never exceeds the number of packages.
///
/// # Arguments
/// * `ceiling` - Maximum number of concurrent runs
/// * `granularity` - Which levels may fan out
/// * `package_count` - Number of packages that will be scheduled
pub fn plan_workers(ceiling: usize, granularity: Granularity, package_count: usize) -> WorkerBudget {
    let ceiling = ceiling.max(1);
    let packages = package_count.max(1);

    match granularity {
        Granularity::Tests => WorkerBudget {
            package_workers: 1,
            test_workers: ceiling,
        },
        Granularity::Packages => WorkerBudget {
            package_workers: ceiling.min(packages),
            test_workers: 1,
        },
        Granularity::Both => {
            let package_workers = ceiling.isqrt().clamp(1, packages);
            WorkerBudget {
                package_workers,
                test_workers: (ceiling / package_workers).max(1),
            }
        }
    }
}

/// Hands out global program-order positions.
///
/// Every job of a run receives a position that reflects where it would run in
/// a purely sequential execution, whichever pool ends up executing it.
#[derive(Debug, Default)]
pub struct PositionCounter {
    next: usize,
}

impl PositionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `count` consecutive positions and returns the first.
    pub fn reserve(&mut self, count: usize) -> usize {
        let base = self.next;
        self.next += count;
        base
    }
}
