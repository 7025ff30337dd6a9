//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Toolchain Runner,
//! including configuration, test discovery, toolchain execution,
//! result classification and parallel scheduling.
//!
//! 此模块包含 Toolchain Runner 的核心功能，
//! 包括配置、测试发现、工具链执行、结果分类和并行调度。

pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod harness;
pub mod models;
pub mod planner;
pub mod resolver;
pub mod scheduler;
pub mod testfile;
pub mod toolchain;

// Re-exports
pub use config::{RunnerConfig, load_config};
pub use execution::{RunSettings, ToolChainRunner};
pub use harness::{Harness, HarnessOptions, HarnessReport, Strategy};
pub use models::{CommandResult, Outcome, TestResult};
