//! # Toolchain Runner Library / Toolchain Runner 库
//!
//! This library provides the core functionality for the Toolchain Runner tool,
//! a configuration-driven harness that runs compiler test suites through
//! multi-step toolchains and grades the results.
//!
//! 此库为 Toolchain Runner 工具提供核心功能，
//! 这是一个配置驱动的测试工具，通过多步骤工具链运行编译器测试套件并评估结果。
//!
//! ## Modules / 模块
//!
//! - `core` - Configuration, toolchain execution, classification and scheduling
//! - `infra` - Infrastructure services like process execution and file system operations
//! - `reporting` - Console, CSV and HTML reporting
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 配置、工具链执行、结果分类和调度
//! - `infra` - 基础设施服务，如进程执行和文件系统操作
//! - `reporting` - 控制台、CSV 和 HTML 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
