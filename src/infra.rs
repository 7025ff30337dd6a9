//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Toolchain Runner:
//! child process execution and file system helpers.
//!
//! 此模块为 Toolchain Runner 提供基础设施服务：
//! 子进程执行和文件系统辅助功能。

pub mod command;
pub mod fs;
