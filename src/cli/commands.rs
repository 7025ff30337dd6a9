//! # Commands Module / 命令模块
//!
//! Implementations of the CLI commands.
//!
//! CLI 命令的实现。

pub mod run;
