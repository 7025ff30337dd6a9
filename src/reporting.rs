//! # Reporting Module / 报告模块
//!
//! This module presents results: colored console output while a run is in
//! progress, CSV and feedback files for tournament and performance runs, and an
//! optional HTML summary.
//!
//! 此模块负责展示结果：运行期间的彩色控制台输出、
//! 锦标赛和性能运行的 CSV 与反馈文件，以及可选的 HTML 摘要。

pub mod console;
pub mod files;
pub mod html;

pub use console::{DisplayOptions, print_result};
pub use html::generate_html_report;
