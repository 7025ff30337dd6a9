//! # HTML Reporting Module / HTML 报告模块
//!
//! This module renders a finished regular or memcheck run as a single HTML
//! page: overall counts, then one table per executable and toolchain with a
//! row per test. Failed rows carry the classifier's explanation and the
//! generated output.
//!
//! 此模块将完成的常规或内存检查运行渲染为单个 HTML 页面：
//! 总体计数，然后为每个可执行文件和工具链生成一个表格，每个测试一行。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::harness::{HarnessReport, ToolChainRun};
use crate::core::models::TestResult;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; color: #222; }
h1 { margin-bottom: 0.2em; }
.meta { color: #666; margin-bottom: 1.5em; }
.summary-container { display: flex; gap: 2em; margin-bottom: 2em; }
.summary-item .count { font-size: 2em; font-weight: bold; display: block; }
.passed-text { color: #2e7d32; }
.failed-text { color: #c62828; }
.leak-text { color: #f9a825; }
table { border-collapse: collapse; width: 100%; margin-bottom: 2em; }
th, td { border: 1px solid #ddd; padding: 4px 8px; text-align: left; vertical-align: top; }
.status-PASS, .status-E-PASS { color: #2e7d32; font-weight: bold; }
.status-FAIL, .status-E-FAIL { color: #c62828; font-weight: bold; }
.status-TIMEOUT { color: #f9a825; font-weight: bold; }
pre { margin: 0; white-space: pre-wrap; max-height: 20em; overflow: auto; }
"#;

/// Writes the HTML report for `report` to `output_path`.
///
/// # Errors / 错误
/// Returns an error if the file cannot be written.
/// 如果无法写入文件则返回错误。
pub fn generate_html_report(report: &HarnessReport, output_path: &Path) -> Result<()> {
    let markup = render(report);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("Failed to write HTML report: {}", output_path.display()))
}

/// Renders the report page.
pub fn render(report: &HarnessReport) -> Markup {
    let (passed, total) = report.counts();
    let leaks = report.results().filter(|r| r.memory_leak).count();
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Toolchain Runner Report" }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { "Toolchain Runner Report" }
                div class="meta" { "Generated " (generated_at) }
                div class="summary-container" {
                    div class="summary-item" { span class="count" { (total) } span class="label" { "Total" } }
                    div class="summary-item" { span class="count passed-text" { (passed) } span class="label" { "Passed" } }
                    div class="summary-item" { span class="count failed-text" { (total - passed) } span class="label" { "Failed" } }
                    @if leaks > 0 {
                        div class="summary-item" { span class="count leak-text" { (leaks) } span class="label" { "Leaked" } }
                    }
                }
                @for exe in &report.executables {
                    @for toolchain in &exe.toolchains {
                        (toolchain_table(&exe.id, toolchain))
                    }
                }
            }
        }
    }
}

fn toolchain_table(exe_id: &str, toolchain: &ToolChainRun) -> Markup {
    let (passed, total) = toolchain.counts();
    html! {
        h2 { (exe_id) " / " (toolchain.name) " (" (passed) " / " (total) ")" }
        table {
            thead {
                tr { th { "Package" } th { "Subpackage" } th { "Test" } th { "Status" } th { "Time" } th { "Details" } }
            }
            tbody {
                @for package in &toolchain.packages {
                    @for subpackage in &package.subpackages {
                        @for result in &subpackage.results {
                            (result_row(&package.name, &subpackage.name, result))
                        }
                    }
                }
            }
        }
    }
}

fn result_row(package: &str, subpackage: &str, result: &TestResult) -> Markup {
    let label = result.status_label();
    let time = result
        .time
        .map(|t| format!("{:.4}s", t.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    html! {
        tr {
            td { (package) }
            td { (subpackage) }
            td { (result.test_name()) }
            td class=(format!("status-{label}")) {
                (label)
                @if result.memory_leak { " (leak)" }
            }
            td { (time) }
            td {
                @if !result.did_pass() {
                    @if let Some(step) = &result.failing_step { "step: " (step) }
                    @if let Some(diff) = &result.diff { pre { (diff) } }
                    @if let Some(output) = &result.gen_output { pre { (String::from_utf8_lossy(output).into_owned()) } }
                }
            }
        }
    }
}
