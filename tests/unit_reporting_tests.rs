//! # Reporting Module Unit Tests / 报告模块单元测试
//!
//! CSV rendering, tournament tables, feedback entries, HTML reports, and the
//! truncation helpers used when printing outputs.
//!
//! CSV 渲染、锦标赛表格、反馈条目、HTML 报告以及打印输出时使用的截断辅助函数。

mod common;

use common::Fixture;
use std::sync::Arc;
use std::time::Duration;
use toolchain_runner::core::harness::{
    ExecutableRun, HarnessReport, PackageRun, SubPackageRun, ToolChainRun, TournamentTable,
};
use toolchain_runner::core::models::{FailureReason, Outcome, TestResult};
use toolchain_runner::core::testfile::TestFile;
use toolchain_runner::infra::fs::{file_to_display_string, truncated_bytes};
use toolchain_runner::reporting::{files, html};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn failed_result(fixture: &Fixture) -> TestResult {
    let path = fixture.write("tests/team/add.in", "int main() { print(1 + 1); }\n// CHECK:2\n");
    let mut result = TestResult::new(Arc::new(TestFile::new(path)));
    result.outcome = Outcome::Failed(FailureReason::OutputMismatch);
    result.gen_output = Some(b"3".to_vec());
    result.diff = Some("first difference at byte 0".to_string());
    result
}

#[cfg(test)]
mod csv_tests {
    use super::*;

    #[test]
    fn test_plain_rows() {
        let rows = vec![strings(&["a", "b"]), strings(&["1", "2"])];
        assert_eq!(files::to_csv(&rows), "a,b\r\n1,2\r\n");
    }

    #[test]
    fn test_fields_needing_quotes() {
        let rows = vec![strings(&["has,comma", "has \"quote\"", "multi\nline", "plain"])];
        assert_eq!(
            files::to_csv(&rows),
            "\"has,comma\",\"has \"\"quote\"\"\",\"multi\nline\",plain\r\n"
        );
    }

    #[test]
    fn test_transpose_pads_short_columns() {
        let columns = vec![strings(&["Test", "a.in", "b.in"]), strings(&["exe", "0.5"])];
        assert_eq!(
            files::transpose(&columns),
            vec![strings(&["Test", "exe"]), strings(&["a.in", "0.5"]), strings(&["b.in", ""])]
        );
        assert!(files::transpose(&[]).is_empty());
    }

    #[test]
    fn test_write_and_append() {
        let fixture = Fixture::new();
        let csv = fixture.path().join("table.csv");
        files::write_csv(&csv, &[strings(&["x"])]).unwrap();
        files::write_csv(&csv, &[strings(&["y"])]).unwrap();
        assert_eq!(std::fs::read_to_string(&csv).unwrap(), "y\r\n");

        let log = fixture.path().join("log.txt");
        files::append_line(&log, "one").unwrap();
        files::append_line(&log, "two").unwrap();
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "one\ntwo\n");
    }
}

#[cfg(test)]
mod tournament_table_tests {
    use super::*;

    fn table() -> TournamentTable {
        TournamentTable {
            toolchain: "llvm".to_string(),
            attackers: strings(&["alpha", "beta"]),
            rows: vec![
                ("defender1".to_string(), strings(&["3/4", "2/2"])),
                ("defender2".to_string(), strings(&["4/4", ""])),
            ],
        }
    }

    #[test]
    fn test_rows_start_with_header() {
        assert_eq!(
            table().to_rows(),
            vec![
                strings(&["llvm", "alpha", "beta"]),
                strings(&["defender1", "3/4", "2/2"]),
                strings(&["defender2", "4/4", ""]),
            ]
        );
    }

    #[test]
    fn test_cell_lookup() {
        let table = table();
        assert_eq!(table.cell("defender1", "beta"), Some("2/2"));
        assert_eq!(table.cell("defender2", "beta"), None);
        assert_eq!(table.cell("nobody", "alpha"), None);
        assert_eq!(table.cell("defender1", "gamma"), None);
    }
}

#[cfg(test)]
mod feedback_tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let fixture = Fixture::new();
        let entry = files::feedback_entry(&failed_result(&fixture));
        let lines: Vec<&str> = entry.lines().collect();

        assert_eq!(lines[0], "=".repeat(40));
        assert_eq!(lines[1], "Test: add.in");
        assert!(lines[2].starts_with("Test Contents: int main()"));
        assert!(entry.contains("Expected Output: 2\n"));
        assert!(entry.ends_with("Generated Output: 3\n"));
    }

    #[test]
    fn test_passing_results_are_not_appended() {
        let fixture = Fixture::new();
        let mut result = failed_result(&fixture);
        result.outcome = Outcome::Passed;
        let path = fixture.path().join("feedback.txt");
        files::append_feedback(&path, &result).unwrap();
        assert!(!path.exists());
    }
}

#[cfg(test)]
mod html_tests {
    use super::*;

    fn report(fixture: &Fixture) -> HarnessReport {
        let passing_path = fixture.write("tests/team/ok.in", "// CHECK:ok\n");
        let mut passing = TestResult::new(Arc::new(TestFile::new(passing_path)));
        passing.outcome = Outcome::Passed;
        passing.time = Some(Duration::from_millis(1500));
        passing.memory_leak = true;

        HarnessReport {
            passed: false,
            executables: vec![ExecutableRun {
                id: "team-exe".to_string(),
                toolchains: vec![ToolChainRun {
                    name: "interpret".to_string(),
                    packages: vec![PackageRun {
                        name: "team".to_string(),
                        subpackages: vec![SubPackageRun {
                            name: "team".to_string(),
                            results: vec![passing, failed_result(fixture)],
                        }],
                    }],
                }],
            }],
            ..HarnessReport::default()
        }
    }

    #[test]
    fn test_render_contains_tables_and_details() {
        let fixture = Fixture::new();
        let page = html::render(&report(&fixture)).into_string();

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("team-exe / interpret (1 / 2)"));
        assert!(page.contains("status-PASS"));
        assert!(page.contains("(leak)"));
        assert!(page.contains("1.5000s"));
        assert!(page.contains("status-FAIL"));
        assert!(page.contains("first difference at byte 0"));
        assert!(page.contains("Leaked"));
    }

    #[test]
    fn test_report_written_to_disk() {
        let fixture = Fixture::new();
        let path = fixture.path().join("report.html");
        html::generate_html_report(&report(&fixture), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("Toolchain Runner Report"));
    }
}

#[cfg(test)]
mod truncation_tests {
    use super::*;

    #[test]
    fn test_short_data_unchanged() {
        assert_eq!(truncated_bytes(b"abc", 10), b"abc");
    }

    #[test]
    fn test_long_data_keeps_head_and_tail() {
        let data: Vec<u8> = (0..200u8).collect();
        let truncated = truncated_bytes(&data, 100);
        assert!(truncated.len() <= 100);
        assert_eq!(truncated[0], 0);
        assert_eq!(*truncated.last().unwrap(), 199);
        let text = String::from_utf8_lossy(&truncated);
        assert!(text.contains("omitted for brevity"));
    }

    #[test]
    fn test_display_string_of_missing_file() {
        let fixture = Fixture::new();
        assert!(file_to_display_string(&fixture.path().join("nope"), 10).is_none());
        let path = fixture.write("small.txt", "hello");
        assert_eq!(file_to_display_string(&path, 10).as_deref(), Some("hello"));
    }
}
