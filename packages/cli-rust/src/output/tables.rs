//! Table rendering for image verification results

use comfy_table::{Cell, Color, Table};
use drone_riot_conv_core::docker::{ArtifactReport, CheckResult};

fn status_cell(passed: bool) -> Cell {
    if passed {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

/// One row per image check
pub fn check_table(results: &[CheckResult]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Check", "Status", "Detail"]);
    for result in results {
        table.add_row(vec![
            Cell::new(&result.name),
            status_cell(result.passed),
            Cell::new(&result.detail),
        ]);
    }
    table
}

/// Builder and runtime binaries side by side
pub fn artifact_table(report: &ArtifactReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Stage", "Image", "SHA-256", "Size"]);
    table.add_row(vec![
        Cell::new("builder"),
        Cell::new(&report.builder_image),
        Cell::new(&report.builder_digest),
        Cell::new(report.builder_size),
    ]);
    table.add_row(vec![
        Cell::new("runtime"),
        Cell::new(&report.runtime_image),
        Cell::new(&report.runtime_digest),
        Cell::new(report.runtime_size),
    ]);
    table.add_row(vec![
        Cell::new("identical"),
        status_cell(report.identical()),
        Cell::new(""),
        Cell::new(""),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(runtime_digest: &str) -> ArtifactReport {
        ArtifactReport {
            builder_image: "drone-riot-conv:latest-builder".to_string(),
            runtime_image: "drone-riot-conv:latest".to_string(),
            builder_digest: "abc123".to_string(),
            runtime_digest: runtime_digest.to_string(),
            builder_size: 4096,
            runtime_size: 4096,
        }
    }

    #[test]
    fn check_table_lists_every_result() {
        let results = vec![
            CheckResult {
                name: "exit codes".to_string(),
                passed: true,
                detail: "0, 1, 137".to_string(),
            },
            CheckResult {
                name: "zombie reaping".to_string(),
                passed: false,
                detail: "2 zombies".to_string(),
            },
        ];
        let rendered = check_table(&results).to_string();
        assert!(rendered.contains("exit codes"));
        assert!(rendered.contains("PASS"));
        assert!(rendered.contains("FAIL"));
        assert!(rendered.contains("2 zombies"));
    }

    #[test]
    fn artifact_table_shows_both_stages() {
        let rendered = artifact_table(&report("abc123")).to_string();
        assert!(rendered.contains("latest-builder"));
        assert!(rendered.contains("4096"));
        assert!(rendered.contains("PASS"));
    }

    #[test]
    fn artifact_table_flags_mismatch() {
        let rendered = artifact_table(&report("def456")).to_string();
        assert!(rendered.contains("def456"));
        assert!(rendered.contains("FAIL"));
    }
}
