//! Behavioral checks against a built runtime image
//!
//! Each check runs short-lived containers and reports pass or fail with a
//! one-line detail. Docker failures abort the run; a failing check does not.

use super::container::{DEFAULT_STOP_TIMEOUT_SECS, run_to_exit, stop_and_measure};
use super::contract::inspect_runtime_contract;
use super::dockerfile::RUNTIME_ARTIFACT_PATH;
use super::{DockerClient, DockerError};
use tracing::info;

/// Exit codes the supervisor must hand back unchanged
pub const PROPAGATED_EXIT_CODES: &[(&str, i64)] =
    &[("exit 0", 0), ("exit 1", 1), ("kill -KILL $$", 137)];

/// Shell snippet that fails when any process in the container is a zombie
///
/// Spawns an orphan first so there is something for PID 1 to reap.
const ZOMBIE_SCAN: &str = "(sleep 0 &); sleep 1; \
    for f in /proc/[0-9]*/stat; do \
    read -r line 2>/dev/null < \"$f\" || continue; \
    case \"$line\" in *\") Z \"*) exit 1;; esac; \
    done; exit 0";

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }

    fn exit_code(name: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::new(
            name,
            actual == expected,
            format!("expected {expected}, got {actual}"),
        )
    }
}

fn sh(script: &str) -> Option<Vec<String>> {
    Some(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
}

/// Run every check against `image`
pub async fn run_image_checks(
    client: &DockerClient,
    image: &str,
) -> Result<Vec<CheckResult>, DockerError> {
    let mut results = Vec::new();

    let contract = inspect_runtime_contract(client, image).await?;
    let violations = contract.violations();
    results.push(CheckResult::new(
        "runtime contract",
        violations.is_empty(),
        if violations.is_empty() {
            "supervisor entrypoint, absolute default command, no volumes".to_string()
        } else {
            violations.join("; ")
        },
    ));

    let code = run_to_exit(
        client,
        image,
        Some(vec![
            "test".to_string(),
            "-x".to_string(),
            RUNTIME_ARTIFACT_PATH.to_string(),
        ]),
    )
    .await?;
    results.push(CheckResult::new(
        "artifact present",
        code == 0,
        format!("{RUNTIME_ARTIFACT_PATH} executable: {}", code == 0),
    ));

    let report = stop_and_measure(client, image, DEFAULT_STOP_TIMEOUT_SECS).await?;
    results.push(CheckResult::new(
        "default command serves",
        report.health.is_some(),
        match &report.health {
            Some(health) => format!("healthz {} (version {})", health.status, health.version),
            None => "no health response".to_string(),
        },
    ));
    results.push(CheckResult::new(
        "signal propagation",
        report.stopped_gracefully() && report.exit_code == 0,
        format!(
            "exit {} after {:.1}s (timeout {}s)",
            report.exit_code,
            report.elapsed.as_secs_f64(),
            report.timeout.as_secs()
        ),
    ));

    for (script, expected) in PROPAGATED_EXIT_CODES {
        let actual = run_to_exit(client, image, sh(script)).await?;
        results.push(CheckResult::exit_code(
            format!("exit code {expected}"),
            *expected,
            actual,
        ));
    }

    let code = run_to_exit(
        client,
        image,
        Some(vec![
            RUNTIME_ARTIFACT_PATH.to_string(),
            "--version".to_string(),
        ]),
    )
    .await?;
    results.push(CheckResult::exit_code("command override", 0, code));

    let code = run_to_exit(client, image, sh(ZOMBIE_SCAN)).await?;
    results.push(CheckResult::new(
        "zombie reaping",
        code == 0,
        if code == 0 {
            "no zombies after orphan exit".to_string()
        } else {
            format!("zombie found (exit {code})")
        },
    ));

    let passed = results.iter().filter(|r| r.passed).count();
    info!(
        "{}/{} image checks passed for {}",
        passed,
        results.len(),
        image
    );
    Ok(results)
}

/// Whether every check passed
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_check_compares_values() {
        let ok = CheckResult::exit_code("exit code 137", 137, 137);
        assert!(ok.passed);
        assert_eq!(ok.detail, "expected 137, got 137");

        let bad = CheckResult::exit_code("exit code 1", 1, 0);
        assert!(!bad.passed);
    }

    #[test]
    fn propagated_codes_cover_success_failure_and_kill() {
        let codes: Vec<i64> = PROPAGATED_EXIT_CODES.iter().map(|(_, c)| *c).collect();
        assert_eq!(codes, vec![0, 1, 137]);
    }

    #[test]
    fn sh_wraps_script() {
        let expected = vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()];
        assert_eq!(sh("exit 1"), Some(expected));
    }

    #[test]
    fn zombie_scan_matches_zombie_state_field() {
        // /proc/<pid>/stat: "pid (comm) STATE ..."
        assert!(ZOMBIE_SCAN.contains("*\") Z \"*"));
        assert!(ZOMBIE_SCAN.ends_with("exit 0"));
    }

    #[test]
    fn all_passed_requires_every_check() {
        let results = vec![
            CheckResult::new("a", true, ""),
            CheckResult::new("b", false, ""),
        ];
        assert!(!all_passed(&results));
        assert!(all_passed(&results[..1]));
        assert!(all_passed(&[]));
    }
}
