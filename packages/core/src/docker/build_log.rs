//! Build output bookkeeping
//!
//! Keeps a bounded tail of classic and BuildKit build output so a failed
//! build can be reported together with the lines that explain it.

use bollard::moby::buildkit::v1::StatusResponse;
use std::collections::{HashMap, VecDeque};
use std::env;

/// Lines of build output kept for failure reports
const DEFAULT_TAIL: usize = 20;

/// Error-looking lines kept separately, so they survive a scrolling tail
const DEFAULT_ERROR_TAIL: usize = 10;

/// Env var overriding [`DEFAULT_TAIL`]
pub const ENV_BUILD_LOG_TAIL: &str = "DRONE_RIOT_CONV_BUILD_LOG_TAIL";

/// Env var overriding [`DEFAULT_ERROR_TAIL`]
pub const ENV_BUILD_ERROR_TAIL: &str = "DRONE_RIOT_CONV_BUILD_ERROR_TAIL";

fn tail_size(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .map_or(default, |size| size.clamp(5, 500))
}

/// Whether a build line reports a failure
pub fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    [
        "error",
        "failed",
        "cannot",
        "unable to",
        "not found",
        "permission denied",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Short label for a BuildKit vertex that never reported a name
pub fn vertex_label(digest: &str) -> String {
    let short: String = digest
        .strip_prefix("sha256:")
        .unwrap_or(digest)
        .chars()
        .take(12)
        .collect();
    format!("vertex {short}")
}

fn push_bounded(buffer: &mut VecDeque<String>, line: String, limit: usize) {
    while buffer.len() >= limit {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

/// One line of BuildKit output, attributed to its build step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
    pub step: String,
    pub text: String,
}

/// Bounded record of a build's output
#[derive(Debug)]
pub struct BuildLog {
    tail: VecDeque<String>,
    buildkit_tail: VecDeque<String>,
    errors: VecDeque<String>,
    tail_size: usize,
    error_tail_size: usize,
    step_names: HashMap<String, String>,
}

impl Default for BuildLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildLog {
    /// Tail sizes come from the environment, falling back to the defaults
    pub fn new() -> Self {
        Self::with_sizes(
            tail_size(ENV_BUILD_LOG_TAIL, DEFAULT_TAIL),
            tail_size(ENV_BUILD_ERROR_TAIL, DEFAULT_ERROR_TAIL),
        )
    }

    pub fn with_sizes(tail_size: usize, error_tail_size: usize) -> Self {
        Self {
            tail: VecDeque::with_capacity(tail_size),
            buildkit_tail: VecDeque::with_capacity(tail_size),
            errors: VecDeque::with_capacity(error_tail_size),
            tail_size,
            error_tail_size,
            step_names: HashMap::new(),
        }
    }

    fn note_error(&mut self, line: &str) {
        if is_error_line(line) {
            push_bounded(&mut self.errors, line.to_string(), self.error_tail_size);
        }
    }

    /// Record a line of classic builder output
    pub fn record_line(&mut self, line: &str) {
        self.note_error(line);
        push_bounded(&mut self.tail, line.to_string(), self.tail_size);
    }

    /// Record a BuildKit status update
    ///
    /// Returns the output lines it carried, each attributed to its step, and
    /// the name of the most recent user-visible step.
    pub fn record_buildkit(&mut self, status: &StatusResponse) -> (Vec<StepLine>, Option<String>) {
        for vertex in status.vertexes.iter().filter(|v| !v.name.is_empty()) {
            self.step_names
                .entry(vertex.digest.clone())
                .or_insert_with(|| vertex.name.clone());
        }

        let current = status
            .vertexes
            .iter()
            .rev()
            .map(|vertex| vertex.name.as_str())
            .find(|name| !name.is_empty() && !name.starts_with("[internal]"))
            .map(str::to_string);

        let mut lines = Vec::new();
        for log in &status.logs {
            let text = String::from_utf8_lossy(&log.msg).replace('\r', "");
            let text = text.trim_end();
            if text.is_empty() {
                continue;
            }
            let step = self
                .step_names
                .get(&log.vertex)
                .cloned()
                .unwrap_or_else(|| vertex_label(&log.vertex));

            for line in text.lines() {
                self.note_error(line);
            }
            push_bounded(
                &mut self.buildkit_tail,
                format!("[{step}] {text}"),
                self.tail_size,
            );
            lines.push(StepLine {
                step,
                text: text.to_string(),
            });
        }

        (lines, current)
    }

    fn in_buildkit_tail(&self, line: &str) -> bool {
        self.buildkit_tail.iter().any(|shown| shown.contains(line))
    }

    /// Failure report: the error, the output that led to it and a hint
    pub fn failure_report(&self, error: &str) -> String {
        let mut report = error.to_string();

        let scrolled: Vec<&String> = self
            .errors
            .iter()
            .filter(|line| !self.tail.contains(line) && !self.in_buildkit_tail(line))
            .collect();
        append_section(&mut report, "Earlier build errors:", scrolled);
        append_section(&mut report, "Recent BuildKit output:", &self.buildkit_tail);
        append_section(&mut report, "Recent build output:", &self.tail);

        if self.tail.is_empty() && self.buildkit_tail.is_empty() {
            report.push_str("\n\nThe Docker daemon sent no build output.");
        }

        if let Some(hint) = failure_hint(error) {
            report.push_str("\n\nHint: ");
            report.push_str(hint);
        }
        report
    }
}

fn append_section<'a>(
    report: &mut String,
    title: &str,
    lines: impl IntoIterator<Item = &'a String>,
) {
    let mut lines = lines.into_iter().peekable();
    if lines.peek().is_none() {
        return;
    }
    report.push_str("\n\n");
    report.push_str(title);
    for line in lines {
        report.push_str("\n  ");
        report.push_str(line);
    }
}

/// Suggest a fix based on the failing step
fn failure_hint(error: &str) -> Option<&'static str> {
    let lower = error.to_lowercase();
    if lower.contains("no space") || lower.contains("disk quota") {
        Some("free space with 'docker system prune'.")
    } else if lower.contains("permission denied") {
        Some("add your user to the 'docker' group or run with access to the Docker socket.")
    } else if lower.contains("apt-get") {
        Some("installing tini failed; check that the daemon can reach deb.debian.org.")
    } else if lower.contains("cargo build") {
        Some("run 'cargo build --release --bin drone-riot-conv' locally to see compiler errors.")
    } else if ["network", "connection", "timeout", "resolve"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        Some("the build downloads crates and base images; check the daemon's network access.")
    } else if lower.contains("buildkit") || lower.contains("session") {
        Some("the build requires BuildKit (enabled by default since Docker 23).")
    } else {
        None
    }
}
