//! Progress reporting for image builds
//!
//! Spinners are drawn with indicatif on an interactive terminal. In plain
//! mode (CI logs, `--no-color`, non-tty stderr) raw build output is streamed
//! instead, and in hidden mode nothing is drawn at all.

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Interactive,
    Plain,
    Hidden,
}

/// Progress reporter for Docker operations
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    mode: Mode,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    /// Spinners when stderr is a terminal, plain output otherwise
    pub fn new() -> Self {
        if Term::stderr().is_term() {
            Self::with_mode(Mode::Interactive)
        } else {
            Self::with_mode(Mode::Plain)
        }
    }

    /// Stream raw build output to stderr without spinners
    pub fn plain() -> Self {
        Self::with_mode(Mode::Plain)
    }

    /// Report nothing
    pub fn hidden() -> Self {
        Self::with_mode(Mode::Hidden)
    }

    fn with_mode(mode: Mode) -> Self {
        let multi = match mode {
            Mode::Interactive => MultiProgress::new(),
            Mode::Plain | Mode::Hidden => {
                MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
            }
        };
        Self {
            multi,
            bars: HashMap::new(),
            mode,
        }
    }

    /// Whether raw build output should be printed instead of spinner updates
    pub fn is_plain_output(&self) -> bool {
        self.mode == Mode::Plain
    }

    /// Whether all output is suppressed
    pub fn is_hidden(&self) -> bool {
        self.mode == Mode::Hidden
    }

    /// Create a spinner for an indeterminate step
    pub fn add_spinner(&mut self, id: &str, message: &str) -> &ProgressBar {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        if self.mode == Mode::Interactive {
            spinner.enable_steady_tick(Duration::from_millis(100));
        } else if self.mode == Mode::Plain {
            eprintln!("{message}");
        }
        self.bars.insert(id.to_string(), spinner);
        &self.bars[id]
    }

    /// Update a spinner message, creating the spinner if needed
    pub fn update_spinner(&mut self, id: &str, message: &str) {
        if let Some(spinner) = self.bars.get(id) {
            spinner.set_message(message.trim_end().to_string());
        } else {
            self.add_spinner(id, message.trim_end());
        }
    }

    /// Mark a step as complete
    pub fn finish(&mut self, id: &str, message: &str) {
        if let Some(bar) = self.bars.get(id) {
            bar.finish_with_message(message.to_string());
        }
        if self.mode == Mode::Plain {
            eprintln!("{message}");
        }
    }

    /// Mark all progress as failed
    pub fn abandon_all(&self, message: &str) {
        for bar in self.bars.values() {
            bar.abandon_with_message(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_reporter_is_not_plain() {
        let reporter = ProgressReporter::hidden();
        assert!(reporter.is_hidden());
        assert!(!reporter.is_plain_output());
        assert!(reporter.bars.is_empty());
    }

    #[test]
    fn plain_reporter_reports_plain() {
        let reporter = ProgressReporter::plain();
        assert!(reporter.is_plain_output());
    }

    #[test]
    fn add_spinner_creates_entry() {
        let mut reporter = ProgressReporter::hidden();
        reporter.add_spinner("build", "Initializing...");
        assert!(reporter.bars.contains_key("build"));
        assert_eq!(reporter.bars["build"].message(), "Initializing...");
    }

    #[test]
    fn update_spinner_creates_if_missing() {
        let mut reporter = ProgressReporter::hidden();
        reporter.update_spinner("step", "Step 1/4\n");
        assert_eq!(reporter.bars["step"].message(), "Step 1/4");
        reporter.update_spinner("step", "Step 2/4");
        assert_eq!(reporter.bars.len(), 1);
        assert_eq!(reporter.bars["step"].message(), "Step 2/4");
    }

    #[test]
    fn finish_handles_missing_id() {
        let mut reporter = ProgressReporter::hidden();
        reporter.finish("nonexistent", "Done");
        reporter.abandon_all("Failed");
    }
}
