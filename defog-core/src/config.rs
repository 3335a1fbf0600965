//! Run configuration.
//!
//! Immutable for one run; the CLI translates flags onto this record. No
//! environment variables are consumed here.

use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// What to do with helper definitions and initializer blocks that become
/// provably dead after rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupMode {
    /// Leave dead code intact
    #[default]
    None,
    /// Wrap the printed form in a `[cleanup]` block comment
    Comment,
    /// Delete the node
    Remove,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Selects helper routines by identifier name.
    pub intercept_pattern: Regex,
    /// Further restricts which helpers are evaluated (not which are extracted).
    pub function_name_filter: Option<Regex>,
    /// Inclusive argument-count window for rewriting a call.
    pub min_args: usize,
    pub max_args: usize,
    /// Enables the reversed-string-literal normalizer.
    pub string_reverse: bool,
    /// Enables call extraction, evaluation and rewriting.
    pub function_calls: bool,
    /// Evaluate but do not rewrite.
    pub disable_replace: bool,
    pub cleanup_mode: CleanupMode,
    /// Diagnostics only, no semantic effect.
    pub verbose: bool,
    pub debug: bool,
    pub trace_lines: bool,
    /// Where the harness writes the JSON call trace, if anywhere.
    pub debug_output_path: Option<PathBuf>,
    /// Wall-clock budget for the sandbox evaluation.
    pub eval_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            intercept_pattern: Regex::new(r"^f\d+$").unwrap(),
            function_name_filter: None,
            min_args: 4,
            max_args: 6,
            string_reverse: true,
            function_calls: true,
            disable_replace: false,
            cleanup_mode: CleanupMode::None,
            verbose: false,
            debug: false,
            trace_lines: false,
            debug_output_path: None,
            eval_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Whether `name` selects a helper for extraction.
    pub fn matches_helper(&self, name: &str) -> bool {
        self.intercept_pattern.is_match(name)
    }

    /// Whether `name` passes the evaluation filter as well.
    pub fn matches_evaluated(&self, name: &str) -> bool {
        self.matches_helper(name)
            && self
                .function_name_filter
                .as_ref()
                .map(|f| f.is_match(name))
                .unwrap_or(true)
    }

    /// Whether an argument count falls inside the rewrite window.
    pub fn arg_count_in_window(&self, count: usize) -> bool {
        count >= self.min_args && count <= self.max_args
    }
}
