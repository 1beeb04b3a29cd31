//! Structured trial outcomes
//!
//! Labelled values are scraped from the program's output: every
//! `<name> = <value>` occurrence becomes a field, keyed by the lowercased
//! name. A `score` field is read as a float; when it is absent or not a
//! number the score is [`SCORE_SENTINEL`].

use crate::params::{ParameterSet, Task};
use console::style;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

/// Score reported for results without a usable `score` field
pub const SCORE_SENTINEL: f64 = -1.0;

/// Fields where a lower value is an improvement
pub const MINIMISED_FIELDS: &[&str] = &["runtime"];

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9 ]+) = ([A-Za-z0-9.+\-]+)").expect("field pattern is valid")
});

/// Raw output of one external execution
#[derive(Debug, Clone, Default)]
pub struct TrialOutput {
    /// Exit code, `None` when terminated by a signal
    pub returncode: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Extract `name = value` fields from program output
pub fn extract_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for caps in FIELD_PATTERN.captures_iter(text) {
        let name = caps[1].trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        fields.insert(name, caps[2].to_string());
    }
    fields
}

/// Outcome of one trial execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    task: Task,
    params: ParameterSet,
    /// Wall-clock seconds spent in the external program
    runtime: f64,
    returncode: Option<i32>,
    stdout: String,
    stderr: String,
    info: BTreeMap<String, String>,
}

impl TrialResult {
    /// Wrap raw output, extracting fields from both streams
    pub fn from_output(
        task: Task,
        params: ParameterSet,
        output: TrialOutput,
        runtime: Duration,
    ) -> Self {
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        Self {
            task,
            params,
            runtime: runtime.as_secs_f64(),
            returncode: output.returncode,
            info: extract_fields(&combined),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn runtime(&self) -> f64 {
        self.runtime
    }

    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Extracted fields, keyed by lowercased name
    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Whether the program exited with status zero
    pub fn succeeded(&self) -> bool {
        self.returncode == Some(0)
    }

    /// The `score` field, or [`SCORE_SENTINEL`]
    pub fn score(&self) -> f64 {
        self.info
            .get("score")
            .and_then(|s| s.parse().ok())
            .unwrap_or(SCORE_SENTINEL)
    }

    /// Numeric value of a named field.
    ///
    /// `score`, `runtime`, `task` and `returncode` are always available;
    /// other names are looked up among the extracted fields.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "score" => Some(self.score()),
            "runtime" => Some(self.runtime),
            "task" => Some(self.task as f64),
            "returncode" => self.returncode.map(f64::from),
            other => self.info.get(other).and_then(|s| s.parse().ok()),
        }
    }

    /// Human-readable summary sized to `width` columns
    pub fn report(&self, width: usize) -> String {
        let sep = "-".repeat(width.max(20));
        let mut out = String::new();

        let _ = writeln!(out, "{}", sep);
        let _ = writeln!(out, " Task {}", self.task);
        let _ = writeln!(out, "{}", sep);
        if !self.params.is_empty() {
            for (key, value) in &self.params {
                let _ = writeln!(out, " {}: {}", key, value);
            }
            let _ = writeln!(out, "{}", sep);
        }

        let _ = writeln!(out, " - score: {}", self.score());
        let _ = writeln!(out, " - runtime: {:.3}s", self.runtime);

        let _ = writeln!(out, " Other Information:");
        for (key, value) in self.info.iter().filter(|(k, _)| k.as_str() != "score") {
            let _ = writeln!(out, "   - {}: {}", key, value);
        }

        if !self.succeeded() {
            let code = self
                .returncode
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let _ = writeln!(out, "\n{} Return code was {}", style("ERROR:").red().bold(), code);
            for (label, stream) in [("STDOUT", &self.stdout), ("STDERR", &self.stderr)] {
                if !stream.trim().is_empty() {
                    let _ = writeln!(out, "{:-^width$}", format!(" {} ", label), width = sep.len());
                    let _ = writeln!(out, "{}\n", stream.trim());
                }
            }
        }

        let _ = writeln!(out, "{}", sep);
        out
    }

    /// Print the report to stdout using the terminal width
    pub fn pretty_print(&self) {
        let (_, cols) = console::Term::stdout().size();
        print!("{}", self.report(usize::from(cols)));
    }
}

impl std::fmt::Display for TrialResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<TrialResult task {} with score {:.6}>", self.task, self.score())
    }
}
