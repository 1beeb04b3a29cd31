//! Computations: building a candidate program and running trials with it
//!
//! - `simple`: run the built executable directly, or through a wrapper
//!   command template
//! - `marathon`: the same, defaulting to the external `tester.jar` grader

mod factory;
mod gate;
pub mod result;
mod runtime;
mod simple;

pub use factory::{create_computation, ComputationKind, ComputationSpec};
pub use gate::BuildGate;
pub use result::{extract_fields, TrialOutput, TrialResult, MINIMISED_FIELDS, SCORE_SENTINEL};
pub use runtime::Computation;
pub use simple::SimpleComputation;

use crate::error::{RelentlessError, RelentlessResult};
use crate::params::Task;
use std::path::Path;

/// Max number of build log lines echoed into the logs on failure.
const BUILD_ERROR_TAIL_LINES: usize = 20;

/// Values substituted into command templates
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub project: &'a Path,
    pub src_dir: &'a Path,
    pub working_dir: &'a Path,
    pub task: Task,
}

/// Expand `{project}`, `{src_dir}`, `{working_dir}` and `{task}` in a
/// command template and split it into an argument vector.
///
/// The template is split before substitution, so paths containing spaces
/// stay single arguments.
pub fn expand_command(template: &str, vars: &TemplateVars<'_>) -> RelentlessResult<Vec<String>> {
    let invalid = |reason: &str| RelentlessError::InvalidCommand {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let words = shlex::split(template).ok_or_else(|| invalid("unbalanced quotes"))?;
    if words.is_empty() {
        return Err(invalid("empty command"));
    }

    let task = vars.task.to_string();
    Ok(words
        .into_iter()
        .map(|word| {
            word.replace("{project}", &vars.project.to_string_lossy())
                .replace("{src_dir}", &vars.src_dir.to_string_lossy())
                .replace("{working_dir}", &vars.working_dir.to_string_lossy())
                .replace("{task}", &task)
        })
        .collect())
}

/// The last `BUILD_ERROR_TAIL_LINES` lines of a build log.
pub(crate) fn build_error_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}
