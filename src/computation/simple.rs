//! Make-built executable computation
//!
//! Builds `<project>` with `make` in the working directory (through the
//! bundled makefile when the project has none) and runs the resulting
//! executable, optionally through a wrapper command template. Parameters
//! reach the program as `RELENTLESS_*` environment variables.

use crate::computation::factory::ComputationKind;
use crate::computation::gate::BuildGate;
use crate::computation::result::{TrialOutput, TrialResult};
use crate::computation::runtime::Computation;
use crate::computation::{build_error_tail, expand_command, TemplateVars};
use crate::context::BuildContext;
use crate::error::{RelentlessError, RelentlessResult};
use crate::params::{to_env, ParameterSet, Task};
use async_trait::async_trait;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Makefile fed to `make -f -` for projects without their own.
///
/// Relies on make's implicit rules to turn `<project>.cpp` or `<project>.c`
/// into `<project>`.
const BUNDLED_MAKEFILE: &str = "\
CXX ?= g++
CXXFLAGS ?= -O2 -std=c++11 -Wall
CFLAGS ?= -O2 -Wall
";

/// Computation running a make-built executable
pub struct SimpleComputation {
    kind: ComputationKind,
    project: String,
    context: BuildContext,
    wrapper: Option<String>,
    wrapper_vis: Option<String>,
    build_command: Option<String>,
    gate: BuildGate,
}

/// How the build step is invoked
struct BuildInvocation {
    argv: Vec<String>,
    /// Makefile content to pipe on stdin
    stdin_makefile: Option<&'static str>,
}

impl SimpleComputation {
    /// Create a computation for `project` (an executable name) in `context`
    pub fn new(project: impl Into<String>, context: BuildContext) -> Self {
        Self {
            kind: ComputationKind::Simple,
            project: project.into(),
            context,
            wrapper: None,
            wrapper_vis: None,
            build_command: None,
            gate: BuildGate::new(),
        }
    }

    /// Set the variant this computation reports itself as
    pub fn with_kind(mut self, kind: ComputationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the wrapper templates for normal and visual runs
    pub fn with_wrappers(mut self, wrapper: Option<String>, wrapper_vis: Option<String>) -> Self {
        self.wrapper = wrapper;
        self.wrapper_vis = wrapper_vis;
        self
    }

    /// Replace `make` with a custom build command template
    pub fn with_build_command(mut self, build_command: Option<String>) -> Self {
        self.build_command = build_command;
        self
    }

    /// Path of the built executable
    pub fn project_path(&self) -> PathBuf {
        self.context.working_dir().join(&self.project)
    }

    fn vars<'a>(&'a self, project: &'a std::path::Path, task: Task) -> TemplateVars<'a> {
        TemplateVars {
            project,
            src_dir: self.context.src_dir(),
            working_dir: self.context.working_dir(),
            task,
        }
    }

    fn build_invocation(&self) -> RelentlessResult<BuildInvocation> {
        if let Some(ref template) = self.build_command {
            let project = self.project_path();
            return Ok(BuildInvocation {
                argv: expand_command(template, &self.vars(&project, 0))?,
                stdin_makefile: None,
            });
        }

        if self.context.working_dir().join("Makefile").exists() {
            Ok(BuildInvocation {
                argv: vec!["make".to_string(), self.project.clone()],
                stdin_makefile: None,
            })
        } else {
            Ok(BuildInvocation {
                argv: vec![
                    "make".to_string(),
                    "-f".to_string(),
                    "-".to_string(),
                    self.project.clone(),
                ],
                stdin_makefile: Some(BUNDLED_MAKEFILE),
            })
        }
    }

    async fn build(&self) -> RelentlessResult<()> {
        let log_path = self.context.build_log_path();
        let log = File::create(&log_path).map_err(|e| {
            RelentlessError::io(format!("creating build log {}", log_path.display()), e)
        })?;
        let log_err = log
            .try_clone()
            .map_err(|e| RelentlessError::io("duplicating build log handle", e))?;

        let invocation = self.build_invocation()?;
        info!("Building {} in {}", self.project, self.context);
        debug!("Executing: {:?}", invocation.argv);

        let stdin = if invocation.stdin_makefile.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&invocation.argv[0])
            .args(&invocation.argv[1..])
            .current_dir(self.context.working_dir())
            .stdin(stdin)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelentlessError::command_failed(invocation.argv.join(" "), e))?;

        if let (Some(makefile), Some(mut pipe)) = (invocation.stdin_makefile, child.stdin.take()) {
            pipe.write_all(makefile.as_bytes())
                .await
                .map_err(|e| RelentlessError::io("writing bundled makefile", e))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| RelentlessError::command_failed(invocation.argv.join(" "), e))?;

        if !status.success() {
            let log_text = std::fs::read_to_string(&log_path).unwrap_or_default();
            warn!("Build failed:\n{}", build_error_tail(&log_text));
            return Err(RelentlessError::BuildFailed {
                context: self.context.to_string(),
                log: log_path,
            });
        }

        debug!("Build of {} complete", self.project);
        Ok(())
    }

    fn trial_argv(&self, task: Task, vis: bool) -> RelentlessResult<Vec<String>> {
        let wrapper = match (&self.wrapper, &self.wrapper_vis) {
            (_, Some(vis_wrapper)) if vis => Some(vis_wrapper),
            (wrapper, _) => wrapper.as_ref(),
        };

        let project = self.project_path();
        match wrapper {
            None => Ok(vec![project.to_string_lossy().into_owned()]),
            Some(template) => expand_command(template, &self.vars(&project, task)),
        }
    }
}

#[async_trait]
impl Computation for SimpleComputation {
    fn context(&self) -> &BuildContext {
        &self.context
    }

    fn is_built(&self) -> bool {
        self.gate.is_built()
    }

    async fn ensure_built(&self) -> RelentlessResult<()> {
        self.gate.ensure_built(|| self.build()).await
    }

    async fn run_trial(
        &self,
        task: Task,
        params: &ParameterSet,
        vis: bool,
    ) -> RelentlessResult<TrialResult> {
        if !self.is_built() {
            self.ensure_built().await?;
        }

        let argv = self.trial_argv(task, vis)?;
        debug!("Running task {}: {:?}", task, argv);

        let started = Instant::now();
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .envs(to_env(params))
            .current_dir(self.context.working_dir())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RelentlessError::command_failed(argv.join(" "), e))?;
        let runtime = started.elapsed();

        let result = TrialResult::from_output(
            task,
            params.clone(),
            TrialOutput {
                returncode: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            runtime,
        );

        if !result.succeeded() {
            warn!(
                "Task {} exited with status {:?}\n{}\n{}",
                task,
                result.returncode(),
                result.stdout().trim(),
                result.stderr().trim()
            );
        }

        Ok(result)
    }

    fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn computation(dir: &TempDir) -> SimpleComputation {
        SimpleComputation::new("solver", BuildContext::new(dir.path()).with_src_dir("/opt/src"))
    }

    #[test]
    fn direct_run_uses_built_executable() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir);
        let argv = c.trial_argv(4, false).unwrap();
        assert_eq!(argv, vec![dir.path().join("solver").to_string_lossy().into_owned()]);
    }

    #[test]
    fn visual_wrapper_only_when_requested() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir).with_wrappers(
            Some("grade {project} {task}".to_string()),
            Some("show {project} {task}".to_string()),
        );
        assert_eq!(c.trial_argv(2, false).unwrap()[0], "grade");
        assert_eq!(c.trial_argv(2, true).unwrap()[0], "show");
        assert_eq!(c.trial_argv(2, true).unwrap()[2], "2");
    }

    #[test]
    fn visual_run_falls_back_to_wrapper() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir).with_wrappers(Some("grade {src_dir}".to_string()), None);
        assert_eq!(c.trial_argv(1, true).unwrap(), vec!["grade", "/opt/src"]);
    }

    #[test]
    fn build_uses_project_makefile_when_present() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Makefile"), "solver:\n\ttrue\n").unwrap();
        let invocation = computation(&dir).build_invocation().unwrap();
        assert_eq!(invocation.argv, vec!["make", "solver"]);
        assert!(invocation.stdin_makefile.is_none());
    }

    #[test]
    fn build_falls_back_to_bundled_makefile() {
        let dir = TempDir::new().unwrap();
        let invocation = computation(&dir).build_invocation().unwrap();
        assert_eq!(invocation.argv, vec!["make", "-f", "-", "solver"]);
        assert_eq!(invocation.stdin_makefile, Some(BUNDLED_MAKEFILE));
    }

    #[test]
    fn build_command_template_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Makefile"), "").unwrap();
        let c = computation(&dir).with_build_command(Some("cc -o {project} main.c".to_string()));
        let invocation = c.build_invocation().unwrap();
        assert_eq!(invocation.argv[0], "cc");
        assert_eq!(invocation.argv[2], dir.path().join("solver").to_string_lossy());
    }

    #[tokio::test]
    async fn failing_build_reports_log() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir).with_build_command(Some("sh -c 'echo broken >&2; exit 1'".to_string()));

        let err = c.ensure_built().await.unwrap_err();
        match err {
            RelentlessError::BuildFailed { log, .. } => {
                assert_eq!(log, dir.path().join("compile.log"));
                assert!(std::fs::read_to_string(log).unwrap().contains("broken"));
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
        assert!(!c.is_built());
    }

    #[tokio::test]
    async fn trial_receives_parameters_and_task() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir)
            .with_build_command(Some("true".to_string()))
            .with_wrappers(
                Some("sh -c 'echo \"Score = $RELENTLESS_X\"; echo \"Task = $0\"' {task}".to_string()),
                None,
            );

        let mut params = ParameterSet::new();
        params.insert("x".to_string(), 7.into());

        let result = c.run_trial(5, &params, false).await.unwrap();
        assert!(c.is_built());
        assert!(result.succeeded());
        assert_eq!(result.score(), 7.0);
        assert_eq!(result.info()["task"], "5");
        assert_eq!(result.params(), &params);
    }

    #[tokio::test]
    async fn abandoned_trial_kills_its_process() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir)
            .with_build_command(Some("true".to_string()))
            .with_wrappers(Some("sh -c 'sleep 1; touch finished'".to_string()), None);

        let params = ParameterSet::new();
        let trial = c.run_trial(1, &params, false);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(200), trial)
            .await
            .is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!dir.path().join("finished").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_result() {
        let dir = TempDir::new().unwrap();
        let c = computation(&dir)
            .with_build_command(Some("true".to_string()))
            .with_wrappers(Some("sh -c 'echo oops >&2; exit 3'".to_string()), None);

        let result = c.run_trial(1, &ParameterSet::new(), false).await.unwrap();
        assert_eq!(result.returncode(), Some(3));
        assert_eq!(result.score(), -1.0);
        assert!(result.stderr().contains("oops"));
    }
}
