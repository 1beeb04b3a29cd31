//! Computation factory
//!
//! Maps a configured variant name to a concrete computation.

use crate::computation::runtime::Computation;
use crate::computation::simple::SimpleComputation;
use crate::config::ProjectProfile;
use crate::context::BuildContext;
use crate::error::RelentlessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const MARATHON_WRAPPER: &str = "java -jar {src_dir}/tester.jar -exec {project} -seed {task} -novis";
const MARATHON_WRAPPER_VIS: &str = "java -jar {src_dir}/tester.jar -exec {project} -seed {task}";

/// Available computation variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputationKind {
    /// Run the built executable directly or through a custom wrapper
    #[default]
    #[serde(alias = "SimpleComputation")]
    Simple,
    /// Run through the marathon-match `tester.jar` grader
    #[serde(alias = "MarathonComputation")]
    Marathon,
}

impl ComputationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Marathon => "marathon",
        }
    }

    /// Wrapper templates used when none are configured
    fn default_wrappers(&self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            Self::Simple => (None, None),
            Self::Marathon => (Some(MARATHON_WRAPPER), Some(MARATHON_WRAPPER_VIS)),
        }
    }
}

impl FromStr for ComputationKind {
    type Err = RelentlessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" | "SimpleComputation" => Ok(Self::Simple),
            "marathon" | "MarathonComputation" => Ok(Self::Marathon),
            other => Err(RelentlessError::InvalidComputationKind(other.to_string())),
        }
    }
}

impl fmt::Display for ComputationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything needed to construct a computation, apart from its context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputationSpec {
    pub kind: ComputationKind,
    /// Executable name relative to the working directory
    pub project: String,
    pub wrapper: Option<String>,
    pub wrapper_vis: Option<String>,
    pub build_command: Option<String>,
}

impl ComputationSpec {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            kind: ComputationKind::default(),
            project: project.into(),
            wrapper: None,
            wrapper_vis: None,
            build_command: None,
        }
    }

    /// Spec from resolved project profile choices
    pub fn from_profile(project: impl Into<String>, profile: &ProjectProfile) -> Self {
        Self {
            kind: profile.computation_type.unwrap_or_default(),
            project: project.into(),
            wrapper: profile.computation_wrapper.clone(),
            wrapper_vis: profile.computation_wrapper_vis.clone(),
            build_command: profile.build_command.clone(),
        }
    }
}

/// Create the computation selected by `spec`, building in `context`
pub fn create_computation(spec: &ComputationSpec, context: BuildContext) -> Arc<dyn Computation> {
    let (default_wrapper, default_wrapper_vis) = spec.kind.default_wrappers();
    let wrapper = spec
        .wrapper
        .clone()
        .or_else(|| default_wrapper.map(str::to_string));
    let wrapper_vis = spec
        .wrapper_vis
        .clone()
        .or_else(|| default_wrapper_vis.map(str::to_string));

    Arc::new(
        SimpleComputation::new(spec.project.clone(), context)
            .with_kind(spec.kind)
            .with_wrappers(wrapper, wrapper_vis)
            .with_build_command(spec.build_command.clone()),
    )
}
