//! Configuration schema for Relentless
//!
//! Global configuration is stored at `~/.config/relentless/config.toml`.
//! Per-project construction choices are stored in the project's state
//! directory as `profile.toml`.

use crate::computation::ComputationKind;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Sweep execution settings
    pub sweep: SweepConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Project layout settings
    pub project: ProjectConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Sweep execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Worker pool size for parallel sweeps (0 = available CPUs)
    pub workers: usize,

    /// Show a progress bar while sweeping
    pub progress: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            progress: true,
        }
    }
}

impl SweepConfig {
    /// Resolve the configured worker count to a concrete pool size
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable result caching (default: true)
    pub enabled: bool,

    /// Cache store file name inside the project state directory
    pub file_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: "tester_cache.json".to_string(),
        }
    }
}

/// Project layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// State directory created next to the project source
    pub state_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            state_dir: "_relentless".to_string(),
        }
    }
}

/// Construction-time choices remembered per project
///
/// Every field is optional so that an absent value falls through to the
/// built-in default on the next invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectProfile {
    /// Computation variant used to build and run the project
    pub computation_type: Option<ComputationKind>,

    /// Wrapper command template for trial runs
    pub computation_wrapper: Option<String>,

    /// Wrapper command template for visual trial runs
    pub computation_wrapper_vis: Option<String>,

    /// Build command template overriding `make`
    pub build_command: Option<String>,
}
