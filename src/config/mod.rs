//! Configuration management for Relentless

pub mod schema;

pub use schema::{CacheConfig, Config, GeneralConfig, ProjectConfig, ProjectProfile, SweepConfig};

use crate::error::{RelentlessError, RelentlessResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relentless")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> RelentlessResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        read_toml(&self.config_path).await
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RelentlessResult<()> {
        write_toml(&self.config_path, config).await?;
        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted construction choices for one project
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Profile stored inside a project state directory
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("profile.toml"),
        }
    }

    /// Load the stored profile; a missing file is an empty profile
    pub async fn load(&self) -> RelentlessResult<ProjectProfile> {
        if !self.path.exists() {
            return Ok(ProjectProfile::default());
        }
        read_toml(&self.path).await
    }

    /// Persist a profile, replacing the previous one
    pub async fn save(&self, profile: &ProjectProfile) -> RelentlessResult<()> {
        write_toml(&self.path, profile).await?;
        debug!("Project profile saved to {}", self.path.display());
        Ok(())
    }

    /// Merge explicit choices over the stored profile and store the result.
    ///
    /// With `auto_profile` disabled the stored profile is ignored, but the
    /// resolved choices are still written back.
    pub async fn resolve(
        &self,
        explicit: &ProjectProfile,
        auto_profile: bool,
    ) -> RelentlessResult<ProjectProfile> {
        let stored = if auto_profile {
            self.load().await?
        } else {
            ProjectProfile::default()
        };

        let resolved = ProjectProfile {
            computation_type: explicit.computation_type.or(stored.computation_type),
            computation_wrapper: explicit
                .computation_wrapper
                .clone()
                .or(stored.computation_wrapper),
            computation_wrapper_vis: explicit
                .computation_wrapper_vis
                .clone()
                .or(stored.computation_wrapper_vis),
            build_command: explicit.build_command.clone().or(stored.build_command),
        };

        self.save(&resolved).await?;
        Ok(resolved)
    }

    /// Get the profile file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> RelentlessResult<T> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| RelentlessError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| RelentlessError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn write_toml<T: serde::Serialize>(path: &Path, value: &T) -> RelentlessResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| RelentlessError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let content = toml::to_string_pretty(value)?;
    fs::write(path, content)
        .await
        .map_err(|e| RelentlessError::io(format!("writing config to {}", path.display()), e))
}
