//! Service configuration: a JSON file overlaid with `GRASPDB_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GraspDbError, GraspDbResult};
use crate::grasp::filter::FilterPolicy;
use crate::grasp::guards::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_PROFILE_CACHE_ENTRIES, DEFAULT_PRUNE_GRIPPER_OPENING,
    DEFAULT_PRUNE_TABLE_CLEARANCE, DEFAULT_QUALITY_EXCLUSION_THRESHOLD,
};

pub const ENV_DATABASE_PATH: &str = "GRASPDB_DATABASE_PATH";
pub const ENV_HAND_DESCRIPTION: &str = "GRASPDB_HAND_DESCRIPTION";
pub const ENV_FILTER_MODE: &str = "GRASPDB_FILTER_MODE";
pub const ENV_BUSY_TIMEOUT_MS: &str = "GRASPDB_BUSY_TIMEOUT_MS";

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    QualityCutoff,
    GripperAndClearance,
}

impl FilterMode {
    pub fn parse(value: &str) -> GraspDbResult<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "quality_cutoff" | "quality" => Ok(FilterMode::QualityCutoff),
            "gripper_and_clearance" | "gripper" => Ok(FilterMode::GripperAndClearance),
            other => Err(GraspDbError::Config(format!(
                "unknown filter mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Catalog location.  `None` starts the service without a catalog.
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub hand_description_path: Option<PathBuf>,
    pub prune_gripper_opening: f64,
    /// Metres.  Negative disables the clearance test.
    pub prune_table_clearance: f64,
    pub filter_mode: FilterMode,
    pub quality_exclusion_threshold: f64,
    pub profile_cache_entries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            hand_description_path: None,
            prune_gripper_opening: DEFAULT_PRUNE_GRIPPER_OPENING,
            prune_table_clearance: DEFAULT_PRUNE_TABLE_CLEARANCE,
            filter_mode: FilterMode::default(),
            quality_exclusion_threshold: DEFAULT_QUALITY_EXCLUSION_THRESHOLD,
            profile_cache_entries: DEFAULT_PROFILE_CACHE_ENTRIES,
        }
    }
}

impl ServiceConfig {
    pub fn from_json_str(text: &str) -> GraspDbResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> GraspDbResult<Self> {
        let resolved = expand_tilde(&path.to_string_lossy());
        let text = std::fs::read_to_string(&resolved).map_err(|e| {
            GraspDbError::Config(format!(
                "cannot read service config {}: {e}",
                resolved.display()
            ))
        })?;
        Self::from_json_str(&text)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> GraspDbResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load `path` (when given), then let the environment override it.
    pub fn load(path: Option<&Path>) -> GraspDbResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> GraspDbResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `GRASPDB_*` names.
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> GraspDbResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DATABASE_PATH) {
            self.database_path = Some(expand_tilde(path.trim()));
        }
        if let Some(path) = get(ENV_HAND_DESCRIPTION) {
            self.hand_description_path = Some(expand_tilde(path.trim()));
        }
        if let Some(mode) = get(ENV_FILTER_MODE) {
            self.filter_mode = FilterMode::parse(&mode)?;
        }
        if let Some(timeout) = get(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = timeout.trim().parse::<u64>().map_err(|_| {
                GraspDbError::Config(format!(
                    "{ENV_BUSY_TIMEOUT_MS} must be a non-negative integer, got '{timeout}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        match self.filter_mode {
            FilterMode::QualityCutoff => FilterPolicy::QualityCutoff {
                exclusion_threshold: self.quality_exclusion_threshold,
            },
            FilterMode::GripperAndClearance => FilterPolicy::GripperAndClearance {
                gripper_opening: self.prune_gripper_opening,
                table_clearance: self.prune_table_clearance,
            },
        }
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }
}
