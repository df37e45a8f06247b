//! Hand description parameters, keyed by arm name.
//!
//! The parameter layout mirrors the robot's parameter tree:
//! `/hand_description/<arm>/hand_database_name` and
//! `/hand_description/<arm>/hand_joints`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::expand_tilde;
use crate::errors::{GraspDbError, GraspDbResult};

/// Parameter name for the catalog identifier of an arm's hand.
pub fn hand_database_name_param(arm_name: &str) -> String {
    format!("/hand_description/{arm_name}/hand_database_name")
}

/// Parameter name for the ordered joint names of an arm's hand.
pub fn hand_joints_param(arm_name: &str) -> String {
    format!("/hand_description/{arm_name}/hand_joints")
}

/// Source of per-arm hand parameters.
pub trait HandDescriptionSource: Send + Sync {
    fn hand_database_name(&self, arm_name: &str) -> Option<String>;
    fn hand_joint_names(&self, arm_name: &str) -> Option<Vec<String>>;
}

/// Parameters for a single arm.  Either field may be missing in a partially
/// configured deployment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmHandDescription {
    #[serde(default)]
    pub hand_database_name: Option<String>,
    #[serde(default)]
    pub hand_joints: Option<Vec<String>>,
}

/// In-memory hand description table, usually loaded from a JSON document
/// shaped like `{"hand_description": {"<arm>": {...}}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandDescriptions {
    #[serde(default)]
    pub hand_description: BTreeMap<String, ArmHandDescription>,
}

impl HandDescriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> GraspDbResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> GraspDbResult<Self> {
        let resolved = expand_tilde(&path.to_string_lossy());
        let text = std::fs::read_to_string(&resolved).map_err(|e| {
            GraspDbError::Config(format!(
                "cannot read hand description file {}: {e}",
                resolved.display()
            ))
        })?;
        Self::from_json_str(&text)
    }

    /// Builder-style helper for a fully described arm.
    pub fn with_arm(
        mut self,
        arm_name: &str,
        hand_database_name: &str,
        hand_joints: &[&str],
    ) -> Self {
        self.hand_description.insert(
            arm_name.to_string(),
            ArmHandDescription {
                hand_database_name: Some(hand_database_name.to_string()),
                hand_joints: Some(hand_joints.iter().map(|j| j.to_string()).collect()),
            },
        );
        self
    }

    pub fn arms(&self) -> impl Iterator<Item = &str> {
        self.hand_description.keys().map(String::as_str)
    }
}

impl HandDescriptionSource for HandDescriptions {
    fn hand_database_name(&self, arm_name: &str) -> Option<String> {
        self.hand_description
            .get(arm_name)
            .and_then(|arm| arm.hand_database_name.clone())
    }

    fn hand_joint_names(&self, arm_name: &str) -> Option<Vec<String>> {
        self.hand_description
            .get(arm_name)
            .and_then(|arm| arm.hand_joints.clone())
    }
}
