//! Shared typed models used across the catalog, the resolution pipeline and
//! the service layer.

use serde::{Deserialize, Serialize};

use crate::frames::pose::{Pose, StampedPose};

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// Identifier of a scaled model in the catalog.
pub type ModelId = i64;

/// A grasp as stored in the catalog, before it is mapped onto a physical
/// hand.  Joint vectors are in the catalog's own hand model ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGraspRecord {
    pub grasp_id: i64,
    pub scaled_model_id: ModelId,
    /// Planner energy.  Lower (more negative) is better.
    pub quality: f64,
    pub scaled_quality: f64,
    /// Clearance between the hand and the supporting table, in millimetres.
    pub table_clearance: f64,
    pub pre_grasp_joints: Vec<f64>,
    pub final_grasp_joints: Vec<f64>,
    /// Final hand pose relative to the model's own frame.
    pub final_grasp_pose: Pose,
}

/// A scaled model entry, as returned by model listings and descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledModel {
    pub scaled_model_id: ModelId,
    pub original_model_id: i64,
    pub scale: f64,
    pub name: String,
    pub maker: String,
    pub tags: Vec<String>,
}

/// Triangle mesh of a scaled model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

/// Human-readable description of a scaled model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub name: String,
    pub maker: String,
    pub tags: Vec<String>,
}

/// Metadata of a recorded sensor scan of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScan {
    #[serde(default)]
    pub scan_id: Option<i64>,
    pub scaled_model_id: ModelId,
    pub scan_source: String,
    pub cloud_topic: String,
    pub bagfile_location: String,
    /// Ground-truth object pose; its frame is the scan's frame.
    pub ground_truth_pose: StampedPose,
}

// ---------------------------------------------------------------------------
// Hand-side models
// ---------------------------------------------------------------------------

/// Catalog identifier and physical joint names of one arm's hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandProfile {
    pub catalog_hand_id: String,
    pub joint_names: Vec<String>,
}

/// Joint configuration of a physical hand.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub effort: Vec<f64>,
}

/// A grasp mapped onto a physical hand and expressed in the caller's frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGrasp {
    pub pre_grasp_posture: JointState,
    pub grasp_posture: JointState,
    pub grasp_pose: Pose,
    pub success_probability: f64,
    pub desired_approach_distance: f64,
    pub min_approach_distance: f64,
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One recognition hypothesis: a catalog model seen at a pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialModel {
    pub model_id: ModelId,
    pub pose: StampedPose,
    #[serde(default)]
    pub confidence: f64,
}

/// The object to grasp and the frame the caller wants grasps expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspTarget {
    /// Only the first entry is used.
    pub potential_models: Vec<PotentialModel>,
    pub reference_frame_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspPlanningRequest {
    pub arm_name: String,
    pub target: GraspTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    Success,
    InvalidRequest,
    ConfigurationMissing,
    CatalogUnavailable,
    TransformUnavailable,
}

impl ResolveStatus {
    pub fn is_success(self) -> bool {
        self == ResolveStatus::Success
    }

    /// Whether the caller may retry the identical request later.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ResolveStatus::CatalogUnavailable | ResolveStatus::TransformUnavailable
        )
    }
}

/// Either the full list of grasps with `Success`, or a failure status with
/// no grasps.  Never a partial list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspPlanningResponse {
    pub grasps: Vec<ResolvedGrasp>,
    pub status: ResolveStatus,
}

impl GraspPlanningResponse {
    pub fn success(grasps: Vec<ResolvedGrasp>) -> Self {
        Self {
            grasps,
            status: ResolveStatus::Success,
        }
    }

    pub fn failure(status: ResolveStatus) -> Self {
        Self {
            grasps: Vec::new(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialises_snake_case() {
        let json = serde_json::to_string(&ResolveStatus::TransformUnavailable).unwrap();
        assert_eq!(json, "\"transform_unavailable\"");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ResolveStatus::CatalogUnavailable.is_retryable());
        assert!(ResolveStatus::TransformUnavailable.is_retryable());
        assert!(!ResolveStatus::InvalidRequest.is_retryable());
        assert!(!ResolveStatus::ConfigurationMissing.is_retryable());
    }

    #[test]
    fn test_request_parses_without_optional_fields() {
        let request: GraspPlanningRequest = serde_json::from_str(
            r#"{
                "arm_name": "right_arm",
                "target": {
                    "reference_frame_id": "base_link",
                    "potential_models": [{
                        "model_id": 18744,
                        "pose": {
                            "frame_id": "head_camera",
                            "pose": {"position": [0.5, 0.0, 0.8], "orientation": [0, 0, 0, 1]}
                        }
                    }]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(request.target.potential_models[0].model_id, 18744);
        assert_eq!(request.target.potential_models[0].pose.stamp, 0.0);
        assert_eq!(request.target.potential_models[0].confidence, 0.0);
    }
}
