//! Database grasp planning: turn a recognised object into executable grasps.
//!
//! One request runs these stages in order:
//!
//! 1. validate the target and pick its first potential model,
//! 2. resolve the arm's hand profile,
//! 3. fetch the model's cluster-representative grasps for that hand,
//! 4. prune them,
//! 5. map every survivor onto the physical hand and into the reference frame.
//!
//! Stages 1-3 and any transform failure abort the request with no grasps.
//! A record whose joint vectors do not fit the hand is skipped.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::errors::{GraspDbResult, ResolveError};
use crate::frames::tree::TransformProvider;
use crate::grasp::compose::PoseCompositor;
use crate::grasp::filter::{filter_grasps, FilterPolicy};
use crate::grasp::guards::{DESIRED_APPROACH_DISTANCE, MIN_APPROACH_DISTANCE};
use crate::grasp::layout::{adapt, HandLayout};
use crate::hand::profile::HandProfileResolver;
use crate::models::{
    GraspPlanningRequest, GraspPlanningResponse, ModelId, RawGraspRecord, ResolvedGrasp,
};

/// Read access to stored grasps.
pub trait GraspCatalog: Send + Sync {
    /// Cluster-representative grasps of `model_id` for `hand_id`, in catalog
    /// order.
    fn cluster_rep_grasps(
        &self,
        model_id: ModelId,
        hand_id: &str,
    ) -> GraspDbResult<Vec<RawGraspRecord>>;
}

pub struct GraspPlanner {
    catalog: Arc<dyn GraspCatalog>,
    profiles: HandProfileResolver,
    transforms: Arc<dyn TransformProvider>,
    policy: FilterPolicy,
}

impl GraspPlanner {
    pub fn new(
        catalog: Arc<dyn GraspCatalog>,
        profiles: HandProfileResolver,
        transforms: Arc<dyn TransformProvider>,
        policy: FilterPolicy,
    ) -> Self {
        Self {
            catalog,
            profiles,
            transforms,
            policy,
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    pub fn profiles(&self) -> &HandProfileResolver {
        &self.profiles
    }

    /// Plan and fold the outcome into a response.  Failures never carry
    /// partial grasps.
    pub fn plan(&self, request: &GraspPlanningRequest) -> GraspPlanningResponse {
        match self.try_plan(request) {
            Ok(grasps) => GraspPlanningResponse::success(grasps),
            Err(err) => GraspPlanningResponse::failure(err.status()),
        }
    }

    pub fn try_plan(
        &self,
        request: &GraspPlanningRequest,
    ) -> Result<Vec<ResolvedGrasp>, ResolveError> {
        let target = &request.target;
        let candidate = match target.potential_models.as_slice() {
            [] => {
                error!(
                    arm_name = %request.arm_name,
                    "grasp planner: target has no potential models"
                );
                return Err(ResolveError::InvalidRequest {
                    reason: "target has no potential models".to_string(),
                });
            }
            [only] => only,
            [first, ..] => {
                warn!(
                    arm_name = %request.arm_name,
                    candidates = target.potential_models.len(),
                    model_id = first.model_id,
                    "grasp planner: multiple potential models; only the first is used"
                );
                first
            }
        };

        let profile = self.profiles.resolve(&request.arm_name)?;
        let hand_id = profile.catalog_hand_id.as_str();

        let records = self
            .catalog
            .cluster_rep_grasps(candidate.model_id, hand_id)
            .map_err(|e| {
                error!(
                    model_id = candidate.model_id,
                    hand_id,
                    error = %e,
                    "grasp planner: catalog query failed"
                );
                ResolveError::CatalogUnavailable {
                    model_id: candidate.model_id,
                    hand_id: hand_id.to_string(),
                }
            })?;
        info!(
            model_id = candidate.model_id,
            hand_id,
            retrieved = records.len(),
            "grasp planner: retrieved grasps from catalog"
        );

        let report = filter_grasps(records, &self.policy);

        let layout = HandLayout::for_hand(hand_id);
        let mut compositor = PoseCompositor::new(
            &candidate.pose,
            &target.reference_frame_id,
            self.transforms.as_ref(),
        );
        let mut grasps = Vec::with_capacity(report.survivors.len());
        let mut skipped = 0usize;
        for record in &report.survivors {
            let postures = match adapt(record, &profile) {
                Ok(postures) => postures,
                Err(mismatch) => {
                    error!(
                        grasp_id = record.grasp_id,
                        hand_id,
                        layout = layout.name(),
                        error = %mismatch,
                        "grasp planner: stored grasp does not fit hand, skipping"
                    );
                    skipped += 1;
                    continue;
                }
            };
            let grasp_pose = compositor.compose(&record.final_grasp_pose)?;
            grasps.push(ResolvedGrasp {
                pre_grasp_posture: postures.pre_grasp,
                grasp_posture: postures.grasp,
                grasp_pose,
                success_probability: record.scaled_quality,
                desired_approach_distance: DESIRED_APPROACH_DISTANCE,
                min_approach_distance: MIN_APPROACH_DISTANCE,
            });
        }

        info!(
            arm_name = %request.arm_name,
            model_id = candidate.model_id,
            returned = grasps.len(),
            skipped,
            "grasp planner: returning grasps"
        );
        Ok(grasps)
    }
}
