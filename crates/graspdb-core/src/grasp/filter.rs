//! Pruning of catalog grasps before they are mapped onto a hand.
//!
//! The deployed criterion is a fixed cut on the stored quality energy.  The
//! gripper-opening / table-clearance criterion the pruning parameters were
//! meant to drive is kept as a second, opt-in policy.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grasp::guards::{
    DEFAULT_PRUNE_GRIPPER_OPENING, DEFAULT_PRUNE_TABLE_CLEARANCE,
    DEFAULT_QUALITY_EXCLUSION_THRESHOLD, TABLE_CLEARANCE_MM_PER_M,
};
use crate::models::RawGraspRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Drop every grasp with `quality >= exclusion_threshold`.
    QualityCutoff { exclusion_threshold: f64 },
    /// Drop grasps whose final gripper opening exceeds `gripper_opening`, or
    /// whose table clearance is below `table_clearance` metres.  A negative
    /// `table_clearance` disables the clearance test.
    GripperAndClearance {
        gripper_opening: f64,
        table_clearance: f64,
    },
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy::QualityCutoff {
            exclusion_threshold: DEFAULT_QUALITY_EXCLUSION_THRESHOLD,
        }
    }
}

impl FilterPolicy {
    pub fn gripper_and_clearance_defaults() -> Self {
        FilterPolicy::GripperAndClearance {
            gripper_opening: DEFAULT_PRUNE_GRIPPER_OPENING,
            table_clearance: DEFAULT_PRUNE_TABLE_CLEARANCE,
        }
    }

    /// Whether `record` must be removed under this policy.
    pub fn prunes(&self, record: &RawGraspRecord) -> bool {
        match *self {
            FilterPolicy::QualityCutoff {
                exclusion_threshold,
            } => record.quality >= exclusion_threshold,
            FilterPolicy::GripperAndClearance {
                gripper_opening,
                table_clearance,
            } => {
                let too_open = record
                    .final_grasp_joints
                    .first()
                    .is_some_and(|&opening| opening > gripper_opening);
                let too_close = table_clearance >= 0.0
                    && record.table_clearance < table_clearance * TABLE_CLEARANCE_MM_PER_M;
                too_open || too_close
            }
        }
    }
}

/// Survivors of a pruning pass, in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneReport {
    pub survivors: Vec<RawGraspRecord>,
    pub pruned: usize,
}

pub fn filter_grasps(records: Vec<RawGraspRecord>, policy: &FilterPolicy) -> PruneReport {
    let total = records.len();
    let survivors: Vec<RawGraspRecord> = records
        .into_iter()
        .filter(|record| !policy.prunes(record))
        .collect();
    let pruned = total - survivors.len();
    info!(
        pruned,
        remaining = survivors.len(),
        "database grasp planner: pruned grasps for table collision or gripper angle above threshold"
    );
    PruneReport { survivors, pruned }
}
