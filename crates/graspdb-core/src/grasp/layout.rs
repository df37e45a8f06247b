//! Mapping of catalog joint vectors onto physical hand joints.
//!
//! The catalog stores postures in the joint ordering of the hand model used
//! when the grasps were planned.  Each supported hand gets a `HandLayout`
//! entry in `LAYOUT_TABLE`; every other hand is assumed to share its joint
//! ordering with the catalog.

use crate::errors::ShapeMismatch;
use crate::grasp::guards::{
    clamp, GRASP_EFFORT, PRE_GRASP_EFFORT, SCHUNK_HAND_ID, SCHUNK_JOINT_LIMIT,
    SCHUNK_ROTATION_MIN, WILLOW_GRIPPER_2010_HAND_ID,
};
use crate::models::{HandProfile, JointState, RawGraspRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLayout {
    /// 7 physical joints driven from an 8-value catalog posture.
    Underactuated7Dof,
    /// 4 physical joints driven by one catalog value.
    ParallelJawSingleDof,
    /// Catalog values copied one-to-one.
    DirectMapped,
}

/// Hand identifiers with a dedicated layout.  Anything else is direct-mapped.
pub const LAYOUT_TABLE: &[(&str, HandLayout)] = &[
    (SCHUNK_HAND_ID, HandLayout::Underactuated7Dof),
    (WILLOW_GRIPPER_2010_HAND_ID, HandLayout::ParallelJawSingleDof),
];

const UNDERACTUATED_JOINTS: usize = 7;
const UNDERACTUATED_RAW_VALUES: usize = 8;
/// Catalog index feeding physical joints 1..=6.  Joint 0 reads index 0.
const UNDERACTUATED_SOURCE_INDICES: [usize; 6] = [6, 7, 1, 2, 3, 4];

const PARALLEL_JAW_JOINTS: usize = 4;

impl HandLayout {
    pub fn for_hand(catalog_hand_id: &str) -> Self {
        LAYOUT_TABLE
            .iter()
            .find(|(hand_id, _)| *hand_id == catalog_hand_id)
            .map(|(_, layout)| *layout)
            .unwrap_or(HandLayout::DirectMapped)
    }

    pub fn name(self) -> &'static str {
        match self {
            HandLayout::Underactuated7Dof => "underactuated-7dof",
            HandLayout::ParallelJawSingleDof => "parallel-jaw-single-dof",
            HandLayout::DirectMapped => "direct-mapped",
        }
    }

    /// Validate joint counts before any value is read.
    pub fn check_shape(
        self,
        joint_count: usize,
        pre_grasp_len: usize,
        final_grasp_len: usize,
    ) -> Result<(), ShapeMismatch> {
        let (expected_joints, expected_raw) = match self {
            HandLayout::Underactuated7Dof => (UNDERACTUATED_JOINTS, UNDERACTUATED_RAW_VALUES),
            HandLayout::ParallelJawSingleDof => (PARALLEL_JAW_JOINTS, 1),
            HandLayout::DirectMapped => (joint_count, joint_count),
        };
        if joint_count != expected_joints {
            return Err(ShapeMismatch {
                strategy: self.name(),
                expected: format!("{expected_joints} hand joints"),
                found: format!("{joint_count} hand joints"),
            });
        }
        if pre_grasp_len != expected_raw || final_grasp_len != expected_raw {
            return Err(ShapeMismatch {
                strategy: self.name(),
                expected: format!("{expected_raw} catalog values per posture"),
                found: format!(
                    "{pre_grasp_len} pre-grasp and {final_grasp_len} grasp values"
                ),
            });
        }
        Ok(())
    }

    /// Map one catalog posture.  Shape must already be checked.
    fn map_posture(self, raw: &[f64], joint_count: usize) -> Vec<f64> {
        match self {
            HandLayout::Underactuated7Dof => {
                let mut positions = Vec::with_capacity(UNDERACTUATED_JOINTS);
                positions.push(clamp(raw[0], SCHUNK_ROTATION_MIN, SCHUNK_JOINT_LIMIT));
                positions.extend(
                    UNDERACTUATED_SOURCE_INDICES
                        .iter()
                        .map(|&i| clamp(raw[i], -SCHUNK_JOINT_LIMIT, SCHUNK_JOINT_LIMIT)),
                );
                positions
            }
            HandLayout::ParallelJawSingleDof => vec![raw[0]; joint_count],
            HandLayout::DirectMapped => raw.to_vec(),
        }
    }
}

/// Pre-grasp and grasp postures of one record, on the physical hand.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedPostures {
    pub pre_grasp: JointState,
    pub grasp: JointState,
}

/// Map `record` onto the hand described by `profile`.
pub fn adapt(
    record: &RawGraspRecord,
    profile: &HandProfile,
) -> Result<AdaptedPostures, ShapeMismatch> {
    let layout = HandLayout::for_hand(&profile.catalog_hand_id);
    let joint_count = profile.joint_names.len();
    layout.check_shape(
        joint_count,
        record.pre_grasp_joints.len(),
        record.final_grasp_joints.len(),
    )?;

    let pre_grasp = JointState {
        name: profile.joint_names.clone(),
        position: layout.map_posture(&record.pre_grasp_joints, joint_count),
        effort: vec![PRE_GRASP_EFFORT; joint_count],
    };
    let grasp = JointState {
        name: profile.joint_names.clone(),
        position: layout.map_posture(&record.final_grasp_joints, joint_count),
        effort: vec![GRASP_EFFORT; joint_count],
    };
    Ok(AdaptedPostures { pre_grasp, grasp })
}
