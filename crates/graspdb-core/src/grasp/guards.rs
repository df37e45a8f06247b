//! Fixed constants of the grasp resolution pipeline.

// Catalog hand identifiers with a dedicated joint layout
pub const SCHUNK_HAND_ID: &str = "Schunk";
pub const WILLOW_GRIPPER_2010_HAND_ID: &str = "WILLOW_GRIPPER_2010";

// Joint limits applied by the underactuated layout
pub const SCHUNK_ROTATION_MIN: f64 = 0.0;
pub const SCHUNK_JOINT_LIMIT: f64 = 1.5707;

// Efforts are not stored in the catalog
pub const PRE_GRASP_EFFORT: f64 = 100.0;
pub const GRASP_EFFORT: f64 = 50.0;

// Approach distances, identical for every grasp
pub const DESIRED_APPROACH_DISTANCE: f64 = 0.15;
pub const MIN_APPROACH_DISTANCE: f64 = 0.07;

// Grasp pruning
pub const DEFAULT_QUALITY_EXCLUSION_THRESHOLD: f64 = -40.0;
pub const DEFAULT_PRUNE_GRIPPER_OPENING: f64 = 0.5;
pub const DEFAULT_PRUNE_TABLE_CLEARANCE: f64 = 0.0;
/// Table clearance is stored in millimetres, thresholds are in metres.
pub const TABLE_CLEARANCE_MM_PER_M: f64 = 1.0e3;

pub const DEFAULT_PROFILE_CACHE_ENTRIES: usize = 64;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

pub fn clamp(value: f64, minimum: f64, maximum: f64) -> f64 {
    value.max(minimum).min(maximum)
}
