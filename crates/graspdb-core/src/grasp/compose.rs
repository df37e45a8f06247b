//! Composition of model-relative grasp poses into the caller's frame.

use tracing::error;

use crate::errors::ResolveError;
use crate::frames::pose::{Pose, StampedPose};
use crate::frames::tree::{LookupTime, TransformProvider};

/// Express `local` (relative to the detected model) in `reference_frame`.
///
/// `detection_pose ∘ local` gives the grasp in `detection_frame`; when that
/// differs from `reference_frame` the latest `reference_frame ← detection_frame`
/// transform is applied on the left.  Equal frames never touch `transforms`.
pub fn compose(
    local: &Pose,
    detection_pose: &Pose,
    detection_frame: &str,
    reference_frame: &str,
    transforms: &dyn TransformProvider,
) -> Result<Pose, ResolveError> {
    let in_detection_frame = detection_pose.multiply(local);
    if detection_frame == reference_frame {
        return Ok(in_detection_frame);
    }
    let reference_from_detection =
        lookup_reference_transform(detection_frame, reference_frame, transforms)?;
    Ok(reference_from_detection.multiply(&in_detection_frame))
}

fn lookup_reference_transform(
    detection_frame: &str,
    reference_frame: &str,
    transforms: &dyn TransformProvider,
) -> Result<Pose, ResolveError> {
    transforms
        .lookup_transform(reference_frame, detection_frame, LookupTime::Latest)
        .map_err(|e| {
            error!(
                reference_frame,
                detection_frame,
                error = %e,
                "grasp planner: failed to get transform"
            );
            ResolveError::TransformUnavailable {
                target_frame: reference_frame.to_string(),
                source_frame: detection_frame.to_string(),
            }
        })
}

/// Per-request compositor.  The reference transform is looked up lazily, on
/// the first pose that needs it, and reused for every later pose.
pub struct PoseCompositor<'a> {
    detection: &'a StampedPose,
    reference_frame: &'a str,
    transforms: &'a dyn TransformProvider,
    reference_from_detection: Option<Pose>,
}

impl<'a> PoseCompositor<'a> {
    pub fn new(
        detection: &'a StampedPose,
        reference_frame: &'a str,
        transforms: &'a dyn TransformProvider,
    ) -> Self {
        Self {
            detection,
            reference_frame,
            transforms,
            reference_from_detection: None,
        }
    }

    pub fn needs_transform(&self) -> bool {
        self.detection.frame_id != self.reference_frame
    }

    pub fn compose(&mut self, local: &Pose) -> Result<Pose, ResolveError> {
        let in_detection_frame = self.detection.pose.multiply(local);
        if !self.needs_transform() {
            return Ok(in_detection_frame);
        }
        let transform = match self.reference_from_detection {
            Some(transform) => transform,
            None => {
                let transform = lookup_reference_transform(
                    &self.detection.frame_id,
                    self.reference_frame,
                    self.transforms,
                )?;
                self.reference_from_detection = Some(transform);
                transform
            }
        };
        Ok(transform.multiply(&in_detection_frame))
    }
}
