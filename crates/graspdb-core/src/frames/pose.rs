//! Rigid poses and their composition.
//!
//! `Pose` is the wire/storage representation (position plus an `x, y, z, w`
//! quaternion, the layout used by robot middleware messages).  All arithmetic
//! goes through `nalgebra::Isometry3`.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Quaternions shorter than this are treated as "unset" and read as identity.
const MIN_QUATERNION_NORM: f64 = 1e-12;

/// A rigid transform: position in metres and a unit quaternion `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[must_use]
    pub const fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: [x, y, z],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Converts to an isometry, normalising the stored quaternion.
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z, w] = self.orientation;
        let raw = Quaternion::new(w, x, y, z);
        let rotation = if raw.norm() < MIN_QUATERNION_NORM {
            UnitQuaternion::identity()
        } else {
            UnitQuaternion::from_quaternion(raw)
        };
        let [px, py, pz] = self.position;
        Isometry3::from_parts(Translation3::new(px, py, pz), rotation)
    }

    #[must_use]
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation.into_inner();
        Self {
            position: [t.x, t.y, t.z],
            orientation: [q.i, q.j, q.k, q.w],
        }
    }

    /// `self ∘ other`: `other` expressed in the frame `self` is relative to.
    ///
    /// Not commutative.  The left operand is the outer transform.
    #[must_use]
    pub fn multiply(&self, other: &Pose) -> Pose {
        Pose::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    #[must_use]
    pub fn inverse(&self) -> Pose {
        Pose::from_isometry(&self.to_isometry().inverse())
    }

    /// Compares positions component-wise and orientations up to sign.
    #[must_use]
    pub fn approx_eq(&self, other: &Pose, eps: f64) -> bool {
        let position_close = self
            .position
            .iter()
            .zip(other.position.iter())
            .all(|(a, b)| (a - b).abs() <= eps);
        if !position_close {
            return false;
        }
        let a = self.to_isometry().rotation;
        let b = other.to_isometry().rotation;
        let dot = a.coords.dot(&b.coords).abs();
        (1.0 - dot).abs() <= eps
    }
}

/// A pose tagged with the frame it is expressed in and an acquisition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    pub frame_id: String,
    /// Seconds since the epoch of the producing clock.
    #[serde(default)]
    pub stamp: f64,
    pub pose: Pose,
}

impl StampedPose {
    pub fn new(frame_id: impl Into<String>, pose: Pose) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: 0.0,
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn yaw(angle: f64) -> [f64; 4] {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, angle).into_inner();
        [q.i, q.j, q.k, q.w]
    }

    #[test]
    fn test_identity_is_neutral() {
        let p = Pose::new([1.0, -2.0, 0.5], yaw(0.3));
        assert!(Pose::identity().multiply(&p).approx_eq(&p, 1e-12));
        assert!(p.multiply(&Pose::identity()).approx_eq(&p, 1e-12));
    }

    #[test]
    fn test_multiply_rotates_inner_translation() {
        let outer = Pose::new([1.0, 0.0, 0.0], yaw(FRAC_PI_2));
        let inner = Pose::from_translation(1.0, 0.0, 0.0);
        let out = outer.multiply(&inner);
        assert!((out.position[0] - 1.0).abs() < 1e-9);
        assert!((out.position[1] - 1.0).abs() < 1e-9);
        assert!(out.position[2].abs() < 1e-9);
    }

    #[test]
    fn test_multiply_is_not_commutative() {
        let a = Pose::new([1.0, 0.0, 0.0], yaw(FRAC_PI_2));
        let b = Pose::from_translation(0.0, 2.0, 0.0);
        assert!(!a.multiply(&b).approx_eq(&b.multiply(&a), 1e-6));
    }

    #[test]
    fn test_inverse_cancels() {
        let p = Pose::new([0.3, 0.2, -1.0], yaw(1.1));
        assert!(p.multiply(&p.inverse()).approx_eq(&Pose::identity(), 1e-9));
    }

    #[test]
    fn test_zero_quaternion_reads_as_identity() {
        let p = Pose::new([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 0.0]);
        let iso = p.to_isometry();
        assert_eq!(iso.rotation, UnitQuaternion::identity());
    }

    #[test]
    fn test_unnormalised_quaternion_is_normalised() {
        let p = Pose::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 2.0]);
        let round_trip = Pose::from_isometry(&p.to_isometry());
        assert!((round_trip.orientation[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_approx_eq_ignores_quaternion_sign() {
        let q = yaw(0.7);
        let a = Pose::new([0.0; 3], q);
        let b = Pose::new([0.0; 3], [-q[0], -q[1], -q[2], -q[3]]);
        assert!(a.approx_eq(&b, 1e-12));
    }
}
