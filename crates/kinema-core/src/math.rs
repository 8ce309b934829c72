//! Small rigid-body helpers shared by the extractor, observations and
//! force injection.
//!
//! Quaternions are stored `[w, x, y, z]` to match the physics engine's
//! flat arrays.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Norm below which a quaternion is treated as degenerate.
pub const QUAT_EPSILON: f64 = 1e-9;

/// The identity orientation, `[w, x, y, z]`.
pub const IDENTITY_QUAT: [f32; 4] = [1.0, 0.0, 0.0, 0.0];

/// Normalize a `[w, x, y, z]` quaternion.
///
/// A quaternion whose norm is below [`QUAT_EPSILON`] (or not finite) is
/// replaced by the identity rather than propagated.
///
/// ```
/// use kinema_core::math::normalize_quat;
///
/// assert_eq!(normalize_quat([0.0, 0.0, 0.0, 0.0]), [1.0, 0.0, 0.0, 0.0]);
/// let q = normalize_quat([2.0, 0.0, 0.0, 0.0]);
/// assert!((q[0] - 1.0).abs() < 1e-6);
/// ```
pub fn normalize_quat(q: [f64; 4]) -> [f32; 4] {
    let raw = Quaternion::new(q[0], q[1], q[2], q[3]);
    let norm = raw.norm();
    if !norm.is_finite() || norm < QUAT_EPSILON {
        return IDENTITY_QUAT;
    }
    let unit = UnitQuaternion::from_quaternion(raw);
    let c = unit.quaternion().coords;
    // nalgebra stores coords as [i, j, k, w].
    [c[3] as f32, c[0] as f32, c[1] as f32, c[2] as f32]
}

fn unit(q: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Rotate a world-frame vector into the frame described by `q`.
pub fn world_to_body(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let out = unit(q).inverse_transform_vector(&Vector3::new(v[0], v[1], v[2]));
    [out.x, out.y, out.z]
}

/// Rotate a body-frame vector into the world frame.
pub fn body_to_world(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let out = unit(q).transform_vector(&Vector3::new(v[0], v[1], v[2]));
    [out.x, out.y, out.z]
}

/// Cross product `a × b`.
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    let c = Vector3::new(a[0], a[1], a[2]).cross(&Vector3::new(b[0], b[1], b[2]));
    [c.x, c.y, c.z]
}
