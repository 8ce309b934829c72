//! The per-tick [`PolicyState`] snapshot.

use crate::math::IDENTITY_QUAT;

/// Typed snapshot of the simulation quantities a policy reads.
///
/// Every field is an owned copy taken from the simulation arrays at the
/// start of a control tick. The physics step mutates those arrays in
/// place, so nothing in a `PolicyState` may alias them.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyState {
    /// Positions of the policy joints, in policy joint order.
    pub joint_pos: Vec<f32>,
    /// Velocities of the policy joints, in policy joint order.
    pub joint_vel: Vec<f32>,
    /// Floating-base position in world frame.
    pub root_pos: [f32; 3],
    /// Floating-base orientation, unit quaternion `[w, x, y, z]`.
    pub root_quat: [f32; 4],
    /// Floating-base linear velocity in world frame.
    pub root_lin_vel: [f32; 3],
    /// Floating-base angular velocity in body frame.
    pub root_ang_vel: [f32; 3],
}

impl PolicyState {
    /// A neutral state for `n` joints: origin, identity orientation, zeros.
    pub fn neutral(n: usize) -> Self {
        Self {
            joint_pos: vec![0.0; n],
            joint_vel: vec![0.0; n],
            root_pos: [0.0; 3],
            root_quat: IDENTITY_QUAT,
            root_lin_vel: [0.0; 3],
            root_ang_vel: [0.0; 3],
        }
    }

    /// Number of policy joints.
    pub fn num_joints(&self) -> usize {
        self.joint_pos.len()
    }
}
