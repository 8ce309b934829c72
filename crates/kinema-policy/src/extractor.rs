//! The policy state extractor.

use kinema_core::math::normalize_quat;
use kinema_core::{ConfigError, JointKind, ModelLayout, PolicyState, SimState};

/// State addresses of one policy joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointAddress {
    /// Index into the model's joint table.
    pub joint: usize,
    /// Offset into `qpos`.
    pub qpos: usize,
    /// Offset into `qvel`.
    pub dof: usize,
}

/// Copies the quantities a policy reads out of the simulation arrays.
///
/// Joint names are resolved to state addresses once, at construction;
/// [`extract`](Self::extract) only indexes.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyStateExtractor {
    joints: Vec<JointAddress>,
    root: Option<JointAddress>,
    actuators: Option<Vec<usize>>,
}

impl PolicyStateExtractor {
    /// Resolve `joint_names` against `layout`.
    ///
    /// Every name must exist and be a 1-DoF (hinge or slide) joint.
    pub fn new(layout: &ModelLayout, joint_names: &[String]) -> Result<Self, ConfigError> {
        let joints = joint_names
            .iter()
            .map(|name| {
                let idx = layout
                    .joint_index(name)
                    .ok_or_else(|| ConfigError::UnresolvedJoint { name: name.clone() })?;
                let info = &layout.joints[idx];
                if !info.kind.is_scalar() {
                    return Err(ConfigError::UnsupportedJoint {
                        name: name.clone(),
                        reason: format!("{:?} joints have more than one degree of freedom", info.kind),
                    });
                }
                Ok(JointAddress {
                    joint: idx,
                    qpos: info.qpos_addr,
                    dof: info.dof_addr,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let root = layout
            .joints
            .iter()
            .enumerate()
            .find(|(_, j)| j.kind == JointKind::Free)
            .map(|(i, j)| JointAddress {
                joint: i,
                qpos: j.qpos_addr,
                dof: j.dof_addr,
            });

        let actuators = joints
            .iter()
            .map(|a| {
                let mut driving = layout.actuators_for_joint(a.joint);
                match (driving.next(), driving.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            })
            .collect::<Option<Vec<_>>>();

        Ok(Self {
            joints,
            root,
            actuators,
        })
    }

    /// Resolved addresses, in policy joint order.
    pub fn joints(&self) -> &[JointAddress] {
        &self.joints
    }

    /// The free joint defining the floating base, if the model has one.
    pub fn root(&self) -> Option<JointAddress> {
        self.root
    }

    /// Actuator index driving each policy joint.
    ///
    /// `None` when any policy joint is not driven by exactly one
    /// joint-transmission actuator. Such scenes still bind; see
    /// [`ControlMapping`](crate::ControlMapping).
    pub fn actuator_map(&self) -> Option<&[usize]> {
        self.actuators.as_deref()
    }

    /// Copy this tick's values into a fresh snapshot.
    pub fn extract(&self, state: &SimState) -> PolicyState {
        let joint_pos = self.joints.iter().map(|a| state.qpos[a.qpos] as f32).collect();
        let joint_vel = self.joints.iter().map(|a| state.qvel[a.dof] as f32).collect();
        let mut out = PolicyState {
            joint_pos,
            joint_vel,
            ..PolicyState::neutral(0)
        };
        if let Some(root) = self.root {
            let p = &state.qpos[root.qpos..root.qpos + 7];
            let v = &state.qvel[root.dof..root.dof + 6];
            out.root_pos = [p[0] as f32, p[1] as f32, p[2] as f32];
            out.root_quat = normalize_quat([p[3], p[4], p[5], p[6]]);
            out.root_lin_vel = [v[0] as f32, v[1] as f32, v[2] as f32];
            out.root_ang_vel = [v[3] as f32, v[4] as f32, v[5] as f32];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_core::math::IDENTITY_QUAT;
    use kinema_test_utils::layouts;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_quadruped_joints() {
        let layout = layouts::quadruped();
        let ex = PolicyStateExtractor::new(&layout, &names(&layouts::QUADRUPED_JOINTS)).unwrap();
        assert_eq!(ex.joints().len(), 12);
        assert_eq!(ex.joints()[0].qpos, 7);
        assert_eq!(ex.joints()[0].dof, 6);
        assert_eq!(ex.actuator_map().map(|m| m.len()), Some(12));
        assert!(ex.root().is_some());
    }

    #[test]
    fn unknown_joint_is_fatal() {
        let layout = layouts::quadruped();
        let err = PolicyStateExtractor::new(&layout, &names(&["FL_hip", "tail"])).unwrap_err();
        assert_eq!(err, ConfigError::UnresolvedJoint { name: "tail".into() });
    }

    #[test]
    fn free_joint_is_not_a_policy_joint() {
        let layout = layouts::quadruped();
        let err = PolicyStateExtractor::new(&layout, &names(&["root"])).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedJoint { .. }));
    }

    #[test]
    fn passive_scene_has_no_actuator_map() {
        let layout = layouts::passive_pendulum();
        let ex = PolicyStateExtractor::new(&layout, &names(&["hinge"])).unwrap();
        assert_eq!(ex.actuator_map(), None);
        assert_eq!(ex.root(), None);
    }

    #[test]
    fn extract_copies_and_substitutes_degenerate_quat() {
        let layout = layouts::quadruped();
        let ex = PolicyStateExtractor::new(&layout, &names(&["FL_hip", "RR_calf"])).unwrap();
        let mut state = SimState::zeroed(&layout);
        state.qpos[0..3].copy_from_slice(&[1.0, 2.0, 0.3]);
        // qpos[3..7] left at zero: degenerate orientation.
        state.qvel[0..6].copy_from_slice(&[0.5, 0.0, 0.0, 0.0, 0.0, 0.1]);
        state.qpos[7] = 0.2;
        state.qpos[18] = -1.5;
        state.qvel[17] = 3.0;

        let snap = ex.extract(&state);
        assert_eq!(snap.joint_pos, vec![0.2, -1.5]);
        assert_eq!(snap.joint_vel, vec![0.0, 3.0]);
        assert_eq!(snap.root_pos, [1.0, 2.0, 0.3]);
        assert_eq!(snap.root_quat, IDENTITY_QUAT);
        assert_eq!(snap.root_lin_vel, [0.5, 0.0, 0.0]);
        assert_eq!(snap.root_ang_vel, [0.0, 0.0, 0.1]);

        // The snapshot owns its data.
        state.qpos[7] = 9.0;
        assert_eq!(snap.joint_pos[0], 0.2);
    }

    #[test]
    fn no_free_joint_means_neutral_root() {
        let layout = layouts::passive_pendulum();
        let ex = PolicyStateExtractor::new(&layout, &names(&["hinge"])).unwrap();
        let snap = ex.extract(&SimState::zeroed(&layout));
        assert_eq!(snap.root_pos, [0.0; 3]);
        assert_eq!(snap.root_quat, IDENTITY_QUAT);
    }
}
