//! Control mapping and control laws.

use kinema_core::{ConfigError, ModelLayout, SimState};

use crate::config::{ControlType, PolicyConfig};
use crate::extractor::PolicyStateExtractor;

/// Resolved per-joint arrays used to turn an action into controls.
///
/// Built once when a policy binds to a scene. `apply` runs once per
/// physics substep and only indexes.
///
/// A scene whose actuation does not map one joint actuator to each
/// policy joint is still valid. When it has exactly one actuator per
/// policy joint the actions are written by policy index; otherwise the
/// policy observes and infers but writes no controls.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlMapping {
    control_type: ControlType,
    actuator: Option<Vec<usize>>,
    qpos: Vec<usize>,
    dof: Vec<usize>,
    scale: Vec<f64>,
    default_pose: Vec<f64>,
    kp: Vec<f64>,
    kd: Vec<f64>,
    ctrl_range: Vec<Option<(f64, f64)>>,
}

impl ControlMapping {
    /// Build from a config and the extractor already bound to the scene.
    ///
    /// Fails only on malformed per-joint parameters.
    pub fn new(
        config: &PolicyConfig,
        extractor: &PolicyStateExtractor,
        layout: &ModelLayout,
    ) -> Result<Self, ConfigError> {
        let n = config.num_joints();
        let actuator = match extractor.actuator_map() {
            Some(map) => Some(map.to_vec()),
            None if layout.nu == n && layout.actuators.len() == n => Some((0..n).collect()),
            None => None,
        };
        let ctrl_range = match &actuator {
            Some(map) => map.iter().map(|&a| layout.actuators[a].ctrl_range).collect(),
            None => vec![None; n],
        };
        Ok(Self {
            control_type: config.control_type,
            actuator,
            qpos: extractor.joints().iter().map(|a| a.qpos).collect(),
            dof: extractor.joints().iter().map(|a| a.dof).collect(),
            scale: config.action_scale.expand(n, "action_scale")?,
            default_pose: config.default_joint_pos.clone(),
            kp: config.stiffness.expand(n, "stiffness")?,
            kd: config.damping.expand(n, "damping")?,
            ctrl_range,
        })
    }

    /// Number of policy joints; the expected action width.
    pub fn len(&self) -> usize {
        self.qpos.len()
    }

    /// Whether the policy has no joints.
    pub fn is_empty(&self) -> bool {
        self.qpos.is_empty()
    }

    /// Actuator index per policy joint, or `None` when the scene's
    /// actuation cannot be driven by the policy.
    pub fn actuators(&self) -> Option<&[usize]> {
        self.actuator.as_deref()
    }

    /// The control law in use.
    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    /// Default joint pose as `f32`, for observations.
    pub fn default_pose_f32(&self) -> Vec<f32> {
        self.default_pose.iter().map(|&v| v as f32).collect()
    }

    /// Write controls for `action` into `state.ctrl`.
    ///
    /// Position control: `kp * (default + scale * a - q) - kd * qdot`.
    /// Torque control: `scale * a`. Both are clamped to the actuator's
    /// control range when it declares one. Missing action entries read
    /// as zero. Writes nothing when the scene is not actuated.
    pub fn apply(&self, action: &[f32], state: &mut SimState) {
        let Some(actuator) = &self.actuator else {
            return;
        };
        for (i, &act) in actuator.iter().enumerate() {
            let a = action.get(i).copied().unwrap_or(0.0) as f64;
            let u = match self.control_type {
                ControlType::Position => {
                    let target = self.default_pose[i] + self.scale[i] * a;
                    let q = state.qpos[self.qpos[i]];
                    let qd = state.qvel[self.dof[i]];
                    self.kp[i] * (target - q) - self.kd[i] * qd
                }
                ControlType::Torque => self.scale[i] * a,
            };
            let u = match self.ctrl_range[i] {
                Some((lo, hi)) => u.clamp(lo, hi),
                None => u,
            };
            state.ctrl[act] = u;
        }
    }
}
