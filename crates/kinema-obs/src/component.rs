//! The [`ObservationComponent`] trait and the instantaneous built-ins.

use kinema_core::math::world_to_body;
use kinema_core::ObsError;

use crate::frame::ObsFrame;

/// One feature extractor contributing a fixed-length slice to an
/// observation group.
///
/// `compute` must return exactly `size()` values and must not change
/// between two calls to `update`. Stateful components (history windows)
/// advance only in `update`, and `reset` seeds all of their history with
/// the instantaneous value derived from the given frame.
pub trait ObservationComponent: Send {
    /// Registry name, used in error messages.
    fn name(&self) -> &str;

    /// Declared output length.
    fn size(&self) -> usize;

    /// Record this tick's value.
    fn update(&mut self, _frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        Ok(())
    }

    /// Seed internal history from `frame`.
    fn reset(&mut self, _frame: &ObsFrame<'_>) -> Result<(), ObsError> {
        Ok(())
    }

    /// Current output.
    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32>;
}

/// Run `compute` and enforce the declared length.
pub fn compute_checked(
    component: &dyn ObservationComponent,
    frame: &ObsFrame<'_>,
) -> Result<Vec<f32>, ObsError> {
    let out = component.compute(frame);
    if out.len() != component.size() {
        return Err(ObsError::LengthMismatch {
            component: component.name().to_string(),
            declared: component.size(),
            computed: out.len(),
        });
    }
    Ok(out)
}

// ── Base state ─────────────────────────────────────────────────────

/// Root linear velocity expressed in the body frame.
#[derive(Debug, Default)]
pub struct BaseLinearVelocity;

impl ObservationComponent for BaseLinearVelocity {
    fn name(&self) -> &str {
        "BaseLinearVelocity"
    }

    fn size(&self) -> usize {
        3
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        world_to_body(frame.state.root_quat, frame.state.root_lin_vel).to_vec()
    }
}

/// Root angular velocity, already in the body frame.
#[derive(Debug, Default)]
pub struct BaseAngularVelocity;

impl ObservationComponent for BaseAngularVelocity {
    fn name(&self) -> &str {
        "BaseAngularVelocity"
    }

    fn size(&self) -> usize {
        3
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        frame.state.root_ang_vel.to_vec()
    }
}

/// Direction of gravity seen from the body frame.
#[derive(Debug, Default)]
pub struct ProjectedGravity;

impl ObservationComponent for ProjectedGravity {
    fn name(&self) -> &str {
        "ProjectedGravity"
    }

    fn size(&self) -> usize {
        3
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        world_to_body(frame.state.root_quat, [0.0, 0.0, -1.0]).to_vec()
    }
}

// ── Joints ─────────────────────────────────────────────────────────

/// Policy joint positions, optionally relative to the default pose.
#[derive(Debug)]
pub struct JointPositions {
    n: usize,
    relative: bool,
}

impl JointPositions {
    /// Positions of `n` joints.
    pub fn new(n: usize, relative: bool) -> Self {
        Self { n, relative }
    }
}

impl ObservationComponent for JointPositions {
    fn name(&self) -> &str {
        "JointPositions"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        let q = &frame.state.joint_pos;
        if !self.relative {
            return q.clone();
        }
        q.iter()
            .enumerate()
            .map(|(i, &v)| v - frame.default_pose.get(i).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Policy joint velocities.
#[derive(Debug)]
pub struct JointVelocities {
    n: usize,
}

impl JointVelocities {
    /// Velocities of `n` joints.
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ObservationComponent for JointVelocities {
    fn name(&self) -> &str {
        "JointVelocities"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        frame.state.joint_vel.clone()
    }
}

/// The action applied on the previous tick.
///
/// Registered as `PrevActions`, always inside a history window.
#[derive(Debug)]
pub struct LastAction {
    n: usize,
}

impl LastAction {
    /// Last action of width `n`.
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ObservationComponent for LastAction {
    fn name(&self) -> &str {
        "PrevActions"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        frame.last_action.to_vec()
    }
}

// ── Commands ───────────────────────────────────────────────────────

/// Slider values of one command group.
#[derive(Debug)]
pub struct GeneratedCommands {
    group: String,
    n: usize,
}

impl GeneratedCommands {
    /// Read `n` sliders from `group`.
    pub fn new(group: impl Into<String>, n: usize) -> Self {
        Self {
            group: group.into(),
            n,
        }
    }
}

impl ObservationComponent for GeneratedCommands {
    fn name(&self) -> &str {
        "GeneratedCommands"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        // A group missing from the snapshot reads as zeros.
        match frame.commands.group(&self.group) {
            Some(values) => values.to_vec(),
            None => vec![0.0; self.n],
        }
    }
}

// ── Tracking ───────────────────────────────────────────────────────

/// Reference joint positions at the tracking cursor.
#[derive(Debug)]
pub struct TrackingJointPositions {
    n: usize,
}

impl TrackingJointPositions {
    /// Reference positions of `n` joints.
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl ObservationComponent for TrackingJointPositions {
    fn name(&self) -> &str {
        "TrackingJointPositions"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        match frame.tracking {
            Some(sample) => sample.joint_pos.to_vec(),
            None => vec![0.0; self.n],
        }
    }
}

/// Reference root position minus the current root position. Zero when
/// the reference has no root track.
#[derive(Debug, Default)]
pub struct TrackingRootOffset;

impl ObservationComponent for TrackingRootOffset {
    fn name(&self) -> &str {
        "TrackingRootOffset"
    }

    fn size(&self) -> usize {
        3
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        match frame.tracking.and_then(|sample| sample.root_pos) {
            Some(target) => {
                let p = frame.state.root_pos;
                vec![target[0] - p[0], target[1] - p[1], target[2] - p[2]]
            }
            None => vec![0.0; 3],
        }
    }
}

/// `[sin φ, cos φ]` of the gait phase.
#[derive(Debug, Default)]
pub struct GaitPhase;

impl ObservationComponent for GaitPhase {
    fn name(&self) -> &str {
        "GaitPhase"
    }

    fn size(&self) -> usize {
        2
    }

    fn compute(&self, frame: &ObsFrame<'_>) -> Vec<f32> {
        match frame.phase {
            Some(phi) => vec![phi.sin(), phi.cos()],
            None => vec![0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TrackingSample;
    use approx::assert_relative_eq;
    use kinema_command::CommandValues;
    use kinema_core::PolicyState;

    fn state() -> PolicyState {
        let mut s = PolicyState::neutral(2);
        s.joint_pos = vec![0.5, -0.25];
        s.joint_vel = vec![1.0, 2.0];
        s.root_pos = [1.0, 2.0, 0.3];
        s.root_lin_vel = [1.0, 0.0, 0.0];
        s.root_ang_vel = [0.0, 0.0, 0.7];
        s
    }

    #[test]
    fn gravity_points_down_for_upright_body() {
        let s = state();
        let cmds = CommandValues::new();
        let frame = ObsFrame::new(&s, &[], &cmds, &[]);
        assert_eq!(ProjectedGravity.compute(&frame), vec![0.0, 0.0, -1.0]);
        assert_eq!(BaseAngularVelocity.compute(&frame), vec![0.0, 0.0, 0.7]);
    }

    #[test]
    fn linear_velocity_rotates_into_body_frame() {
        let mut s = state();
        let half = std::f32::consts::FRAC_PI_4;
        s.root_quat = [half.cos(), 0.0, 0.0, half.sin()];
        let cmds = CommandValues::new();
        let frame = ObsFrame::new(&s, &[], &cmds, &[]);
        let v = BaseLinearVelocity.compute(&frame);
        assert_relative_eq!(v[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(v[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn joint_positions_relative_to_default() {
        let s = state();
        let cmds = CommandValues::new();
        let frame = ObsFrame::new(&s, &[], &cmds, &[0.5, 0.25]);
        assert_eq!(JointPositions::new(2, true).compute(&frame), vec![0.0, -0.5]);
        assert_eq!(JointPositions::new(2, false).compute(&frame), vec![0.5, -0.25]);
    }

    #[test]
    fn tracking_without_trajectory_is_zero() {
        let s = state();
        let cmds = CommandValues::new();
        let mut frame = ObsFrame::new(&s, &[], &cmds, &[]);
        assert_eq!(TrackingJointPositions::new(2).compute(&frame), vec![0.0; 2]);
        assert_eq!(TrackingRootOffset.compute(&frame), vec![0.0; 3]);
        assert_eq!(GaitPhase.compute(&frame), vec![0.0; 2]);

        let reference = [0.1, 0.2];
        frame.tracking = Some(TrackingSample {
            joint_pos: &reference,
            root_pos: Some([2.0, 2.0, 0.3]),
        });
        assert_eq!(TrackingJointPositions::new(2).compute(&frame), vec![0.1, 0.2]);
        assert_eq!(TrackingRootOffset.compute(&frame), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn joint_only_reference_has_zero_root_offset() {
        let s = state();
        assert_ne!(s.root_pos, [0.0; 3]);
        let cmds = CommandValues::new();
        let mut frame = ObsFrame::new(&s, &[], &cmds, &[]);
        let reference = [0.1, 0.2];
        frame.tracking = Some(TrackingSample {
            joint_pos: &reference,
            root_pos: None,
        });
        assert_eq!(TrackingJointPositions::new(2).compute(&frame), vec![0.1, 0.2]);
        assert_eq!(TrackingRootOffset.compute(&frame), vec![0.0; 3]);
    }

    #[test]
    fn commands_read_snapshot() {
        let s = state();
        let mut cmds = CommandValues::new();
        cmds.insert("velocity", vec![0.5, 0.0, -0.2]);
        let frame = ObsFrame::new(&s, &[], &cmds, &[]);
        let c = GeneratedCommands::new("velocity", 3);
        assert_eq!(c.compute(&frame), vec![0.5, 0.0, -0.2]);
        let missing = GeneratedCommands::new("other", 2);
        assert_eq!(missing.compute(&frame), vec![0.0; 2]);
    }

    #[test]
    fn checked_compute_catches_mismatch() {
        let s = state();
        let cmds = CommandValues::new();
        let frame = ObsFrame::new(&s, &[1.0, 2.0, 3.0], &cmds, &[]);
        let err = compute_checked(&LastAction::new(4), &frame).unwrap_err();
        assert_eq!(
            err,
            ObsError::LengthMismatch {
                component: "PrevActions".into(),
                declared: 4,
                computed: 3,
            }
        );
    }
}
