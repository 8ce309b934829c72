//! Per-tick input shared by every observation component.

use kinema_command::CommandValues;
use kinema_core::PolicyState;

/// Reference-trajectory sample at the current tracking cursor.
///
/// Supplied by a behavior module; components borrow it rather than
/// holding their own copy of the trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingSample<'a> {
    /// Reference joint positions, in policy joint order.
    pub joint_pos: &'a [f32],
    /// Reference root position in world frame, when the trajectory has
    /// one.
    pub root_pos: Option<[f32; 3]>,
}

/// Everything an observation component may read during one tick.
#[derive(Clone, Copy, Debug)]
pub struct ObsFrame<'a> {
    /// Snapshot of the simulation.
    pub state: &'a PolicyState,
    /// Action applied during the previous control tick.
    pub last_action: &'a [f32],
    /// Command values as of this tick.
    pub commands: &'a CommandValues,
    /// Default joint pose, in policy joint order.
    pub default_pose: &'a [f32],
    /// Reference sample, when a tracking behavior has data.
    pub tracking: Option<TrackingSample<'a>>,
    /// Gait phase in radians, when a phase source is active.
    pub phase: Option<f32>,
}

impl<'a> ObsFrame<'a> {
    /// A frame with no tracking data and no phase.
    pub fn new(
        state: &'a PolicyState,
        last_action: &'a [f32],
        commands: &'a CommandValues,
        default_pose: &'a [f32],
    ) -> Self {
        Self {
            state,
            last_action,
            commands,
            default_pose,
            tracking: None,
            phase: None,
        }
    }
}
