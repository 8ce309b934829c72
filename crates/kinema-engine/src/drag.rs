//! Spring force from an interactive drag.

use kinema_core::math::cross;
use kinema_core::{BodyId, SimState};

/// One drag sample from the UI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragInput {
    /// The dragged body. Dragging the world body (0) does nothing.
    pub body: BodyId,
    /// World-space grab point.
    pub point: [f64; 3],
    /// Cursor offset from the grab point in screen units; screen y grows
    /// downwards.
    pub offset: [f64; 2],
}

/// Force and torque for `input` on a body whose center of mass is `com`.
///
/// `force = stiffness * (offset.x, -offset.y, 0)`,
/// `torque = (point - com) x force`.
pub fn drag_wrench(stiffness: f64, input: &DragInput, com: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    let force = [
        stiffness * input.offset[0],
        -stiffness * input.offset[1],
        0.0,
    ];
    let arm = [
        input.point[0] - com[0],
        input.point[1] - com[1],
        input.point[2] - com[2],
    ];
    (force, cross(arm, force))
}

/// Write the drag wrench into `state.xfrc_applied`.
///
/// Returns `false` (and writes nothing) for the world body or an id
/// outside the model.
pub fn apply_drag(state: &mut SimState, stiffness: f64, input: &DragInput) -> bool {
    let nbody = state.xfrc_applied.len() / 6;
    if input.body.0 == 0 || input.body.index() >= nbody {
        return false;
    }
    let (force, torque) = drag_wrench(stiffness, input, state.body_com(input.body));
    state.set_applied_wrench(input.body, force, torque);
    true
}
