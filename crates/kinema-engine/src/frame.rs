//! Completed-tick body transforms handed to the renderer.

use kinema_core::math::normalize_quat;
use kinema_core::{BodyId, RenderGraph, SimState, TickId};

/// World pose of one body, in render precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyPose {
    /// Position.
    pub position: [f32; 3],
    /// Unit orientation `[w, x, y, z]`.
    pub quaternion: [f32; 4],
}

/// Every body pose after one tick's substeps.
///
/// Frames are immutable once captured; the renderer only ever sees a
/// whole tick.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyFrame {
    /// Tick that produced the frame. Reset frames reuse the tick counter
    /// at the time of the reset.
    pub tick: TickId,
    /// Simulation time.
    pub time: f64,
    /// Poses indexed by body id, world body included.
    pub poses: Vec<BodyPose>,
}

impl BodyFrame {
    /// Copy transforms out of `state`. Degenerate orientations become
    /// identity.
    pub fn capture(tick: TickId, state: &SimState) -> Self {
        let poses = state
            .xpos
            .chunks_exact(3)
            .zip(state.xquat.chunks_exact(4))
            .map(|(p, q)| BodyPose {
                position: [p[0] as f32, p[1] as f32, p[2] as f32],
                quaternion: normalize_quat([q[0], q[1], q[2], q[3]]),
            })
            .collect();
        Self {
            tick,
            time: state.time,
            poses,
        }
    }

    /// Pose of `body`, if it exists.
    pub fn pose(&self, body: BodyId) -> Option<&BodyPose> {
        self.poses.get(body.index())
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the frame holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Upload every non-world pose into `graph`.
    pub fn write_to(&self, graph: &mut dyn RenderGraph) {
        for (i, pose) in self.poses.iter().enumerate().skip(1) {
            graph.set_body_pose(BodyId(i as u32), pose.position, pose.quaternion);
        }
    }
}
