//! A recording stand-in for the renderer.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use kinema_core::{
    BodyId, LightParams, ModelLayout, RenderBackend, RenderError, RenderGraph, RenderScene,
};

#[derive(Debug, Default)]
struct LogInner {
    built: usize,
    released: usize,
    poses: IndexMap<BodyId, ([f32; 3], [f32; 4])>,
    pose_writes: usize,
    lights: IndexMap<usize, LightParams>,
}

/// Everything written to graphs built by one [`MockRenderer`].
#[derive(Clone, Debug, Default)]
pub struct RenderLog(Arc<Mutex<LogInner>>);

impl RenderLog {
    fn with<R>(&self, f: impl FnOnce(&mut LogInner) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Graphs built.
    pub fn built(&self) -> usize {
        self.with(|l| l.built)
    }

    /// Graphs released.
    pub fn released(&self) -> usize {
        self.with(|l| l.released)
    }

    /// Last pose written for `body`, by any graph.
    pub fn pose(&self, body: BodyId) -> Option<([f32; 3], [f32; 4])> {
        self.with(|l| l.poses.get(&body).copied())
    }

    /// Total `set_body_pose` calls.
    pub fn pose_writes(&self) -> usize {
        self.with(|l| l.pose_writes)
    }

    /// Last parameters written for light `index`.
    pub fn light(&self, index: usize) -> Option<LightParams> {
        self.with(|l| l.lights.get(&index).cloned())
    }
}

struct MockGraph {
    log: RenderLog,
}

impl RenderGraph for MockGraph {
    fn set_body_pose(&mut self, body: BodyId, position: [f32; 3], quaternion: [f32; 4]) {
        self.log.with(|l| {
            l.poses.insert(body, (position, quaternion));
            l.pose_writes += 1;
        });
    }

    fn set_light(&mut self, index: usize, params: &LightParams) {
        self.log.with(|l| {
            l.lights.insert(index, params.clone());
        });
    }

    fn release(&mut self) {
        self.log.with(|l| l.released += 1);
    }
}

/// Mock render backend. Lights are copied from the model's light table
/// with unit intensity.
#[derive(Clone, Debug, Default)]
pub struct MockRenderer {
    log: RenderLog,
    fail: bool,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every build fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> RenderLog {
        self.log.clone()
    }
}

impl RenderBackend for MockRenderer {
    fn build(&self, layout: &ModelLayout) -> Result<RenderScene, RenderError> {
        if self.fail {
            return Err(RenderError::BuildFailed {
                reason: "mock renderer failure".into(),
            });
        }
        self.log.with(|l| l.built += 1);
        let lights = layout
            .lights
            .iter()
            .map(|l| LightParams {
                position: l.position,
                direction: l.direction,
                color: l.diffuse,
                intensity: 1.0,
                directional: l.directional,
                cast_shadow: l.cast_shadow,
            })
            .collect();
        Ok(RenderScene {
            graph: Box::new(MockGraph {
                log: self.log.clone(),
            }),
            lights,
        })
    }
}
