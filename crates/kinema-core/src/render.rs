//! Renderer collaborator interface.
//!
//! The core writes body poses and light parameters into a scene graph
//! once per frame and never reads anything back.

use crate::error::RenderError;
use crate::id::BodyId;
use crate::physics::ModelLayout;

/// Parameters pushed to one renderer light.
#[derive(Clone, Debug, PartialEq)]
pub struct LightParams {
    /// World position.
    pub position: [f32; 3],
    /// World direction.
    pub direction: [f32; 3],
    /// Diffuse colour.
    pub color: [f32; 3],
    /// Scalar intensity.
    pub intensity: f32,
    /// Whether the light is directional.
    pub directional: bool,
    /// Whether the light casts shadows.
    pub cast_shadow: bool,
}

/// Write-only handle to the renderer's scene graph for one loaded scene.
pub trait RenderGraph: Send {
    /// Move a body's visual node.
    fn set_body_pose(&mut self, body: BodyId, position: [f32; 3], quaternion: [f32; 4]);

    /// Update one light.
    fn set_light(&mut self, index: usize, params: &LightParams);

    /// Free GPU-side resources. Called exactly once, on eviction.
    fn release(&mut self) {}
}

/// Render graph plus the lights derived for it.
pub struct RenderScene {
    /// Scene-graph root.
    pub graph: Box<dyn RenderGraph>,
    /// Lights, in model light-table order.
    pub lights: Vec<LightParams>,
}

impl std::fmt::Debug for RenderScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScene")
            .field("lights", &self.lights.len())
            .finish()
    }
}

/// Entry point of the renderer collaborator.
pub trait RenderBackend: Send + Sync {
    /// Build the scene graph and lights for a compiled model.
    fn build(&self, layout: &ModelLayout) -> Result<RenderScene, RenderError>;
}
