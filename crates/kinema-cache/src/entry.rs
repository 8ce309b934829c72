//! One cached scene.

use kinema_core::{LightParams, RenderGraph, RenderScene, SimulationHandle};

/// Fully constructed resources for one scene.
///
/// The entry owns its simulation handle and render graph outright.
/// Disposal goes through [`SceneCache`](crate::SceneCache) only.
pub struct CacheEntry {
    sim: SimulationHandle,
    graph: Box<dyn RenderGraph>,
    lights: Vec<LightParams>,
    tracked_paths: Vec<String>,
    bytes: usize,
    pub(crate) loaded_at: u64,
    pub(crate) last_accessed: u64,
}

impl CacheEntry {
    /// Bundle the products of a successful load.
    ///
    /// Stamps are assigned by the cache on insertion.
    pub fn new(
        sim: SimulationHandle,
        render: RenderScene,
        tracked_paths: Vec<String>,
        bytes: usize,
    ) -> Self {
        Self {
            sim,
            graph: render.graph,
            lights: render.lights,
            tracked_paths,
            bytes,
            loaded_at: 0,
            last_accessed: 0,
        }
    }

    /// The simulation.
    pub fn sim(&self) -> &SimulationHandle {
        &self.sim
    }

    /// The simulation, mutably.
    pub fn sim_mut(&mut self) -> &mut SimulationHandle {
        &mut self.sim
    }

    /// The render graph.
    pub fn graph_mut(&mut self) -> &mut dyn RenderGraph {
        self.graph.as_mut()
    }

    /// Simulation and render graph together, for pose uploads.
    pub fn parts_mut(&mut self) -> (&mut SimulationHandle, &mut dyn RenderGraph) {
        (&mut self.sim, self.graph.as_mut())
    }

    /// Lights derived at load time.
    pub fn lights(&self) -> &[LightParams] {
        &self.lights
    }

    /// Virtual-filesystem paths this scene was loaded from.
    pub fn tracked_paths(&self) -> &[String] {
        &self.tracked_paths
    }

    /// Estimated resident size.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Cache clock value at insertion.
    pub fn loaded_at(&self) -> u64 {
        self.loaded_at
    }

    /// Cache clock value at the last [`get`](crate::SceneCache::get).
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed
    }

    /// Release native resources. Returns the tracked paths; the cache
    /// decides which of them are no longer in use.
    pub(crate) fn dispose(self) -> Vec<String> {
        let Self {
            sim,
            mut graph,
            tracked_paths,
            ..
        } = self;
        sim.dispose();
        graph.release();
        tracked_paths
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("sim", &self.sim)
            .field("lights", &self.lights.len())
            .field("tracked_paths", &self.tracked_paths)
            .field("bytes", &self.bytes)
            .field("loaded_at", &self.loaded_at)
            .field("last_accessed", &self.last_accessed)
            .finish()
    }
}
