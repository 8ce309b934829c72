//! A deterministic stand-in for the physics engine.
//!
//! [`MockModel`] integrates a unit-mass, unit-inertia system with
//! explicit Euler: joint actuators accelerate their joint directly, and
//! the applied wrench on the free-joint body accelerates the floating
//! base. Body poses are derived from the base pose and hinge angles with
//! fixed 0.1 m links. Nothing here is physically meaningful; it only has
//! to move in predictable directions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use kinema_core::{
    JointKind, ModelLayout, PhysicsEngine, PhysicsError, SimModel, SimState, Transmission,
    VirtualFs,
};

/// Initial height of the floating base.
pub const INITIAL_HEIGHT: f64 = 0.3;

const LINK: f64 = 0.1;

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicUsize,
    releases: AtomicUsize,
    steps: AtomicUsize,
}

/// Shared counters for every model created by one [`MockPhysics`].
#[derive(Clone, Debug, Default)]
pub struct PhysicsStats(Arc<Counters>);

impl PhysicsStats {
    /// Models compiled.
    pub fn loads(&self) -> usize {
        self.0.loads.load(Ordering::SeqCst)
    }

    /// Models released.
    pub fn releases(&self) -> usize {
        self.0.releases.load(Ordering::SeqCst)
    }

    /// Models compiled and not yet released.
    pub fn live(&self) -> usize {
        self.loads() - self.releases()
    }

    /// Physics steps taken across all models.
    pub fn steps(&self) -> usize {
        self.0.steps.load(Ordering::SeqCst)
    }
}

/// Compiled mock model.
#[derive(Debug)]
pub struct MockModel {
    layout: ModelLayout,
    initial: SimState,
    stats: PhysicsStats,
}

impl MockModel {
    /// A model with its own private counters.
    pub fn new(layout: ModelLayout) -> Self {
        Self::with_stats(layout, PhysicsStats::default())
    }

    fn with_stats(layout: ModelLayout, stats: PhysicsStats) -> Self {
        let mut initial = SimState::zeroed(&layout);
        if let Some(root) = layout.free_joint() {
            initial.qpos[root.qpos_addr + 2] = INITIAL_HEIGHT;
            initial.qpos[root.qpos_addr + 3] = 1.0;
        }
        let mut model = Self {
            layout,
            initial,
            stats,
        };
        let mut initial = model.initial.clone();
        model.forward(&mut initial);
        model.initial = initial;
        model
    }
}

impl SimModel for MockModel {
    fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    fn new_state(&self) -> SimState {
        self.initial.clone()
    }

    fn step(&self, state: &mut SimState) {
        let dt = self.layout.timestep;
        for (a, info) in self.layout.actuators.iter().enumerate() {
            if let Transmission::Joint(j) = info.transmission {
                let joint = &self.layout.joints[j];
                if joint.kind.is_scalar() {
                    state.qvel[joint.dof_addr] += state.ctrl[a] * dt;
                }
            }
        }
        for joint in &self.layout.joints {
            match joint.kind {
                JointKind::Free => {
                    let b = 6 * joint.body.index();
                    for k in 0..6 {
                        state.qvel[joint.dof_addr + k] += state.xfrc_applied[b + k] * dt;
                    }
                    for k in 0..3 {
                        state.qpos[joint.qpos_addr + k] += state.qvel[joint.dof_addr + k] * dt;
                    }
                }
                JointKind::Hinge | JointKind::Slide => {
                    state.qpos[joint.qpos_addr] += state.qvel[joint.dof_addr] * dt;
                }
                JointKind::Ball => {}
            }
        }
        state.time += dt;
        self.forward(state);
        self.stats.0.steps.fetch_add(1, Ordering::SeqCst);
    }

    fn forward(&self, state: &mut SimState) {
        for body in 1..self.layout.nbody {
            let parent = self.layout.bodies[body].parent.index();
            let joint = self.layout.joints.iter().find(|j| j.body.index() == body);
            let (pos, quat) = match joint {
                Some(j) if j.kind == JointKind::Free => {
                    let q = &state.qpos[j.qpos_addr..j.qpos_addr + 7];
                    ([q[0], q[1], q[2]], [q[3], q[4], q[5], q[6]])
                }
                other => {
                    let angle = match other {
                        Some(j) if j.kind.is_scalar() => state.qpos[j.qpos_addr],
                        _ => 0.0,
                    };
                    let p = &state.xpos[3 * parent..3 * parent + 3];
                    let q = &state.xquat[4 * parent..4 * parent + 4];
                    (
                        [p[0] + LINK * angle.sin(), p[1], p[2] - LINK * angle.cos()],
                        [q[0], q[1], q[2], q[3]],
                    )
                }
            };
            state.xpos[3 * body..3 * body + 3].copy_from_slice(&pos);
            state.xquat[4 * body..4 * body + 4].copy_from_slice(&quat);
            state.xipos[3 * body..3 * body + 3].copy_from_slice(&pos);
        }
    }

    fn reset_state(&self, state: &mut SimState) {
        state.clone_from(&self.initial);
    }

    fn release(&mut self) {
        self.stats.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug)]
struct ModelSource {
    layout: ModelLayout,
    required_assets: Vec<String>,
}

/// Mock physics engine mapping model XML text to layouts.
///
/// The XML is matched verbatim after trimming; it is never parsed.
#[derive(Clone, Debug, Default)]
pub struct MockPhysics {
    models: IndexMap<String, ModelSource>,
    stats: PhysicsStats,
}

impl MockPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `xml` to `layout`.
    pub fn with_model(mut self, xml: &str, layout: ModelLayout) -> Self {
        self.models.insert(
            xml.trim().to_string(),
            ModelSource {
                layout,
                required_assets: Vec::new(),
            },
        );
        self
    }

    /// Fail to compile `xml` unless `path` exists in the virtual
    /// filesystem.
    pub fn require_asset(mut self, xml: &str, path: &str) -> Self {
        if let Some(source) = self.models.get_mut(xml.trim()) {
            source.required_assets.push(path.to_string());
        }
        self
    }

    /// Counters shared with every model this engine compiles.
    pub fn stats(&self) -> PhysicsStats {
        self.stats.clone()
    }
}

impl PhysicsEngine for MockPhysics {
    fn load_model(&self, xml: &str, vfs: &dyn VirtualFs) -> Result<Box<dyn SimModel>, PhysicsError> {
        let source = self
            .models
            .get(xml.trim())
            .ok_or_else(|| PhysicsError::LoadFailed {
                reason: "unrecognized model description".into(),
            })?;
        if let Some(missing) = source.required_assets.iter().find(|p| !vfs.exists(p)) {
            return Err(PhysicsError::LoadFailed {
                reason: format!("asset '{missing}' not found"),
            });
        }
        self.stats.0.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockModel::with_stats(
            source.layout.clone(),
            self.stats.clone(),
        )))
    }
}
