//! Physics collaborator interface and the [`SimulationHandle`].
//!
//! The physics engine itself is external. Kinema sees a compiled model
//! through [`SimModel`] (immutable topology plus the `step`/`forward`/
//! `reset_state` entry points) and owns the mutable numeric state as a
//! plain [`SimState`] of flat arrays addressed by the offsets in
//! [`ModelLayout`].

use crate::error::PhysicsError;
use crate::id::BodyId;
use crate::vfs::VirtualFs;

// ── Layout tables ──────────────────────────────────────────────────

/// Joint type, determining how many `qpos`/`qvel` slots it occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointKind {
    /// 6-DoF floating base: 7 position slots (xyz + wxyz), 6 velocity slots.
    Free,
    /// 3-DoF spherical joint: 4 position slots, 3 velocity slots.
    Ball,
    /// 1-DoF prismatic joint.
    Slide,
    /// 1-DoF revolute joint.
    Hinge,
}

impl JointKind {
    /// Number of `qpos` entries used by this joint type.
    pub fn qpos_width(self) -> usize {
        match self {
            Self::Free => 7,
            Self::Ball => 4,
            Self::Slide | Self::Hinge => 1,
        }
    }

    /// Number of `qvel` entries used by this joint type.
    pub fn dof_width(self) -> usize {
        match self {
            Self::Free => 6,
            Self::Ball => 3,
            Self::Slide | Self::Hinge => 1,
        }
    }

    /// Whether the joint has exactly one degree of freedom.
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Slide | Self::Hinge)
    }
}

/// One row of the joint table.
#[derive(Clone, Debug, PartialEq)]
pub struct JointInfo {
    /// Joint name from the model description.
    pub name: String,
    /// Joint type.
    pub kind: JointKind,
    /// Offset of the joint's first entry in `qpos`.
    pub qpos_addr: usize,
    /// Offset of the joint's first entry in `qvel`.
    pub dof_addr: usize,
    /// Body the joint belongs to.
    pub body: BodyId,
}

/// What an actuator drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transmission {
    /// Drives a joint, by index into the joint table.
    Joint(usize),
    /// Tendon, site, body or other non-joint transmission.
    Other,
}

/// One row of the actuator table.
#[derive(Clone, Debug, PartialEq)]
pub struct ActuatorInfo {
    /// Actuator name.
    pub name: String,
    /// Transmission target.
    pub transmission: Transmission,
    /// Control limits, if the actuator is control-limited.
    pub ctrl_range: Option<(f64, f64)>,
}

/// One row of the body table.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyInfo {
    /// Body name.
    pub name: String,
    /// Parent body (the world body is its own parent).
    pub parent: BodyId,
}

/// Mesh buffer sizes, used only for memory estimation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshInfo {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of normals.
    pub normal_count: usize,
    /// Number of triangular faces.
    pub face_count: usize,
}

/// Texture dimensions, used only for memory estimation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureInfo {
    /// Width in texels.
    pub width: usize,
    /// Height in texels.
    pub height: usize,
    /// Channels per texel.
    pub channels: usize,
    /// Whether image data was actually loaded (procedural textures have none).
    pub has_data: bool,
}

/// One light declared by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct LightInfo {
    /// Body the light is attached to, if any.
    pub body: Option<BodyId>,
    /// Position in the body (or world) frame.
    pub position: [f32; 3],
    /// Direction in the body (or world) frame.
    pub direction: [f32; 3],
    /// Diffuse colour.
    pub diffuse: [f32; 3],
    /// Whether the light is directional.
    pub directional: bool,
    /// Whether the light casts shadows.
    pub cast_shadow: bool,
}

/// Immutable topology of a compiled model.
///
/// Produced once per model by the physics collaborator. All address
/// tables are resolved against this layout exactly once (at scene load or
/// policy bind time); the per-tick hot path only indexes flat arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelLayout {
    /// Number of generalized position coordinates.
    pub nq: usize,
    /// Number of degrees of freedom.
    pub nv: usize,
    /// Number of actuators.
    pub nu: usize,
    /// Number of bodies, including the world body.
    pub nbody: usize,
    /// Physics integration timestep in seconds.
    pub timestep: f64,
    /// Joint table.
    pub joints: Vec<JointInfo>,
    /// Actuator table.
    pub actuators: Vec<ActuatorInfo>,
    /// Body table.
    pub bodies: Vec<BodyInfo>,
    /// Mesh table.
    pub meshes: Vec<MeshInfo>,
    /// Texture table.
    pub textures: Vec<TextureInfo>,
    /// Light table.
    pub lights: Vec<LightInfo>,
}

impl ModelLayout {
    /// Index of the joint with this name.
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Id of the body with this name.
    pub fn body_id(&self, name: &str) -> Option<BodyId> {
        self.bodies
            .iter()
            .position(|b| b.name == name)
            .map(|i| BodyId(i as u32))
    }

    /// The first free joint, which defines the floating base.
    pub fn free_joint(&self) -> Option<&JointInfo> {
        self.joints.iter().find(|j| j.kind == JointKind::Free)
    }

    /// Actuators whose transmission targets `joint`.
    pub fn actuators_for_joint(&self, joint: usize) -> impl Iterator<Item = usize> + '_ {
        self.actuators
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.transmission == Transmission::Joint(joint))
            .map(|(i, _)| i)
    }
}

// ── SimState ───────────────────────────────────────────────────────

/// Mutable numeric state of one simulation.
///
/// Every array is flat and sized from the [`ModelLayout`] counts.
/// Arrays are mutated in place by every physics step; code that needs a
/// value beyond the current tick must copy it out.
#[derive(Clone, Debug, PartialEq)]
pub struct SimState {
    /// Simulation time in seconds.
    pub time: f64,
    /// Generalized positions (`nq`).
    pub qpos: Vec<f64>,
    /// Generalized velocities (`nv`).
    pub qvel: Vec<f64>,
    /// Actuator controls (`nu`).
    pub ctrl: Vec<f64>,
    /// Applied Cartesian force and torque per body (`6 * nbody`,
    /// force first).
    pub xfrc_applied: Vec<f64>,
    /// Body positions in world frame (`3 * nbody`), derived by `forward`.
    pub xpos: Vec<f64>,
    /// Body orientations `[w, x, y, z]` (`4 * nbody`), derived by `forward`.
    pub xquat: Vec<f64>,
    /// Body centres of mass in world frame (`3 * nbody`), derived by `forward`.
    pub xipos: Vec<f64>,
}

impl SimState {
    /// Allocate a zeroed state for `layout`, with identity orientations.
    pub fn zeroed(layout: &ModelLayout) -> Self {
        let mut xquat = vec![0.0; 4 * layout.nbody];
        for q in xquat.chunks_exact_mut(4) {
            q[0] = 1.0;
        }
        Self {
            time: 0.0,
            qpos: vec![0.0; layout.nq],
            qvel: vec![0.0; layout.nv],
            ctrl: vec![0.0; layout.nu],
            xfrc_applied: vec![0.0; 6 * layout.nbody],
            xpos: vec![0.0; 3 * layout.nbody],
            xquat,
            xipos: vec![0.0; 3 * layout.nbody],
        }
    }

    /// World position of `body`.
    pub fn body_position(&self, body: BodyId) -> [f64; 3] {
        let i = 3 * body.index();
        [self.xpos[i], self.xpos[i + 1], self.xpos[i + 2]]
    }

    /// World orientation of `body`, `[w, x, y, z]`.
    pub fn body_quat(&self, body: BodyId) -> [f64; 4] {
        let i = 4 * body.index();
        [
            self.xquat[i],
            self.xquat[i + 1],
            self.xquat[i + 2],
            self.xquat[i + 3],
        ]
    }

    /// World centre of mass of `body`.
    pub fn body_com(&self, body: BodyId) -> [f64; 3] {
        let i = 3 * body.index();
        [self.xipos[i], self.xipos[i + 1], self.xipos[i + 2]]
    }

    /// Zero every applied force and torque.
    pub fn clear_applied_forces(&mut self) {
        self.xfrc_applied.fill(0.0);
    }

    /// Overwrite the applied force and torque on a single body.
    pub fn set_applied_wrench(&mut self, body: BodyId, force: [f64; 3], torque: [f64; 3]) {
        let i = 6 * body.index();
        self.xfrc_applied[i..i + 3].copy_from_slice(&force);
        self.xfrc_applied[i + 3..i + 6].copy_from_slice(&torque);
    }

    /// Bytes held by the numeric arrays.
    pub fn byte_size(&self) -> usize {
        let elems = self.qpos.len()
            + self.qvel.len()
            + self.ctrl.len()
            + self.xfrc_applied.len()
            + self.xpos.len()
            + self.xquat.len()
            + self.xipos.len();
        elems * std::mem::size_of::<f64>()
    }
}

// ── Collaborator traits ────────────────────────────────────────────

/// A compiled physics model.
///
/// Implementations wrap the engine's native model object. The model is
/// never mutated after compilation; all time-varying data lives in the
/// [`SimState`] passed to each call.
pub trait SimModel: Send + 'static {
    /// The model's immutable topology.
    fn layout(&self) -> &ModelLayout;

    /// Allocate a state holding the authored initial condition.
    fn new_state(&self) -> SimState;

    /// Advance `state` by one physics timestep.
    fn step(&self, state: &mut SimState);

    /// Recompute derived quantities (body poses, centres of mass) from
    /// positions without advancing time.
    fn forward(&self, state: &mut SimState);

    /// Restore the authored initial condition in place.
    fn reset_state(&self, state: &mut SimState);

    /// Free native resources. Called exactly once, by
    /// [`SimulationHandle::dispose`].
    fn release(&mut self) {}
}

/// Entry point of the physics collaborator.
pub trait PhysicsEngine: Send + Sync {
    /// Compile a model from its XML description.
    ///
    /// Assets referenced by the description (meshes, textures) are read
    /// from `vfs`, where the scene loader has written them.
    fn load_model(&self, xml: &str, vfs: &dyn VirtualFs) -> Result<Box<dyn SimModel>, PhysicsError>;
}

// ── SimulationHandle ───────────────────────────────────────────────

/// Exclusively owned pair of compiled model and mutable state.
///
/// Disposal consumes the handle, so a handle cannot be disposed twice and
/// cannot be used after disposal.
pub struct SimulationHandle {
    model: Box<dyn SimModel>,
    state: SimState,
}

impl SimulationHandle {
    /// Wrap a compiled model, allocating its initial state.
    pub fn new(model: Box<dyn SimModel>) -> Self {
        let state = model.new_state();
        Self { model, state }
    }

    /// The model topology.
    pub fn layout(&self) -> &ModelLayout {
        self.model.layout()
    }

    /// Read-only access to the state.
    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Mutable access to the state.
    pub fn state_mut(&mut self) -> &mut SimState {
        &mut self.state
    }

    /// Advance one physics timestep.
    pub fn step(&mut self) {
        self.model.step(&mut self.state);
    }

    /// Recompute derived quantities from positions.
    pub fn forward(&mut self) {
        self.model.forward(&mut self.state);
    }

    /// Restore the authored initial condition and recompute derived
    /// quantities.
    pub fn reset(&mut self) {
        self.model.reset_state(&mut self.state);
        self.model.forward(&mut self.state);
    }

    /// Release the native model.
    pub fn dispose(mut self) {
        self.model.release();
    }
}

impl std::fmt::Debug for SimulationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let layout = self.model.layout();
        f.debug_struct("SimulationHandle")
            .field("nq", &layout.nq)
            .field("nv", &layout.nv)
            .field("nu", &layout.nu)
            .field("nbody", &layout.nbody)
            .field("time", &self.state.time)
            .finish()
    }
}
