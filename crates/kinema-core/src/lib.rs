//! Core types and collaborator traits for the Kinema policy runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other Kinema crate: identifiers, the
//! error taxonomy, the per-tick [`PolicyState`] snapshot, numeric tensors,
//! and the narrow traits through which the runtime talks to its external
//! collaborators (physics engine, neural-inference engine, renderer,
//! virtual filesystem, asset store).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod inference;
pub mod math;
pub mod physics;
pub mod render;
pub mod state;
pub mod vfs;

pub use error::{AssetError, ConfigError, InferenceError, ObsError, PhysicsError, RenderError};
pub use id::{BodyId, SceneKey, TickId};
pub use inference::{
    DType, InferenceEngine, InferenceFuture, InferenceSession, NamedTensors, Tensor, TensorData,
    TensorShape, TensorSpec,
};
pub use physics::{
    ActuatorInfo, BodyInfo, JointInfo, JointKind, LightInfo, MeshInfo, ModelLayout,
    PhysicsEngine, SimModel, SimState, SimulationHandle, TextureInfo, Transmission,
};
pub use render::{LightParams, RenderBackend, RenderGraph, RenderScene};
pub use state::PolicyState;
pub use vfs::{AssetStore, VirtualFs};
