//! Kinema: run trained robot control policies against a physics scene.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Kinema sub-crates. For most users, adding `kinema` as a single
//! dependency is sufficient.
//!
//! Kinema owns the parts between the collaborators: it loads scenes through
//! an LRU [`cache`], builds observation vectors with the [`obs`] pipeline,
//! maps network outputs to actuator targets in [`policy`], and drives it
//! all at a fixed decimation in [`engine`]. Physics, rendering, inference
//! and asset storage are traits in [`types`] that the host implements.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kinema::prelude::*;
//! use kinema_test_utils::{layouts, MemoryAssets, MockInference, MockPhysics, MockRenderer, MockSession};
//!
//! let xml = "<mujoco model='pendulum'/>";
//! let backends = Backends {
//!     physics: Arc::new(MockPhysics::new().with_model(xml, layouts::passive_pendulum())),
//!     inference: Arc::new(MockInference::new(MockSession::new(vec![], vec![]))),
//!     renderer: Arc::new(MockRenderer::new()),
//!     assets: Arc::new(MemoryAssets::new().with_file("main/assets/pendulum/scene.xml", xml)),
//! };
//! let mut runtime = Runtime::new(backends, RuntimeConfig::default())
//!     .unwrap()
//!     .with_cache(SharedSceneCache::new(SceneCache::new(CacheBudget::default()).unwrap()))
//!     .with_command_store(SharedCommandStore::new());
//!
//! runtime.load_environment("main/assets/pendulum/scene.xml", None).unwrap();
//! assert_eq!(runtime.phase(), RuntimePhase::Running);
//!
//! let metrics = runtime.tick();
//! assert_eq!(metrics.substeps, 10);
//! assert_eq!(runtime.tick_id(), TickId(1));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `kinema-core` | IDs, errors, collaborator traits, simulation state |
//! | [`command`] | `kinema-command` | Command schemas and the command store |
//! | [`obs`] | `kinema-obs` | Observation components, groups and history |
//! | [`policy`] | `kinema-policy` | Policy config, state extraction, control mapping |
//! | [`cache`] | `kinema-cache` | Scene cache, budgets and the virtual filesystem |
//! | [`engine`] | `kinema-engine` | Runtime, realtime loop, loader and manifest |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`kinema-core`).
///
/// Contains the error types and the collaborator traits
/// ([`types::PhysicsEngine`], [`types::InferenceEngine`],
/// [`types::RenderBackend`], [`types::AssetStore`]).
pub use kinema_core as types;

/// Command schemas and the shared command store (`kinema-command`).
pub use kinema_command as command;

/// Observation components and groups (`kinema-obs`).
///
/// Register custom components on a [`obs::ComponentRegistry`] and pass it
/// to [`engine::Runtime::with_components`].
pub use kinema_obs as obs;

/// Policy configuration and binding (`kinema-policy`).
pub use kinema_policy as policy;

/// Scene cache (`kinema-cache`).
pub use kinema_cache as cache;

/// Runtime and realtime loop (`kinema-engine`).
///
/// [`engine::Runtime`] for caller-driven ticking,
/// [`engine::RealtimeRuntime`] for wall-clock pacing on tokio.
pub use kinema_engine as engine;

/// Common imports for typical Kinema usage.
///
/// ```rust
/// use kinema::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use kinema_core::{
        AssetStore, BodyId, InferenceEngine, PhysicsEngine, RenderBackend, SceneKey, TickId,
    };

    // Errors
    pub use kinema_core::{AssetError, ConfigError, InferenceError, ObsError, PhysicsError};

    // Commands
    pub use kinema_command::{CommandId, SharedCommandStore};

    // Cache
    pub use kinema_cache::{CacheBudget, SceneCache, SharedSceneCache};

    // Policy
    pub use kinema_policy::PolicyConfig;

    // Engine
    pub use kinema_engine::{
        AppManifest, Backends, DragInput, FsAssetStore, LoadError, RealtimeRuntime, Runtime,
        RuntimeConfig, RuntimePhase, TickMetrics,
    };
}
