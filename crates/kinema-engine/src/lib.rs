//! Control loop driving Kinema scenes and policies.
//!
//! Provides the [`Runtime`], which loads a scene through the shared
//! scene cache, binds a policy to it and steps physics at a fixed
//! decimation, plus [`RealtimeRuntime`] for wall-clock pacing on tokio.
//! Supports both lockstep (call [`Runtime::tick`] yourself) and realtime
//! modes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod drag;
pub mod error;
pub mod frame;
pub mod loader;
pub mod manifest;
pub mod metrics;
pub mod realtime;
pub mod requests;
pub mod runtime;

pub use assets::FsAssetStore;
pub use config::RuntimeConfig;
pub use drag::{apply_drag, drag_wrench, DragInput};
pub use error::LoadError;
pub use frame::{BodyFrame, BodyPose};
pub use loader::{load_scene, Backends};
pub use manifest::{scene_id, AppManifest, Selection};
pub use metrics::TickMetrics;
pub use realtime::{LoopStats, RealtimeRuntime};
pub use requests::{ControlHandle, ControlRequest};
pub use runtime::{Runtime, RuntimePhase};
