//! Test utilities and mock collaborators for Kinema development.
//!
//! Provides mock implementations of the external collaborator traits
//! ([`PhysicsEngine`](kinema_core::PhysicsEngine),
//! [`InferenceEngine`](kinema_core::InferenceEngine),
//! [`RenderBackend`](kinema_core::RenderBackend),
//! [`AssetStore`](kinema_core::AssetStore)) and a few model layouts for
//! building test scenarios.
//!
//! Every mock shares its counters through a cloneable handle, so a test
//! can hand the mock to the code under test and still inspect how it was
//! used afterwards.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod assets;
pub mod inference;
pub mod layouts;
pub mod physics;
pub mod render;

pub use assets::MemoryAssets;
pub use inference::{spec, MockInference, MockSession, SessionHandle};
pub use physics::{MockModel, MockPhysics, PhysicsStats};
pub use render::{MockRenderer, RenderLog};
