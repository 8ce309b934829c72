//! Policy configuration, state extraction, control laws and the
//! observation pipeline for Kinema.
//!
//! A [`PolicyConfig`] parsed from JSON is bound to a loaded scene and an
//! inference session by [`BoundPolicy::bind`]. Binding resolves joint
//! names to state addresses ([`PolicyStateExtractor`]), actuators and
//! gains ([`ControlMapping`]), observation groups and the optional
//! behavior module ([`PolicyPipeline`]), and the network's tensor names
//! ([`InferenceBinding`]). Every configuration problem surfaces there as
//! a [`ConfigError`](kinema_core::ConfigError); nothing is resolved by
//! name inside the tick.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod behavior;
pub mod binding;
pub mod bound;
pub mod config;
pub mod control;
pub mod extractor;
pub mod pipeline;

pub use behavior::{
    BehaviorConstructor, BehaviorContext, BehaviorModule, BehaviorRegistry, GaitClock,
    MotionTracking,
};
pub use binding::InferenceBinding;
pub use bound::BoundPolicy;
pub use config::{
    decimation, BehaviorDescriptor, ControlType, NetworkMeta, NetworkRef, PerJoint, PolicyConfig,
    DEFAULT_CONTROL_DT,
};
pub use control::ControlMapping;
pub use extractor::{JointAddress, PolicyStateExtractor};
pub use pipeline::{Observations, PipelineInput, PolicyPipeline};
