//! Observation components and groups for Kinema control policies.
//!
//! An observation config names, per inference input, an ordered list
//! of components (`BaseLinearVelocity`, `JointPositions`,
//! `PrevActions`, ...). Each name resolves through the
//! [`ComponentRegistry`] to an [`ObservationComponent`] of fixed size,
//! optionally scaled and wrapped in its own history window. An
//! [`ObservationGroup`] concatenates its components into one flat buffer,
//! optionally keeping a group-level [`HistoryWindow`].
//!
//! Components read everything through an [`ObsFrame`] built once per
//! control tick.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod component;
pub mod frame;
pub mod group;
pub mod history;
pub mod registry;
pub mod transform;

pub use component::{compute_checked, ObservationComponent};
pub use frame::{ObsFrame, TrackingSample};
pub use group::{GroupDescriptor, HistoryWindow, ObservationGroup};
pub use history::{HistoryRing, Windowed};
pub use registry::{BuildContext, ComponentDescriptor, ComponentRegistry, Constructor};
pub use transform::{Affine, AffineParam, Scaled};
