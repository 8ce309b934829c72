//! User-adjustable command values for the Kinema policy runtime.
//!
//! Commands are grouped sliders and buttons declared by a policy
//! configuration (for example a `velocity` group with forward, lateral
//! and yaw-rate sliders). The [`CommandStore`] holds their current
//! values independently of any simulation; observation components read
//! a [`CommandValues`] snapshot once per tick, and UI panels subscribe to
//! [`CommandEvent`]s over a channel.
//!
//! Pressing a button named `reset` runs a callback installed by the
//! runtime; the store itself knows nothing about simulations.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod schema;
pub mod store;

pub use error::CommandError;
pub use schema::{
    velocity_command, ButtonSpec, CommandGroupSpec, CommandId, CommandInput, SliderSpec,
    RESET_COMMAND,
};
pub use store::{CommandEvent, CommandStore, CommandValues, ResetCallback, SharedCommandStore};
